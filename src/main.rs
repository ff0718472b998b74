use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    Frame, Terminal,
};
use tracing::{info, warn};

use chartwatch::bus::{Background, ChannelBus, ControlRouter};
use chartwatch::monitor::{Monitor, MonitorService};
use chartwatch::page::{FixtureWatcher, PageTree};
use chartwatch::store::{FileStore, MemoryStore, Storage, TabId};
use chartwatch::ui::{self, Theme};
use chartwatch::{events, logging, App, Settings, TerminalBell};

#[derive(Parser, Debug)]
#[command(name = "chartwatch")]
#[command(about = "Watch chart tooltip readings and sound an alarm when they cross a threshold")]
struct Args {
    /// Page fixture (JSON) to monitor; repeat for more tabs
    #[arg(short, long = "page", required = true)]
    pages: Vec<PathBuf>,

    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep thresholds and panel settings in this JSON file instead of memory
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Log file used while the panel is open
    #[arg(long, default_value = "chartwatch.log")]
    log_file: PathBuf,

    /// Hover once, print the extracted data as JSON and exit
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;

    // The panel owns the terminal; one-shot output goes to stdout
    let log_file = if args.once { None } else { Some(args.log_file.as_path()) };
    logging::init(&settings.log_level, log_file)?;

    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(async move {
        if args.once {
            if args.pages.len() > 1 {
                warn!(count = args.pages.len(), "--once reads only the first page");
            }
            run_once(&args.pages[0], settings).await
        } else {
            run(&args, settings).await
        }
    })
}

/// Load a fixture into a fresh page.
fn open_page(path: &Path) -> Result<(Arc<PageTree>, FixtureWatcher)> {
    let page = Arc::new(PageTree::new());
    let mut watcher = FixtureWatcher::new(path, page.clone());
    if !watcher.poll() {
        let reason = watcher.error().unwrap_or("no document").to_string();
        return Err(anyhow!("failed to load {}: {}", path.display(), reason));
    }
    Ok((page, watcher))
}

/// One extraction cycle against the first page, printed as JSON.
async fn run_once(path: &Path, settings: Settings) -> Result<()> {
    let (page, _watcher) = open_page(path)?;
    let (bus, _updates) = ChannelBus::create(16);

    let mut monitor = Monitor::builder(1)
        .page(page)
        .storage(Arc::new(MemoryStore::new()))
        .bus(Arc::new(bus))
        .settings(settings)
        .build()?;
    monitor.start().await;
    monitor.shutdown().await;

    let json = match monitor.current_data() {
        Some(data) => serde_json::to_string_pretty(data)?,
        None => serde_json::to_string_pretty(&monitor.diagnostics())?,
    };
    println!("{json}");
    Ok(())
}

async fn run(args: &Args, settings: Settings) -> Result<()> {
    let storage: Arc<dyn Storage> = match &args.store {
        Some(path) => Arc::new(FileStore::open(path).await?),
        None => Arc::new(MemoryStore::new()),
    };

    let (bus, updates) = ChannelBus::create(256);
    let bus = Arc::new(bus);
    let mut router = ControlRouter::new();
    let mut tabs = Vec::new();

    for (index, path) in args.pages.iter().enumerate() {
        let tab = index as TabId + 1;
        let (page, watcher) = open_page(path)?;
        watcher.spawn(settings.tick());

        let monitor = Monitor::builder(tab)
            .page(page)
            .storage(storage.clone())
            .bus(bus.clone())
            .alarm_sink(Box::new(TerminalBell))
            .settings(settings.clone())
            .build()?;
        let (handle, _task) = MonitorService::spawn(monitor);
        router.register(handle);

        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("tab{tab}"));
        info!(tab, page = %path.display(), "monitoring page");
        tabs.push((tab, label));
    }

    let background = Background::new(router, storage.clone());
    let mut app = App::new(background, storage, updates, tabs, Theme::auto_detect()).await?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, &mut app).await;
    app.shutdown().await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

async fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    const REFRESH_INTERVAL: Duration = Duration::from_secs(1);
    let mut last_refresh = Instant::now();

    while app.running {
        app.poll_updates();
        terminal.draw(|frame| draw(frame, app))?;

        // Blocking poll; the monitors keep running on the other workers
        let event = tokio::task::block_in_place(|| events::poll_event(Duration::from_millis(100)))?;
        match event {
            Some(Event::Key(key)) => events::handle_key_event(app, key).await,
            // Content starts after header (1) + tabs (1) + table border (1)
            Some(Event::Mouse(mouse)) => events::handle_mouse_event(app, mouse, 2),
            _ => {}
        }

        if last_refresh.elapsed() >= REFRESH_INTERVAL {
            app.refresh().await;
            last_refresh = Instant::now();
        }
    }

    Ok(())
}

fn draw(frame: &mut Frame, app: &App) {
    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 50;
    const MIN_HEIGHT: u16 = 10;

    let area = frame.area();
    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = format!(
            "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
            area.width, area.height, MIN_WIDTH, MIN_HEIGHT
        );
        let paragraph = ratatui::widgets::Paragraph::new(msg)
            .alignment(ratatui::layout::Alignment::Center)
            .style(ratatui::style::Style::default().fg(app.theme.warning));
        let centered = ratatui::layout::Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5.min(area.height));
        frame.render_widget(paragraph, centered);
        return;
    }

    let chunks = Layout::vertical([
        Constraint::Length(1), // Header bar
        Constraint::Length(1), // Tabs
        Constraint::Min(6),    // Data table
        Constraint::Length(1), // Status bar
    ])
    .split(area);

    ui::common::render_header(frame, app, chunks[0]);
    ui::common::render_tabs(frame, app, chunks[1]);
    ui::panel::render(frame, app, chunks[2]);
    ui::common::render_status_bar(frame, app, chunks[3]);

    if app.show_help {
        ui::common::render_help(frame, app, area);
    }
}
