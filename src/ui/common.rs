//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use crate::app::{App, RowView};

/// Render the header bar with the current tab's monitor state.
///
/// Displays: health indicator, running state, thresholds, last breach or fault.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let Some(view) = app.current() else {
        let line = Line::from(vec![
            Span::styled(" CHARTWATCH ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("| No tabs"),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    };

    let Some(status) = &view.status else {
        let line = Line::from(vec![
            Span::styled(" CHARTWATCH ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("| Loading..."),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    };

    let health_style = app.theme.health_style(status.health.status);
    let (state, state_style) = if status.is_running() {
        ("running", Style::default().fg(app.theme.healthy))
    } else if status.enabled {
        ("stopped", Style::default().fg(app.theme.warning))
    } else {
        ("disabled", Style::default().add_modifier(Modifier::DIM))
    };

    let mut spans = vec![
        Span::styled(" ● ", health_style),
        Span::styled("CHARTWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(state, state_style),
        Span::raw(" │ "),
        Span::styled(status.health.status.symbol(), health_style),
        Span::raw(format!(" │ {} items │ {} thresholds", status.items, status.thresholds)),
    ];

    if let Some(fault) = &status.fault {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(
            format!("FAULT: {fault}"),
            Style::default().fg(app.theme.critical).add_modifier(Modifier::BOLD),
        ));
    } else if let Some(breach) = &view.last_breach {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(
            format!("crossed: {}", breach.triggered.join(", ")),
            app.theme.alarm_style(true),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the tab bar, one entry per monitored tab.
///
/// Highlights the current tab.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = app
        .tabs
        .iter()
        .map(|view| {
            let marker = if view.is_running() { "" } else { " ■" };
            Line::from(format!(" {}:{}{} ", view.tab, view.label, marker))
        })
        .collect();

    let tabs = Tabs::new(titles)
        .select(app.current_tab)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the status bar at the bottom.
///
/// Shows: time since last update and available controls, or a temporary
/// status message.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph = Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = if app.input.is_some() {
        "Type a threshold like 70, -5 or 1.5k | Enter:save Tab:abs Esc:cancel"
    } else if app.row_view == RowView::Hidden {
        "h:unhide H:back ?:help q:quit"
    } else {
        "t:threshold x:clear h:hide J/K:move m:monitor Tab:switch ?:help q:quit"
    };

    let updated = app
        .current()
        .and_then(|v| v.last_updated)
        .map(|at| format!("Updated {:.1}s ago", at.elapsed().as_secs_f64()))
        .unwrap_or_else(|| "No data yet".to_string());

    let paragraph =
        Paragraph::new(format!(" {} | {}", updated, controls)).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let section = |title: &'static str| {
        Line::from(vec![Span::styled(title, Style::default().add_modifier(Modifier::BOLD))])
    };
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        section(" Navigation"),
        Line::from("  Tab ←/→     Switch tabs"),
        Line::from("  ↑/↓ j/k     Select row"),
        Line::from("  Home/End    Jump to first/last"),
        Line::from(""),
        section(" Rows"),
        Line::from("  t Enter     Set threshold"),
        Line::from("  x           Clear threshold"),
        Line::from("  h           Hide / unhide row"),
        Line::from("  H           List hidden rows"),
        Line::from("  J/K S-↑/↓   Move row"),
        Line::from(""),
        section(" Monitoring"),
        Line::from("  m           Start / stop this tab"),
        Line::from("  d           Locator diagnostics"),
        Line::from("  C           Clear tab storage"),
        Line::from("  q           Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    // Center the help overlay - responsive to terminal size
    let help_width = 42u16.min(area.width.saturating_sub(4));
    let help_height = 25u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(ratatui::widgets::Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
