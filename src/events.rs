use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::app::{App, RowView};

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub async fn handle_key_event(app: &mut App, key: KeyEvent) {
    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    if app.input.is_some() {
        handle_threshold_input(app, key).await;
        return;
    }

    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),

        // Tabs
        KeyCode::Tab | KeyCode::Right => app.next_tab(),
        KeyCode::BackTab | KeyCode::Left => app.prev_tab(),

        // Reordering
        KeyCode::Up if shift => app.move_selected(-1).await,
        KeyCode::Down if shift => app.move_selected(1).await,
        KeyCode::Char('K') => app.move_selected(-1).await,
        KeyCode::Char('J') => app.move_selected(1).await,

        // Navigation
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),

        // Thresholds
        KeyCode::Enter | KeyCode::Char('t') => app.begin_threshold_input(),
        KeyCode::Char('x') => app.clear_selected_threshold().await,

        // Rows
        KeyCode::Char('h') => app.toggle_selected_hidden().await,
        KeyCode::Char('H') => app.toggle_row_view(),
        KeyCode::Esc if app.row_view == RowView::Hidden => app.toggle_row_view(),

        // Monitoring
        KeyCode::Char('m') => app.toggle_monitoring().await,
        KeyCode::Char('d') => app.show_diagnostics().await,
        KeyCode::Char('C') => app.clear_tab_storage().await,

        KeyCode::Char('?') => app.toggle_help(),

        _ => {}
    }
}

/// Handle key input while the threshold line is open
async fn handle_threshold_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_threshold().await,
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.cancel_input(),
        KeyCode::Tab => app.toggle_input_absolute(),
        KeyCode::Backspace => app.input_pop(),
        KeyCode::Char(c) => app.input_push(c),
        _ => {}
    }
}

/// Handle mouse events
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent, content_start_row: u16) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.select_prev(),
        MouseEventKind::ScrollDown => app.select_next(),

        // Click to select a row (the table header takes one line)
        MouseEventKind::Down(MouseButton::Left) if mouse.row > content_start_row + 1 => {
            let row = (mouse.row - content_start_row - 2) as usize;
            if row < app.rows().len() {
                app.selected_row = row;
            }
        }

        _ => {}
    }
}
