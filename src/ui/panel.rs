//! Data table of the current tab.
//!
//! One row per extracted key with its value, threshold and threshold status.
//! The threshold input line opens below the table.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row as TableRow, Table, TableState},
    Frame,
};

use crate::app::{App, Row, RowView, ThresholdInput};
use crate::data::{format_magnitude, DataValue};

/// Render the data table and, when open, the threshold input line.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let (table_area, input_area) = match app.input {
        Some(_) => {
            let chunks = Layout::vertical([Constraint::Min(4), Constraint::Length(3)]).split(area);
            (chunks[0], Some(chunks[1]))
        }
        None => (area, None),
    };

    render_table(frame, app, table_area);
    if let (Some(input), Some(input_area)) = (&app.input, input_area) {
        render_input(frame, app, input, input_area);
    }
}

fn render_table(frame: &mut Frame, app: &App, area: Rect) {
    let rows = app.rows();

    let header = TableRow::new(vec![
        Cell::from("Key"),
        Cell::from("Value"),
        Cell::from("Threshold"),
        Cell::from("Status"),
    ])
    .height(1)
    .style(app.theme.header);

    let body: Vec<TableRow> = rows.iter().map(|row| table_row(app, row)).collect();

    let widths = [
        Constraint::Fill(2),
        Constraint::Fill(3),
        Constraint::Fill(1),
        Constraint::Min(8),
    ];

    let position_info = if rows.is_empty() {
        String::new()
    } else {
        format!(" [{}/{}]", app.selected_row + 1, rows.len())
    };
    let title = match app.row_view {
        RowView::Visible => format!(" Data ({}){} ", rows.len(), position_info),
        RowView::Hidden => format!(" Hidden ({}) [h:show H:back]{} ", rows.len(), position_info),
    };

    let table = Table::new(body, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    if !rows.is_empty() {
        state.select(Some(app.selected_row.min(rows.len() - 1)));
    }

    frame.render_stateful_widget(table, area, &mut state);

    if rows.is_empty() {
        let message = match (app.row_view, app.current().and_then(|v| v.data.as_ref())) {
            (RowView::Hidden, _) => "Nothing hidden",
            (RowView::Visible, None) => "Waiting for data...",
            (RowView::Visible, Some(_)) => "All keys hidden (H to list them)",
        };
        let inner = Rect::new(area.x + 2, area.y + 2, area.width.saturating_sub(4), 1);
        frame.render_widget(
            Paragraph::new(message).style(Style::default().add_modifier(Modifier::DIM)),
            inner,
        );
    }
}

fn table_row<'a>(app: &App, row: &'a Row) -> TableRow<'a> {
    let value = row.value.as_ref().map_or_else(|| "-".to_string(), format_value);

    let threshold = row.threshold.as_ref().map_or_else(
        || "-".to_string(),
        |t| {
            let shown = format_magnitude(t.value);
            if t.absolute {
                format!("|{shown}|")
            } else {
                shown
            }
        },
    );

    let status = match &row.result {
        Some(result) if result.is_above => Cell::from("ABOVE").style(app.theme.alarm_style(true)),
        Some(_) => Cell::from("below").style(app.theme.alarm_style(false)),
        None => Cell::from("-").style(Style::default().add_modifier(Modifier::DIM)),
    };

    TableRow::new(vec![
        Cell::from(row.key.as_str()),
        Cell::from(value),
        Cell::from(threshold),
        status,
    ])
}

fn format_value(value: &DataValue) -> String {
    match value {
        DataValue::Number(n) => format_magnitude(*n),
        other => other.to_string(),
    }
}

fn render_input(frame: &mut Frame, app: &App, input: &ThresholdInput, area: Rect) {
    let mode = if input.absolute { "absolute" } else { "signed" };
    let mut spans = vec![
        Span::styled(format!(" {} ", input.key), app.theme.header),
        Span::raw(format!("≥ {}_", input.buffer)),
    ];
    if let Some(error) = &input.error {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(error.clone(), Style::default().fg(app.theme.critical)));
    }

    let block = Block::default()
        .title(format!(" Threshold ({mode}) [Enter:save Tab:abs Esc:cancel] "))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&DataValue::Number(2_500_000.0)), "2.50M");
        assert_eq!(format_value(&DataValue::Text("n/a".to_string())), "n/a");
    }
}
