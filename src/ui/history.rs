use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::app::App;
use crate::history::{Aggregates, StoredResult};
use crate::session::Mode;

/// Pure presenter for a single history row
pub fn present_row(result: &StoredResult) -> Row<'static> {
    let m = &result.metrics;
    let test = match m.mode {
        Mode::Time => format!("time {}s", m.target_value),
        Mode::Chars => format!("chars {}", m.target_value),
    };

    let accuracy_color = if m.accuracy >= 0.98 {
        Color::Green
    } else if m.accuracy >= 0.9 {
        Color::Yellow
    } else {
        Color::Red
    };

    Row::new(vec![
        Cell::from(result.date_label()),
        Cell::from(test),
        Cell::from(format!("{:.0}", m.wpm)).style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from(format!("{:.0}", m.raw_wpm)),
        Cell::from(format!("{:.1}%", m.accuracy * 100.0)).style(Style::default().fg(accuracy_color)),
        Cell::from(m.errors.to_string()),
        Cell::from(m.backspaces.to_string()),
    ])
}

/// One-line summary of a user's stored results
pub fn aggregates_line(aggregates: &Aggregates) -> String {
    let best = aggregates
        .best
        .as_ref()
        .map(|b| format!("{:.0} wpm", b.wpm))
        .unwrap_or_else(|| "-".to_string());
    let average_wpm = aggregates
        .average_wpm
        .map(|w| format!("{w:.0} wpm"))
        .unwrap_or_else(|| "-".to_string());
    let average_accuracy = aggregates
        .average_accuracy
        .map(|a| format!("{:.1}%", a * 100.0))
        .unwrap_or_else(|| "-".to_string());

    format!(
        "tests {}   best {}   average {}   accuracy {}",
        aggregates.total_tests, best, average_wpm, average_accuracy
    )
}

/// Render the History screen
pub fn render_history(app: &App, f: &mut Frame) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // Aggregates
            Constraint::Min(0),    // Results table
            Constraint::Length(2), // Instructions
        ])
        .split(area);

    let Some(view) = &app.history else {
        let empty = Paragraph::new("No history available. Sign in with --user to save results.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray));
        f.render_widget(empty, chunks[1]);
        return;
    };

    let title = match app.current_user() {
        Some(user) => format!("History for {}", user.display_name()),
        None => "History".to_string(),
    };
    let summary = Paragraph::new(aggregates_line(&view.aggregates))
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);
    f.render_widget(summary, chunks[0]);

    let page = &view.page;
    if page.results.is_empty() {
        let no_data = Paragraph::new("No results yet. Finish a test to see it here.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray));
        f.render_widget(no_data, chunks[1]);
    } else {
        let header = Row::new(vec![
            Cell::from("Date"),
            Cell::from("Test"),
            Cell::from("WPM"),
            Cell::from("Raw"),
            Cell::from("Accuracy"),
            Cell::from("Errors"),
            Cell::from("Backspaces"),
        ])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

        let widths = [
            Constraint::Length(20),
            Constraint::Length(12),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Min(10),
        ];

        let table = Table::new(page.results.iter().map(present_row), widths)
            .header(header)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Page {} of {}", page.page, page.total_pages.max(1))),
            )
            .column_spacing(2);
        f.render_widget(table, chunks[1]);
    }

    let mut help = Vec::new();
    if page.has_previous() {
        help.push("(←) newer");
    }
    if page.has_next() {
        help.push("(→) older");
    }
    help.push("(b/esc) back");
    let instructions = Paragraph::new(Line::from(help.join("  ")))
        .alignment(Alignment::Center)
        .style(Style::default().add_modifier(Modifier::ITALIC));
    f.render_widget(instructions, chunks[2]);
}
