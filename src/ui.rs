pub mod history;

use itertools::{EitherOrBoth, Itertools};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Screen};
use crate::engine::Submission;
use crate::metrics::FinalMetrics;
use crate::session::{Mode, SessionState, TestConfiguration, TextSource};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

/// Draw whichever screen is active.
pub fn draw(app: &App, f: &mut Frame) {
    match app.screen {
        Screen::History => history::render_history(app, f),
        _ => f.render_widget(app, f.area()),
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.screen {
            Screen::Setup => render_setup(self, area, buf),
            Screen::Typing => render_typing(self.engine.state(), area, buf),
            Screen::Results => render_results(self, area, buf),
            // Drawn through the frame by `draw`.
            Screen::History => {}
        }
    }
}

/// Styled spans for the passage: typed chars coloured by correctness, the
/// cursor underlined, the rest dimmed. Typed chars past the end of the
/// passage are shown as errors.
pub fn prompt_spans(reference: &str, typed: &str) -> Vec<Span<'static>> {
    let green = bold().fg(Color::Green);
    let red = bold().fg(Color::Red);

    let mut spans = Vec::new();
    let mut untyped = String::new();

    for pair in typed.chars().zip_longest(reference.chars()) {
        match pair {
            EitherOrBoth::Both(actual, expected) if actual == expected => {
                spans.push(Span::styled(expected.to_string(), green));
            }
            EitherOrBoth::Both(actual, _) | EitherOrBoth::Left(actual) => {
                let shown = match actual {
                    ' ' => "·".to_owned(),
                    c => c.to_string(),
                };
                spans.push(Span::styled(shown, red));
            }
            EitherOrBoth::Right(expected) => untyped.push(expected),
        }
    }

    let mut rest = untyped.chars();
    if let Some(cursor) = rest.next() {
        spans.push(Span::styled(
            cursor.to_string(),
            dim_bold().add_modifier(Modifier::UNDERLINED),
        ));
    }
    let rest: String = rest.collect();
    if !rest.is_empty() {
        spans.push(Span::styled(rest, dim_bold()));
    }
    spans
}

fn describe(config: &TestConfiguration) -> String {
    match config.mode {
        Mode::Time => format!("{}s", config.target_value),
        Mode::Chars => format!("{} chars", config.target_value),
    }
}

fn render_setup(app: &App, area: Rect, buf: &mut Buffer) {
    let setup = &app.setup;
    let selected = bold().fg(Color::Magenta);

    let presets = setup
        .mode
        .presets()
        .iter()
        .map(|&p| {
            let label = match setup.mode {
                Mode::Time => format!("{p}s"),
                Mode::Chars => format!("{p} chars"),
            };
            if p == setup.target_value {
                Span::styled(format!("[{label}]"), selected)
            } else {
                Span::raw(format!(" {label} "))
            }
        })
        .collect::<Vec<_>>();

    let source = match setup.text_source {
        TextSource::Random => "random passage".to_string(),
        TextSource::Custom if setup.text.trim().is_empty() => "custom text (none given)".to_string(),
        TextSource::Custom => format!("custom text ({} chars)", setup.text.chars().count()),
    };

    let user_line = match app.current_user() {
        Some(user) => format!("signed in as {}, results are saved", user.display_name()),
        None => "not signed in, results are not saved".to_string(),
    };

    let mut lines = vec![
        Line::from(Span::styled("typecafe", bold().fg(Color::Yellow))),
        Line::default(),
        Line::from(vec![
            Span::styled("mode    ", dim_bold()),
            Span::styled(
                match setup.mode {
                    Mode::Time => "time-based",
                    Mode::Chars => "character-based",
                },
                bold(),
            ),
        ]),
        Line::from([vec![Span::styled("target  ", dim_bold())], presets].concat()),
        Line::from(vec![Span::styled("text    ", dim_bold()), Span::styled(source, bold())]),
        custom_text_line(app),
        Line::from(Span::styled(user_line, Style::default().add_modifier(Modifier::ITALIC))),
        Line::default(),
    ];

    if let Some(notice) = &app.notice {
        lines.push(Line::from(Span::styled(notice.clone(), bold().fg(Color::Red))));
        lines.push(Line::default());
    }

    lines.push(Line::from(Span::styled(
        setup_help(app),
        Style::default().add_modifier(Modifier::ITALIC),
    )));

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(centered(area, 14), buf);
}

/// The custom text being typed, with a cursor while editing.
fn custom_text_line(app: &App) -> Line<'static> {
    if app.setup.text_source != TextSource::Custom {
        return Line::default();
    }
    let mut spans = vec![Span::styled(format!("\"{}", app.setup.text), bold().fg(Color::Cyan))];
    if app.editing_text {
        spans.push(Span::styled(" ", Style::default().add_modifier(Modifier::REVERSED)));
    }
    spans.push(Span::styled("\"", bold().fg(Color::Cyan)));
    Line::from(spans)
}

fn setup_help(app: &App) -> &'static str {
    match (app.editing_text, app.setup.text_source) {
        (true, _) => "type your text / (enter) start / (ctrl+u) clear / (esc) done",
        (false, TextSource::Custom) => {
            "(enter) start / (tab) mode / (←/→) target / (e) edit text / (s) text source / (h) history / (esc) quit"
        }
        (false, TextSource::Random) => {
            "(enter) start / (tab) mode / (←/→) target / (s) text source / (h) history / (esc) quit"
        }
    }
}

fn render_typing(state: &SessionState, area: Rect, buf: &mut Buffer) {
    let reference = state.reference_text();
    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let prompt_lines = if reference.width() <= max_chars_per_line as usize {
        1
    } else {
        ((reference.width() as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16
    };

    let padding = area.height.saturating_sub(prompt_lines + 2) / 2;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(padding),
            Constraint::Length(2),
            Constraint::Length(prompt_lines),
            Constraint::Min(0),
        ])
        .split(area);

    let remaining = match (state.seconds_remaining(), state.chars_remaining()) {
        (Some(secs), _) => format!("{secs}s left"),
        (None, Some(chars)) => format!("{chars} chars left"),
        (None, None) => String::new(),
    };
    let live = state.live();
    let header = Line::from(vec![
        Span::styled(remaining, bold()),
        Span::styled(format!("   {} wpm", live.wpm), bold().fg(Color::Magenta)),
        Span::styled(format!("   {} raw", live.raw_wpm), dim_bold()),
        Span::styled(format!("   {} errors", state.error_count()), bold().fg(Color::Red)),
    ]);
    Paragraph::new(header)
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    Paragraph::new(Line::from(prompt_spans(reference, state.typed_text())))
        .alignment(if prompt_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: false })
        .render(chunks[2], buf);
}

/// Headline figures as shown on the results screen.
pub fn summary_line(m: &FinalMetrics) -> String {
    format!(
        "{:.0} wpm   {:.0} raw   {:.0}% acc   {} errors",
        m.wpm,
        m.raw_wpm,
        m.accuracy * 100.0,
        m.errors
    )
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let state = app.engine.state();
    let Some(metrics) = state.final_metrics() else {
        return;
    };

    let details = format!(
        "duration {}s   chars {}   words {}   backspaces {}",
        metrics.duration_sec, metrics.chars_typed, metrics.words_typed, metrics.backspaces
    );
    let test = state.config().map(describe).unwrap_or_default();

    let saved = match app.engine.last_submission() {
        Some(Submission::Saved) => Span::styled("result saved", Style::default().fg(Color::Green)),
        Some(Submission::Failed(e)) => {
            Span::styled(format!("could not save result: {e}"), Style::default().fg(Color::Red))
        }
        Some(Submission::Skipped) | None => Span::styled(
            "sign in with --user to save results",
            Style::default().add_modifier(Modifier::DIM),
        ),
    };

    let lines = vec![
        Line::from(Span::styled("test complete", bold().fg(Color::Yellow))),
        Line::default(),
        Line::from(Span::styled(summary_line(metrics), bold())),
        Line::from(Span::styled(details, dim_bold())),
        Line::from(Span::styled(format!("{} test, {} text", test, metrics.source), dim_bold())),
        Line::default(),
        Line::from(saved),
        Line::default(),
        Line::from(Span::styled(
            "(n) new test / (h) history / (esc) setup / (q) quit",
            Style::default().add_modifier(Modifier::ITALIC),
        )),
    ];

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(centered(area, 9), buf);
}

fn centered(area: Rect, height: u16) -> Rect {
    let inner = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([Constraint::Min(0)])
        .split(area)[0];
    let height = height.min(inner.height);
    Rect {
        y: inner.y + (inner.height - height) / 2,
        height,
        ..inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(spans: &[Span]) -> Vec<String> {
        spans.iter().map(|s| s.content.to_string()).collect()
    }

    #[test]
    fn prompt_spans_before_typing() {
        let spans = prompt_spans("abc", "");
        assert_eq!(contents(&spans), vec!["a", "bc"]);
        assert!(spans[0].style.add_modifier.contains(Modifier::UNDERLINED));
    }

    #[test]
    fn prompt_spans_mark_errors() {
        let spans = prompt_spans("a c", "ab");
        assert_eq!(contents(&spans), vec!["a", "b", "c"]);
        assert_eq!(spans[0].style.fg, Some(Color::Green));
        assert_eq!(spans[1].style.fg, Some(Color::Red));
    }

    #[test]
    fn prompt_spans_show_wrong_space() {
        let spans = prompt_spans("ab", " ");
        assert_eq!(spans[0].content, "·");
        assert_eq!(spans[0].style.fg, Some(Color::Red));
    }

    #[test]
    fn prompt_spans_overflow_is_red() {
        let spans = prompt_spans("ab", "abxy");
        assert_eq!(contents(&spans), vec!["a", "b", "x", "y"]);
        assert!(spans[2..].iter().all(|s| s.style.fg == Some(Color::Red)));
    }

    #[test]
    fn summary_rounds_for_display() {
        let m = FinalMetrics {
            duration_sec: 30,
            mode: Mode::Time,
            target_value: 30,
            wpm: 61.56,
            raw_wpm: 70.4,
            accuracy: 0.9712,
            backspaces: 3,
            errors: 4,
            chars_typed: 176,
            words_typed: 33,
            source: TextSource::Random,
            snippet_id: None,
        };
        assert_eq!(summary_line(&m), "62 wpm   70 raw   97% acc   4 errors");
    }

    #[test]
    fn describe_configuration() {
        assert_eq!(describe(&TestConfiguration::timed(15)), "15s");
        assert_eq!(describe(&TestConfiguration::chars(200)), "200 chars");
    }
}
