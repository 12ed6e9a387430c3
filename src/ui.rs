use chrono::{DateTime, Utc};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget, Wrap},
    Frame,
};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::time::Duration;
use time_humanize::{Accuracy, HumanTime, Tense};
use unicode_width::UnicodeWidthStr;

use codetype::{
    history::HistoryEntry,
    session::{Phase, Session},
    stats::{format_duration, HistorySummary},
};

use crate::{App, Screen};

const HORIZONTAL_MARGIN: u16 = 2;
const TAB: &str = "    ";

pub fn draw(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.screen {
            Screen::Practice => render_practice(self, area, buf),
            Screen::History => render_history(self, area, buf),
        }
    }
}

fn char_style(idx: usize, cursor: usize, mistyped: bool) -> Style {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    if idx < cursor {
        if mistyped {
            // typed correctly in the end, but missed at least once
            bold.fg(Color::Rgb(255, 165, 0))
        } else {
            bold.fg(Color::Green)
        }
    } else if idx == cursor {
        let cursor_style = bold.add_modifier(Modifier::UNDERLINED | Modifier::REVERSED);
        if mistyped {
            cursor_style.fg(Color::Red)
        } else {
            cursor_style
        }
    } else {
        bold.add_modifier(Modifier::DIM)
    }
}

/// The snippet as styled lines: typed, corrected, cursor and pending text
pub fn snippet_lines(session: &Session) -> Vec<Line<'static>> {
    let cursor = session.current_index();
    let errors: &BTreeSet<usize> = session.error_positions();

    let mut lines = Vec::new();
    let mut spans: Vec<Span<'static>> = Vec::new();

    for (idx, &ch) in session.snippet().iter().enumerate() {
        let style = char_style(idx, cursor, errors.contains(&idx));
        match ch {
            '\n' => {
                if idx == cursor {
                    spans.push(Span::styled("↵", style));
                }
                lines.push(Line::from(std::mem::take(&mut spans)));
            }
            '\t' => spans.push(Span::styled(if idx == cursor { "→   " } else { TAB }, style)),
            ' ' if idx == cursor && errors.contains(&idx) => spans.push(Span::styled("·", style)),
            c => spans.push(Span::styled(c.to_string(), style)),
        }
    }
    lines.push(Line::from(spans));
    lines
}

fn snippet_width(session: &Session) -> u16 {
    let text: String = session.snippet().iter().collect();
    text.replace('\t', TAB)
        .lines()
        .map(UnicodeWidthStr::width)
        .max()
        .map_or(0, |w| u16::try_from(w).unwrap_or(u16::MAX))
}

fn cursor_line(session: &Session) -> u16 {
    let line = session
        .snippet()
        .iter()
        .take(session.current_index())
        .filter(|c| **c == '\n')
        .count();
    u16::try_from(line).unwrap_or(u16::MAX)
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "ready",
        Phase::Running => "typing",
        Phase::Paused => "paused",
        Phase::Finished => "finished",
    }
}

fn render_practice(app: &App, area: Rect, buf: &mut Buffer) {
    let session = app.practice.session();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    let header = Line::from(vec![
        Span::styled("codetype", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" · "),
        Span::styled(
            session.language().to_string(),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" · "),
        Span::styled(
            phase_label(session.phase()),
            Style::default().fg(Color::Yellow),
        ),
    ]);
    Paragraph::new(header).render(chunks[0], buf);

    // center the snippet block when it is narrower than the screen
    let block_width = snippet_width(session).saturating_add(2).min(chunks[1].width);
    let pad = (chunks[1].width - block_width) / 2;
    let snippet_area = Rect {
        x: chunks[1].x + pad,
        width: block_width,
        ..chunks[1]
    };
    let visible = snippet_area.height.saturating_sub(2);
    let scroll = cursor_line(session).saturating_sub(visible.saturating_sub(1));

    Paragraph::new(snippet_lines(session))
        .block(Block::default().borders(Borders::ALL))
        .scroll((scroll, 0))
        .render(snippet_area, buf);

    let (title, time, wpm, accuracy, errors) = match app.practice.last_result() {
        Some(r) => ("Result", r.time, r.wpm, r.accuracy, r.errors as usize),
        None => (
            "Stats",
            session.time_elapsed(),
            session.wpm(),
            session.accuracy(),
            session.error_positions().len(),
        ),
    };
    let stats = Line::from(vec![
        Span::raw(format!("Time {}", format_duration(time))),
        Span::raw("  │  "),
        Span::styled(format!("WPM {wpm}"), Style::default().fg(Color::Magenta)),
        Span::raw("  │  "),
        Span::styled(format!("Accuracy {accuracy}%"), Style::default().fg(Color::Green)),
        Span::raw("  │  "),
        Span::styled(format!("Errors {errors}"), Style::default().fg(Color::Red)),
        Span::raw("  │  "),
        Span::raw(format!(
            "Progress {}/{}",
            session.current_index(),
            session.snippet().len()
        )),
    ]);
    Paragraph::new(stats)
        .block(Block::default().borders(Borders::ALL).title(title))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    if let Some(message) = app.practice.notification() {
        Paragraph::new(Span::styled(
            format!("{message} (ctrl-d to dismiss)"),
            Style::default().fg(Color::Red),
        ))
        .render(chunks[3], buf);
    }

    let help = match session.phase() {
        Phase::Idle => "(enter) start  (^n) new snippet  (^l) language  (^o) history  (esc) quit",
        Phase::Running => "(^p) pause  (^s) stop  (^r) restart  (esc) quit",
        Phase::Paused => "(^p) resume  (^s) stop  (^r) restart  (esc) quit",
        Phase::Finished => "(^r) restart  (^n) new snippet  (^l) language  (^o) history  (esc) quit",
    };
    Paragraph::new(help)
        .style(Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);
}

fn relative_time(date: DateTime<Utc>) -> String {
    let secs = (Utc::now() - date).num_seconds().max(0) as u64;
    HumanTime::from(Duration::from_secs(secs)).to_text_en(Accuracy::Rough, Tense::Past)
}

fn summary_lines(summary: &HistorySummary) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(format!(
        "Sessions {}   Avg WPM {}   Avg accuracy {}%   Best WPM {}   Total time {}",
        summary.sessions,
        summary.avg_wpm,
        summary.avg_accuracy,
        summary.best_wpm,
        format_duration(summary.total_secs)
    ))];
    let per_language = summary
        .by_language
        .iter()
        .map(|(language, s)| format!("{language}: {} × {} wpm {}%", s.sessions, s.avg_wpm, s.avg_accuracy))
        .collect::<Vec<_>>()
        .join("   ");
    if !per_language.is_empty() {
        lines.push(Line::styled(per_language, Style::default().add_modifier(Modifier::DIM)));
    }
    lines
}

fn render_history(app: &App, area: Rect, buf: &mut Buffer) {
    let view = &app.history_view;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(summary_lines(&view.summary))
        .block(Block::default().borders(Borders::ALL).title("History"))
        .wrap(Wrap { trim: true })
        .render(chunks[0], buf);

    if let Some(error) = &view.error {
        Paragraph::new(error.as_str())
            .style(Style::default().fg(Color::Red))
            .block(Block::default().borders(Borders::ALL))
            .render(chunks[1], buf);
    } else if view.entries.is_empty() {
        Paragraph::new("No practice history yet.\nFinish a snippet to see it here!")
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL))
            .render(chunks[1], buf);
    } else {
        let header = Row::new(vec!["When", "Language", "WPM", "Accuracy", "Errors", "Time"]).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
        let rows = view
            .entries
            .iter()
            .skip(view.scroll_offset)
            .map(|e| {
                Row::new(vec![
                    Cell::from(relative_time(e.result.date)),
                    Cell::from(e.result.language.to_string()),
                    Cell::from(e.result.wpm.to_string()),
                    Cell::from(format!("{}%", e.result.accuracy)),
                    Cell::from(e.result.errors.to_string()),
                    Cell::from(format_duration(e.result.time)),
                ])
            })
            .collect::<Vec<_>>();

        Table::new(
            rows,
            [
                Constraint::Length(20),
                Constraint::Length(12),
                Constraint::Length(6),
                Constraint::Length(10),
                Constraint::Length(8),
                Constraint::Length(8),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(format!(
            "Recent sessions ({})",
            view.entries.len()
        )))
        .render(chunks[1], buf);
    }

    Paragraph::new("(↑/↓) scroll  (C) clear history  (esc) back")
        .style(Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
}

/// Plain-text history for the `history` subcommand
pub fn history_report(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No practice history yet.\n".to_string();
    }

    let mut out = String::new();
    for line in summary_lines(&HistorySummary::from_entries(entries)) {
        let _ = writeln!(out, "{line}");
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<20} {:<12} {:>5} {:>9} {:>7} {:>6}",
        "when", "language", "wpm", "accuracy", "errors", "time"
    );
    for e in entries {
        let _ = writeln!(
            out,
            "{:<20} {:<12} {:>5} {:>8}% {:>7} {:>6}",
            relative_time(e.result.date),
            e.result.language.to_string(),
            e.result.wpm,
            e.result.accuracy,
            e.result.errors,
            format_duration(e.result.time)
        );
    }
    out
}
