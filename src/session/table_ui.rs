use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Cell, Paragraph, Row as TableRow, Table, TableState};
use ratatui::Frame;

use crate::session::table::{DisplayRow, TableApp};
use crate::session::UtteranceState;

const MAX_ROW_TEXT: usize = 120;

fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        let cut: String = text.chars().take(max_len).collect();
        format!("{cut}..")
    } else {
        text.to_string()
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Render one frame: legend, table, expanded text for the cursor row, and a
/// live status line. Everything is derived from session state each frame.
pub(crate) fn render(frame: &mut Frame, app: &TableApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // legend
            Constraint::Min(5),    // table
            Constraint::Length(2), // expanded text
            Constraint::Length(1), // status bar
        ])
        .split(frame.area());

    render_legend(frame, app, chunks[0]);
    render_table(frame, app, chunks[1]);
    render_expanded(frame, app, chunks[2]);
    render_status(frame, app, chunks[3]);
}

fn render_legend(frame: &mut Frame, app: &TableApp, area: ratatui::layout::Rect) {
    let bindings = app
        .keymap()
        .iter()
        .map(|(key, name)| format!("{key} = {name}"))
        .collect::<Vec<_>>()
        .join("  ");
    let legend = format!(
        " {bindings}    Esc = uncertain  u = clear  q = done w/ token  Tab = short  Shift-↑↓ = jump  Enter = submit"
    );
    frame.render_widget(Paragraph::new(legend), area);
}

fn render_table(frame: &mut Frame, app: &TableApp, area: ratatui::layout::Rect) {
    let session = app.session();
    let conflicts = session.conflicts();
    let (display, selected) = app.display_rows();

    let who_width = app
        .keymap()
        .names()
        .map(|n| n.chars().count())
        .max()
        .unwrap_or(3)
        .max(3) as u16;

    let rows: Vec<TableRow> = display
        .iter()
        .map(|row| match row {
            DisplayRow::Separator(chunk_id) => TableRow::new(vec![
                Cell::from(format!("── CHUNK {chunk_id} ──")),
                Cell::from(""),
                Cell::from(""),
                Cell::from(""),
                Cell::from(""),
            ])
            .style(Style::default().fg(Color::DarkGray)),
            DisplayRow::Utterance(row) => {
                let who = match session.state(row.utt_idx) {
                    UtteranceState::Assigned(name) => name.to_string(),
                    UtteranceState::Uncertain => "?".to_string(),
                    _ => String::new(),
                };
                let conflict = if conflicts.contains(&row.token) { "×" } else { "" };
                TableRow::new(vec![
                    Cell::from(format!("{} {}", row.chunk_id, row.letter())),
                    Cell::from(word_count(&row.text).to_string()),
                    Cell::from(conflict),
                    Cell::from(who),
                    Cell::from(truncate(&row.text, MAX_ROW_TEXT)),
                ])
            }
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(7),
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Length(who_width),
            Constraint::Min(10),
        ],
    )
    .header(
        TableRow::new(vec!["Tok", "Wc", "!", "Who", "Text"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = TableState::default();
    state.select(selected);
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_expanded(frame: &mut Frame, app: &TableApp, area: ratatui::layout::Rect) {
    let text = match app.session().current() {
        Some(row) => format!("► {}", row.text),
        None => String::new(),
    };
    frame.render_widget(
        Paragraph::new(Line::from(Span::raw(text))),
        area,
    );
}

fn render_status(frame: &mut Frame, app: &TableApp, area: ratatui::layout::Rect) {
    let session = app.session();
    let parts = [
        format!(
            "{}/{} labeled",
            session.assigned_count(),
            session.substantial_total()
        ),
        format!("{} uncertain", session.uncertain_tokens().len()),
        format!("{} conflicts", session.conflicts().len()),
        "Enter = submit".to_string(),
    ];
    frame.render_widget(
        Paragraph::new(format!(" {}", parts.join("  ·  ")))
            .style(Style::default().fg(Color::DarkGray)),
        area,
    );
}
