use std::io;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::info;

use crate::models::KeyMap;
use crate::session::{
    table_ui, Direction, IdentificationOutcome, IdentificationSession, Row, SessionError,
};

/// Table front end state: the shared session plus exit flags.
///
/// Key handling is a plain method over injected `KeyEvent`s so the adapter
/// is testable without a terminal; the event loop and rendering live in
/// `run_table` / `table_ui`.
pub struct TableApp {
    session: IdentificationSession,
    keymap: KeyMap,
    submitted: bool,
    aborted: bool,
}

/// A renderable line of the table: chunk separator or utterance row
pub(crate) enum DisplayRow<'a> {
    Separator(&'a str),
    Utterance(&'a Row),
}

impl TableApp {
    pub fn new(session: IdentificationSession, keymap: KeyMap) -> Self {
        Self {
            session,
            keymap,
            submitted: false,
            aborted: false,
        }
    }

    pub fn session(&self) -> &IdentificationSession {
        &self.session
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    pub fn submitted(&self) -> bool {
        self.submitted
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    pub fn should_exit(&self) -> bool {
        self.submitted || self.aborted
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') if ctrl => self.aborted = true,
            KeyCode::Enter => self.submitted = true,
            KeyCode::Up if shift => self.session.jump_unresolved(Direction::Up),
            KeyCode::Down if shift => self.session.jump_unresolved(Direction::Down),
            KeyCode::Up => self.session.move_cursor(Direction::Up),
            KeyCode::Down => self.session.move_cursor(Direction::Down),
            KeyCode::Esc => self.session.mark_uncertain(),
            KeyCode::Tab => self.session.toggle_short(),
            KeyCode::Backspace | KeyCode::Delete => {
                self.session.undo();
            }
            KeyCode::Char('u') => self.session.clear_current(),
            KeyCode::Char('q') => self.session.skip_token(),
            KeyCode::Char(c) => {
                if let Some(name) = self.keymap.name_for(c) {
                    let name = name.to_string();
                    self.session.assign(&name);
                }
            }
            _ => {}
        }
    }

    /// Visible rows with chunk separators interleaved, plus the display
    /// index of the cursor row. Rebuilt from live state on every frame.
    pub(crate) fn display_rows(&self) -> (Vec<DisplayRow<'_>>, Option<usize>) {
        let mut rows = Vec::new();
        let mut selected = None;
        let mut last_chunk: Option<&str> = None;

        for row in self.session.rows() {
            if !self.session.show_short() && row.short {
                continue;
            }
            if last_chunk != Some(row.chunk_id.as_str()) {
                rows.push(DisplayRow::Separator(row.chunk_id.as_str()));
                last_chunk = Some(row.chunk_id.as_str());
            }
            if row.utt_idx == self.session.cursor() {
                selected = Some(rows.len());
            }
            rows.push(DisplayRow::Utterance(row));
        }

        (rows, selected)
    }

    pub fn into_outcome(self) -> IdentificationOutcome {
        self.session.outcome()
    }
}

fn setup_panic_hook() {
    let original = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        original(info);
    }));
}

/// Run the table front end to completion.
///
/// Returns the outcome on submit, `SessionError::Aborted` on Ctrl-C/Ctrl-Q;
/// an aborted session must not be persisted by the caller.
pub fn run_table(
    session: IdentificationSession,
    keymap: KeyMap,
) -> Result<IdentificationOutcome, SessionError> {
    if !session.has_candidates() {
        println!("No CHUNK_N_X speaker tokens found in transcript - nothing to identify.");
        return Ok(session.outcome());
    }

    info!(
        "starting table identification: {} utterances, {} substantial",
        session.rows().len(),
        session.substantial_total()
    );

    let mut app = TableApp::new(session, keymap);

    setup_panic_hook();
    let mut terminal = ratatui::init();
    let result = run_loop(&mut terminal, &mut app);
    ratatui::restore();
    result?;

    if app.aborted() {
        return Err(SessionError::Aborted);
    }
    Ok(app.into_outcome())
}

fn run_loop(terminal: &mut ratatui::DefaultTerminal, app: &mut TableApp) -> io::Result<()> {
    loop {
        terminal.draw(|frame| table_ui::render(frame, app))?;

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
            _ => {}
        }

        if app.should_exit() {
            return Ok(());
        }
    }
}
