use std::io::{self, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::info;

use crate::models::KeyMap;
use crate::session::{IdentificationOutcome, IdentificationSession, SessionError};

pub const MAX_SNIPPET_DISPLAY: usize = 200;
pub const MAX_CONTEXT_DISPLAY: usize = 120;

const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Keys the line-oriented walk understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
    Backspace,
    CtrlC,
    Other,
}

/// Source of single keypresses, injectable for tests
pub trait KeySource {
    fn read_key(&mut self) -> io::Result<Key>;
}

/// Raw terminal mode held for exactly one read, restored on every exit path
struct RawModeGuard;

impl RawModeGuard {
    fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Blocking single-keypress reader for a real terminal
pub struct TerminalKeys;

impl KeySource for TerminalKeys {
    fn read_key(&mut self) -> io::Result<Key> {
        let _guard = RawModeGuard::acquire()?;
        loop {
            if let Event::Key(ev) = event::read()? {
                if ev.kind == KeyEventKind::Press {
                    return Ok(translate(ev));
                }
            }
        }
    }
}

fn translate(ev: KeyEvent) -> Key {
    if ev.modifiers.contains(KeyModifiers::CONTROL) && ev.code == KeyCode::Char('c') {
        return Key::CtrlC;
    }
    match ev.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Esc => Key::Escape,
        KeyCode::Backspace | KeyCode::Delete => Key::Backspace,
        _ => Key::Other,
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        let cut: String = text.chars().take(max_len).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn help_line(keymap: &KeyMap) -> String {
    let legend = keymap
        .iter()
        .map(|(key, name)| format!("{key} = {name}"))
        .collect::<Vec<_>>()
        .join("    ");
    format!("  {legend}    Esc = uncertain    q = done w/ token    Bksp = back")
}

/// Walk every substantial utterance chunk by chunk, one raw keypress per
/// step. A bound letter assigns, Esc marks uncertain, `q` gives up on the
/// token, Backspace undoes, Ctrl-C aborts, anything else re-prompts.
pub fn run_prompt<K: KeySource, W: Write>(
    session: &mut IdentificationSession,
    keymap: &KeyMap,
    mut keys: K,
    mut out: W,
) -> Result<IdentificationOutcome, SessionError> {
    if !session.has_candidates() {
        writeln!(
            out,
            "No CHUNK_N_X speaker tokens found in transcript - nothing to identify."
        )?;
        writeln!(out, "(Was this transcript already labeled with real names?)")?;
        return Ok(session.outcome());
    }

    info!(
        "starting guided identification: {} utterances, {} substantial",
        session.rows().len(),
        session.substantial_total()
    );

    let help = help_line(keymap);
    let mut banner_chunk: Option<String> = None;

    while let Some(idx) = session.next_pending() {
        let row = session.rows()[idx].clone();

        if banner_chunk.as_deref() != Some(row.chunk_id.as_str()) {
            writeln!(out, "\n{help}\n\n--- CHUNK {} ---\n", row.chunk_id)?;
            banner_chunk = Some(row.chunk_id.clone());
        }

        let (before, after) = session.context_around(idx);
        if let Some(ctx) = before {
            let text = truncate(&ctx.text, MAX_CONTEXT_DISPLAY);
            writeln!(out, "{DIM}      {}: \"{text}\"{RESET}", ctx.token)?;
        }
        let (seq, total) = session.progress(idx);
        writeln!(out, "{BOLD}{} [{seq}/{total}]:{RESET}", row.token)?;
        writeln!(out, "  \"{}\"", truncate(&row.text, MAX_SNIPPET_DISPLAY))?;
        if let Some(ctx) = after {
            let text = truncate(&ctx.text, MAX_CONTEXT_DISPLAY);
            writeln!(out, "{DIM}      {}: \"{text}\"{RESET}", ctx.token)?;
        }

        write!(out, "  → ")?;
        out.flush()?;

        match keys.read_key()? {
            Key::CtrlC => {
                writeln!(out, "abort")?;
                return Err(SessionError::Aborted);
            }
            Key::Backspace => {
                if session.undo() {
                    writeln!(out, "back\n")?;
                } else {
                    writeln!(out, "(first)\n")?;
                }
            }
            Key::Escape => {
                session.mark_uncertain();
                writeln!(out, "don't know\n")?;
            }
            Key::Char('q') => {
                session.skip_token();
                writeln!(out, "done with {}\n", row.token)?;
            }
            Key::Char(c) => match keymap.name_for(c) {
                Some(name) => {
                    let name = name.to_string();
                    session.assign(&name);
                    writeln!(out, "{name}\n")?;
                }
                None => writeln!(out, "?")?,
            },
            Key::Other => writeln!(out, "?")?,
        }
    }

    Ok(session.outcome())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_utterances, KeyMap, MIN_SUBSTANTIAL_LEN};

    struct ScriptedKeys(Vec<Key>);

    impl KeySource for ScriptedKeys {
        fn read_key(&mut self) -> io::Result<Key> {
            if self.0.is_empty() {
                panic!("scripted keys exhausted");
            }
            Ok(self.0.remove(0))
        }
    }

    fn run(transcript: &str, names: &[&str], keys: Vec<Key>) -> (IdentificationOutcome, String) {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let keymap = KeyMap::derive(&names);
        let mut session =
            IdentificationSession::new(&parse_utterances(transcript), MIN_SUBSTANTIAL_LEN);
        let mut out = Vec::new();
        let outcome = run_prompt(&mut session, &keymap, ScriptedKeys(keys), &mut out)
            .expect("session should complete");
        (outcome, String::from_utf8(out).unwrap())
    }

    const TWO_SPEAKERS: &str = "\
CHUNK_0_A: I think we should use DuckDB for the normalized layer and GizmoSQL.

CHUNK_0_B: That makes sense, let me check the current setup and get back to you.
";

    const FOUR_UTTERANCES: &str = "\
CHUNK_0_A: I think we should use DuckDB for the normalized layer and GizmoSQL.

CHUNK_0_B: That makes sense, let me check the current setup and get back to you.

CHUNK_0_A: Also we need to benchmark the existing Spark-based approach for comparison.

CHUNK_0_B: Right, I'll set up the performance testing framework for that benchmarking.
";

    #[test]
    fn test_basic_walk() {
        let (outcome, _) = run(TWO_SPEAKERS, &["Peter", "Eby"], vec![
            Key::Char('p'),
            Key::Char('e'),
        ]);
        assert_eq!(outcome.assignments[&0], "Peter");
        assert_eq!(outcome.assignments[&1], "Eby");
        assert!(outcome.uncertain_tokens.is_empty());
    }

    #[test]
    fn test_walk_interleaves_tokens_in_transcript_order() {
        let (outcome, _) = run(FOUR_UTTERANCES, &["Peter", "Eby"], vec![
            Key::Char('p'),
            Key::Char('e'),
            Key::Char('p'),
            Key::Char('e'),
        ]);
        assert_eq!(outcome.assignments[&0], "Peter");
        assert_eq!(outcome.assignments[&1], "Eby");
        assert_eq!(outcome.assignments[&2], "Peter");
        assert_eq!(outcome.assignments[&3], "Eby");
    }

    #[test]
    fn test_esc_marks_token_uncertain() {
        let (outcome, out) = run(TWO_SPEAKERS, &["Peter", "Eby"], vec![
            Key::Char('p'),
            Key::Escape,
        ]);
        assert_eq!(outcome.assignments.len(), 1);
        assert!(outcome.uncertain_tokens.contains("CHUNK_0_B"));
        assert!(out.contains("don't know"));
    }

    #[test]
    fn test_esc_then_later_identification_still_records() {
        let (outcome, _) = run(FOUR_UTTERANCES, &["Peter", "Eby"], vec![
            Key::Escape,
            Key::Char('e'),
            Key::Char('p'),
            Key::Char('e'),
        ]);
        assert!(!outcome.assignments.contains_key(&0));
        assert_eq!(outcome.assignments[&1], "Eby");
        assert_eq!(outcome.assignments[&2], "Peter");
        assert_eq!(outcome.assignments[&3], "Eby");
        assert!(outcome.uncertain_tokens.contains("CHUNK_0_A"));
    }

    #[test]
    fn test_q_skips_token_without_uncertainty() {
        let transcript = "\
CHUNK_0_A: I think we should use DuckDB for the normalized layer and GizmoSQL.

CHUNK_0_B: That makes sense, let me check the current setup and get back to you.

CHUNK_0_C: We could also integrate it with the MCP server architecture we discussed.

CHUNK_0_B: Right, I'll set up the performance testing framework for that benchmarking.
";
        let (outcome, out) = run(transcript, &["Peter", "Eby"], vec![
            Key::Char('p'),
            Key::Char('q'),
            Key::Char('e'),
        ]);
        assert_eq!(outcome.assignments[&0], "Peter");
        assert!(!outcome.assignments.contains_key(&1));
        assert!(!outcome.assignments.contains_key(&3));
        assert_eq!(outcome.assignments[&2], "Eby");
        assert!(!outcome.uncertain_tokens.contains("CHUNK_0_B"));
        assert!(out.contains("done with"));
    }

    #[test]
    fn test_backspace_corrects_previous_answer() {
        let (outcome, _) = run(TWO_SPEAKERS, &["Peter", "Eby"], vec![
            Key::Char('p'),
            Key::Backspace,
            Key::Char('e'),
            Key::Char('e'),
        ]);
        assert_eq!(outcome.assignments[&0], "Eby");
        assert_eq!(outcome.assignments[&1], "Eby");
    }

    #[test]
    fn test_backspace_on_first_prompt_is_noop() {
        let (outcome, out) = run(TWO_SPEAKERS, &["Peter", "Eby"], vec![
            Key::Backspace,
            Key::Char('p'),
            Key::Char('e'),
        ]);
        assert_eq!(outcome.assignments[&0], "Peter");
        assert!(out.contains("(first)"));
    }

    #[test]
    fn test_backspace_undoes_token_skip() {
        let transcript = "\
CHUNK_0_A: I think we should use DuckDB for the normalized layer and GizmoSQL.

CHUNK_0_B: That makes sense, let me check the current setup and get back to you.

CHUNK_0_C: We could also integrate it with the MCP server architecture we discussed.

CHUNK_0_B: Right, I'll set up the performance testing framework for that benchmarking.
";
        let (outcome, _) = run(transcript, &["Peter", "Eby"], vec![
            Key::Char('p'),
            Key::Char('q'),
            Key::Backspace,
            Key::Char('e'),
            Key::Char('e'),
            Key::Char('e'),
        ]);
        assert_eq!(outcome.assignments[&0], "Peter");
        assert_eq!(outcome.assignments[&1], "Eby");
        assert_eq!(outcome.assignments[&2], "Eby");
        assert_eq!(outcome.assignments[&3], "Eby");
        assert!(outcome.uncertain_tokens.is_empty());
    }

    #[test]
    fn test_ctrl_c_aborts() {
        let names = vec!["Peter".to_string(), "Eby".to_string()];
        let keymap = KeyMap::derive(&names);
        let mut session =
            IdentificationSession::new(&parse_utterances(TWO_SPEAKERS), MIN_SUBSTANTIAL_LEN);
        let result = run_prompt(
            &mut session,
            &keymap,
            ScriptedKeys(vec![Key::Char('p'), Key::CtrlC]),
            Vec::new(),
        );
        assert!(matches!(result, Err(SessionError::Aborted)));
    }

    #[test]
    fn test_unknown_key_reprompts_without_mutation() {
        let (outcome, out) = run(TWO_SPEAKERS, &["Peter", "Eby"], vec![
            Key::Char('z'),
            Key::Other,
            Key::Char('p'),
            Key::Char('e'),
        ]);
        assert_eq!(outcome.assignments[&0], "Peter");
        assert_eq!(outcome.assignments[&1], "Eby");
        assert!(out.contains('?'));
    }

    #[test]
    fn test_context_lines_shown_dim() {
        let transcript = "\
CHUNK_0_A: I think we should use DuckDB for the normalized layer and GizmoSQL.

CHUNK_0_B: That makes sense, let me check the current setup and get back to you.

CHUNK_0_C: We could also integrate it with the MCP server architecture we discussed.
";
        let (_, out) = run(transcript, &["Peter", "Eby"], vec![
            Key::Char('p'),
            Key::Char('e'),
            Key::Char('e'),
        ]);
        assert!(out.contains("      CHUNK_0_A: \""));
        assert!(out.contains("      CHUNK_0_C: \""));
    }

    #[test]
    fn test_progress_indicator_on_the_fly() {
        let (_, out) = run(FOUR_UTTERANCES, &["Peter", "Eby"], vec![
            Key::Char('p'),
            Key::Char('e'),
            Key::Backspace,
            Key::Char('e'),
            Key::Char('p'),
            Key::Char('e'),
        ]);
        assert!(out.contains("CHUNK_0_A [1/2]:"));
        assert!(out.contains("CHUNK_0_B [2/2]:"));
    }

    #[test]
    fn test_chunk_banner_per_chunk() {
        let transcript = "\
CHUNK_0_A: I think we should use DuckDB for the normalized layer and GizmoSQL.

--- CHUNK_1 ---

CHUNK_1_A: The visits pipeline outputs are what we really need to get at first.
";
        let (_, out) = run(transcript, &["Peter"], vec![Key::Char('p'), Key::Char('p')]);
        assert!(out.contains("--- CHUNK 0 ---"));
        assert!(out.contains("--- CHUNK 1 ---"));
    }

    #[test]
    fn test_nothing_to_identify() {
        let (outcome, out) = run("Just prose, no tokens.\n", &["Peter"], vec![]);
        assert!(outcome.assignments.is_empty());
        assert!(out.contains("nothing to identify"));
    }
}
