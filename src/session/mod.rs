pub mod prompt;
pub mod report;
pub mod table;
mod table_ui;

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::debug;

use crate::models::Utterance;

/// Why an interactive session ended without producing a result
#[derive(Debug, Error)]
pub enum SessionError {
    /// The user cancelled; the caller must not persist anything
    #[error("identification aborted")]
    Aborted,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Cursor travel direction; chosen by explicit navigation only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Observable state of one (token, utterance) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceState<'a> {
    Unvisited,
    Assigned(&'a str),
    Uncertain,
    /// Token-level "done, infer the rest": never evaluated, not uncertain
    Skipped,
}

/// One session row; rows are ordered and indexed by utterance index
#[derive(Debug, Clone)]
pub struct Row {
    pub utt_idx: usize,
    pub token: String,
    pub chunk_id: String,
    pub text: String,
    pub short: bool,
}

impl Row {
    /// Diarization-cluster letter portion of the token, e.g. "A"
    pub fn letter(&self) -> &str {
        self.token.rsplit('_').next().unwrap_or("")
    }
}

#[derive(Debug, Clone)]
enum UndoEntry {
    Edit {
        utt_idx: usize,
        prev_name: Option<String>,
        prev_uncertain: bool,
    },
    SkippedToken {
        token: String,
        at_utt: usize,
    },
}

/// Final product of a session: per-utterance names plus tokens the human
/// reviewed but could not identify
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentificationOutcome {
    pub assignments: BTreeMap<usize, String>,
    pub uncertain_tokens: BTreeSet<String>,
}

/// UI-agnostic speaker-identification state machine.
///
/// Both front ends translate key events into these operations; all shared
/// semantics (undo exactness, conflict detection, the assigned/uncertain/
/// skipped distinction) live here and nowhere else.
pub struct IdentificationSession {
    rows: Vec<Row>,
    assignments: BTreeMap<usize, String>,
    /// Per-utterance marks; the reported uncertain set is token-level
    uncertain_marks: BTreeSet<usize>,
    skipped: BTreeSet<String>,
    undo_stack: Vec<UndoEntry>,
    cursor: usize,
    travel: Direction,
    show_short: bool,
}

impl IdentificationSession {
    pub fn new(utterances: &[Utterance], min_len: usize) -> Self {
        let rows: Vec<Row> = utterances
            .iter()
            .map(|u| Row {
                utt_idx: u.index,
                token: u.token.clone(),
                chunk_id: u.chunk_id.clone(),
                text: u.text.clone(),
                short: u.text.chars().count() < min_len,
            })
            .collect();

        let cursor = rows.iter().position(|r| !r.short).unwrap_or(0);
        Self {
            rows,
            assignments: BTreeMap::new(),
            uncertain_marks: BTreeSet::new(),
            skipped: BTreeSet::new(),
            undo_stack: Vec::new(),
            cursor,
            travel: Direction::Down,
            show_short: false,
        }
    }

    // --- queries ---

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn travel(&self) -> Direction {
        self.travel
    }

    pub fn show_short(&self) -> bool {
        self.show_short
    }

    /// Whether the session has anything to walk at all
    pub fn has_candidates(&self) -> bool {
        self.rows.iter().any(|r| !r.short)
    }

    pub fn current(&self) -> Option<&Row> {
        let row = self.rows.get(self.cursor)?;
        self.is_visible(self.cursor).then_some(row)
    }

    pub fn state(&self, utt_idx: usize) -> UtteranceState<'_> {
        if let Some(name) = self.assignments.get(&utt_idx) {
            return UtteranceState::Assigned(name);
        }
        if self.uncertain_marks.contains(&utt_idx) {
            return UtteranceState::Uncertain;
        }
        match self.rows.get(utt_idx) {
            Some(row) if self.skipped.contains(&row.token) => UtteranceState::Skipped,
            _ => UtteranceState::Unvisited,
        }
    }

    pub fn assignment(&self, utt_idx: usize) -> Option<&str> {
        self.assignments.get(&utt_idx).map(String::as_str)
    }

    /// Tokens with at least one utterance the human marked uncertain
    pub fn uncertain_tokens(&self) -> BTreeSet<String> {
        self.uncertain_marks
            .iter()
            .filter_map(|idx| self.rows.get(*idx))
            .map(|row| row.token.clone())
            .collect()
    }

    /// Tokens currently assigned more than one distinct name. Recomputed
    /// from live state on every call.
    pub fn conflicts(&self) -> BTreeSet<String> {
        report::conflicting_tokens(self.assigned_pairs())
    }

    pub(crate) fn assigned_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assignments
            .iter()
            .filter_map(|(idx, name)| Some((self.rows.get(*idx)?.token.as_str(), name.as_str())))
    }

    pub fn outcome(&self) -> IdentificationOutcome {
        IdentificationOutcome {
            assignments: self.assignments.clone(),
            uncertain_tokens: self.uncertain_tokens(),
        }
    }

    /// `[k/n]` for an utterance among its token's substantial utterances in
    /// the same chunk; computed on the fly so it survives undo.
    pub fn progress(&self, utt_idx: usize) -> (usize, usize) {
        let Some(target) = self.rows.get(utt_idx) else {
            return (0, 0);
        };
        let siblings = self
            .rows
            .iter()
            .filter(|r| !r.short && r.chunk_id == target.chunk_id && r.token == target.token);
        let total = siblings.clone().count();
        let seq = siblings.filter(|r| r.utt_idx <= utt_idx).count();
        (seq, total)
    }

    pub fn substantial_total(&self) -> usize {
        self.rows.iter().filter(|r| !r.short).count()
    }

    pub fn assigned_count(&self) -> usize {
        self.assignments.len()
    }

    // --- visibility / navigation ---

    fn is_visible(&self, idx: usize) -> bool {
        match self.rows.get(idx) {
            Some(row) => self.show_short || !row.short,
            None => false,
        }
    }

    fn next_visible(&self, from: usize, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Down => (from + 1..self.rows.len()).find(|i| self.is_visible(*i)),
            Direction::Up => (0..from).rev().find(|i| self.is_visible(*i)),
        }
    }

    /// Unvisited in the per-utterance sense: drives the guided walk and
    /// auto-advance, so later utterances of an uncertain token still get
    /// their turn.
    fn is_unvisited(&self, idx: usize) -> bool {
        let Some(row) = self.rows.get(idx) else {
            return false;
        };
        self.assignments.get(&idx).is_none()
            && !self.uncertain_marks.contains(&idx)
            && !self.skipped.contains(&row.token)
    }

    /// Unresolved in the token-level sense used by jump navigation
    fn is_unresolved(&self, idx: usize, uncertain_tokens: &BTreeSet<String>) -> bool {
        let Some(row) = self.rows.get(idx) else {
            return false;
        };
        self.assignments.get(&idx).is_none()
            && !uncertain_tokens.contains(&row.token)
            && !self.skipped.contains(&row.token)
    }

    pub fn move_cursor(&mut self, direction: Direction) {
        self.travel = direction;
        if let Some(idx) = self.next_visible(self.cursor, direction) {
            self.cursor = idx;
        }
    }

    /// Jump to the nearest utterance in `direction` whose token is neither
    /// assigned here nor marked uncertain nor skipped; sets travel direction.
    pub fn jump_unresolved(&mut self, direction: Direction) {
        self.travel = direction;
        let uncertain = self.uncertain_tokens();
        let mut idx = self.cursor;
        while let Some(next) = self.next_visible(idx, direction) {
            if self.is_unresolved(next, &uncertain) {
                self.cursor = next;
                return;
            }
            idx = next;
        }
    }

    /// Toggle short-utterance visibility, keeping the cursor anchored
    pub fn toggle_short(&mut self) {
        self.show_short = !self.show_short;
        if !self.is_visible(self.cursor) {
            self.relocate_cursor_near(self.cursor);
        }
    }

    /// Nearest visible row to `anchor`, preferring unresolved rows
    fn relocate_cursor_near(&mut self, anchor: usize) {
        let uncertain = self.uncertain_tokens();
        let mut best: Option<(usize, usize)> = None;
        for idx in 0..self.rows.len() {
            if !self.is_visible(idx) {
                continue;
            }
            let mut dist = anchor.abs_diff(idx);
            if !self.is_unresolved(idx, &uncertain) {
                dist += 10_000;
            }
            if best.is_none_or(|(_, d)| dist < d) {
                best = Some((idx, dist));
            }
        }
        if let Some((idx, _)) = best {
            self.cursor = idx;
        }
    }

    /// Move to the adjacent visible row in the travel direction, but only
    /// when that row has not been visited yet.
    fn auto_advance(&mut self) {
        if let Some(adj) = self.next_visible(self.cursor, self.travel) {
            if self.is_unvisited(adj) {
                self.cursor = adj;
            }
        }
    }

    /// Nearest unvisited row in the travel direction, skipping everything a
    /// token-level skip bypassed
    fn advance_to_unvisited(&mut self) {
        let mut idx = self.cursor;
        while let Some(next) = self.next_visible(idx, self.travel) {
            if self.is_unvisited(next) {
                self.cursor = next;
                return;
            }
            idx = next;
        }
    }

    /// Guided-walk traversal: from the cursor, the next substantial
    /// utterance (transcript order) still awaiting evaluation. Moves the
    /// cursor to the returned row.
    pub fn next_pending(&mut self) -> Option<usize> {
        let start = self.cursor;
        for idx in start..self.rows.len() {
            if !self.rows[idx].short && self.is_unvisited(idx) {
                self.cursor = idx;
                return Some(idx);
            }
        }
        None
    }

    /// Nearest substantial utterances before and after `utt_idx`, any token
    pub fn context_around(&self, utt_idx: usize) -> (Option<&Row>, Option<&Row>) {
        let before = self.rows[..utt_idx.min(self.rows.len())]
            .iter()
            .rev()
            .find(|r| !r.short);
        let after = self
            .rows
            .get(utt_idx + 1..)
            .and_then(|rest| rest.iter().find(|r| !r.short));
        (before, after)
    }

    // --- operations ---

    pub fn assign(&mut self, name: &str) {
        let Some(row) = self.current() else {
            return;
        };
        let utt_idx = row.utt_idx;
        debug!("utt[{}] {} -> {}", utt_idx, row.token, name);
        self.undo_stack.push(UndoEntry::Edit {
            utt_idx,
            prev_name: self.assignments.get(&utt_idx).cloned(),
            prev_uncertain: self.uncertain_marks.contains(&utt_idx),
        });
        self.assignments.insert(utt_idx, name.to_string());
        self.uncertain_marks.remove(&utt_idx);
        self.auto_advance();
    }

    pub fn mark_uncertain(&mut self) {
        let Some(row) = self.current() else {
            return;
        };
        let utt_idx = row.utt_idx;
        debug!("utt[{}] {} -> <uncertain>", utt_idx, row.token);
        self.undo_stack.push(UndoEntry::Edit {
            utt_idx,
            prev_name: self.assignments.get(&utt_idx).cloned(),
            prev_uncertain: self.uncertain_marks.contains(&utt_idx),
        });
        self.assignments.remove(&utt_idx);
        self.uncertain_marks.insert(utt_idx);
        self.auto_advance();
    }

    /// Give up on the current row's token: its remaining utterances are
    /// bypassed, left unassigned and explicitly not uncertain.
    pub fn skip_token(&mut self) {
        let Some(row) = self.current() else {
            return;
        };
        let token = row.token.clone();
        let at_utt = row.utt_idx;
        if self.skipped.contains(&token) {
            return;
        }
        debug!("utt[{}] {} -> done (skip remaining)", at_utt, token);
        self.undo_stack.push(UndoEntry::SkippedToken {
            token: token.clone(),
            at_utt,
        });
        self.skipped.insert(token);
        self.advance_to_unvisited();
    }

    /// Remove only the current row's assignment; undoable, no advance
    pub fn clear_current(&mut self) {
        let Some(row) = self.current() else {
            return;
        };
        let utt_idx = row.utt_idx;
        let token = row.token.clone();
        if let Some(prev) = self.assignments.remove(&utt_idx) {
            debug!("utt[{}] {} -> cleared", utt_idx, token);
            self.undo_stack.push(UndoEntry::Edit {
                utt_idx,
                prev_name: Some(prev),
                prev_uncertain: self.uncertain_marks.contains(&utt_idx),
            });
        }
    }

    /// Revert the most recent action and move the cursor back to it.
    /// Restores both the assignment and the uncertain mark exactly.
    /// Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.undo_stack.pop() else {
            return false;
        };
        match entry {
            UndoEntry::Edit {
                utt_idx,
                prev_name,
                prev_uncertain,
            } => {
                debug!("undo utt[{}] (restored {:?})", utt_idx, prev_name);
                match prev_name {
                    Some(name) => {
                        self.assignments.insert(utt_idx, name);
                    }
                    None => {
                        self.assignments.remove(&utt_idx);
                    }
                }
                if prev_uncertain {
                    self.uncertain_marks.insert(utt_idx);
                } else {
                    self.uncertain_marks.remove(&utt_idx);
                }
                self.cursor = utt_idx;
            }
            UndoEntry::SkippedToken { token, at_utt } => {
                debug!("undo skip of {}", token);
                self.skipped.remove(&token);
                self.cursor = at_utt;
            }
        }
        if !self.is_visible(self.cursor) {
            self.relocate_cursor_near(self.cursor);
        }
        true
    }
}
