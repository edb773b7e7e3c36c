use std::collections::{BTreeMap, BTreeSet};

use crate::models::Utterance;
use crate::session::IdentificationOutcome;

/// Tokens assigned more than one distinct name.
///
/// Takes live (token, name) pairs and is recomputed on every call; a
/// conflict is informational, never blocking, since diarization may
/// genuinely split or merge a physical speaker across tokens.
pub fn conflicting_tokens<'a, I>(assigned: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut names_by_token: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (token, name) in assigned {
        names_by_token.entry(token).or_default().insert(name);
    }

    names_by_token
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .map(|(token, _)| token.to_string())
        .collect()
}

/// User-facing summary of a session outcome: identified tokens, conflicts
/// with per-name counts, and explicit unknowns.
pub fn format_identifications(utterances: &[Utterance], outcome: &IdentificationOutcome) -> String {
    // names per token, in order of first assigned utterance
    let mut token_order: Vec<&str> = Vec::new();
    let mut names_by_token: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (idx, name) in &outcome.assignments {
        let Some(utt) = utterances.get(*idx) else {
            continue;
        };
        if !names_by_token.contains_key(utt.token.as_str()) {
            token_order.push(&utt.token);
        }
        names_by_token
            .entry(&utt.token)
            .or_default()
            .push(name.as_str());
    }

    let mut lines: Vec<String> = Vec::new();
    for token in &token_order {
        let names = &names_by_token[token];
        let distinct: BTreeSet<&str> = names.iter().copied().collect();
        if distinct.len() == 1 {
            lines.push(format!("  {token} → {}", names[0]));
        } else {
            let mut counts: Vec<(usize, &str)> = distinct
                .iter()
                .map(|n| (names.iter().filter(|x| *x == n).count(), *n))
                .collect();
            counts.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(b.1)));
            let detail = counts
                .iter()
                .map(|(count, name)| format!("{name} ({count})"))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!(
                "  {token} → CONFLICTING: {detail} (token likely assigned to multiple speakers)"
            ));
        }
    }

    for token in &outcome.uncertain_tokens {
        if !names_by_token.contains_key(token.as_str()) {
            lines.push(format!("  {token} → unknown"));
        }
    }

    lines.join("\n")
}
