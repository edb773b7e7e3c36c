use std::collections::{BTreeMap, BTreeSet};

use crate::models::utterance::speaker_re;

/// Annotate speaker tokens with identification results, preserving the
/// originals for a downstream fixup pass.
///
/// Identified:  `CHUNK_0_A - Peter:`
/// Uncertain:   `CHUNK_0_A - <uncertain>:`
/// Unevaluated: `CHUNK_0_A:` (unchanged)
///
/// Everything outside the inserted annotations passes through byte for
/// byte; no inference happens here.
pub fn annotate_transcript(
    transcript: &str,
    assignments: &BTreeMap<usize, String>,
    uncertain_tokens: &BTreeSet<String>,
) -> String {
    let mut out = String::with_capacity(transcript.len() + 64);
    let mut last_end = 0;

    for (index, caps) in speaker_re().captures_iter(transcript).enumerate() {
        let token_match = caps.get(1).expect("pattern has a token group");
        if let Some(name) = assignments.get(&index) {
            out.push_str(&transcript[last_end..token_match.end()]);
            out.push_str(" - ");
            out.push_str(name);
            last_end = token_match.end();
        } else if uncertain_tokens.contains(token_match.as_str()) {
            out.push_str(&transcript[last_end..token_match.end()]);
            out.push_str(" - <uncertain>");
            last_end = token_match.end();
        }
    }

    out.push_str(&transcript[last_end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignments(pairs: &[(usize, &str)]) -> BTreeMap<usize, String> {
        pairs.iter().map(|(i, n)| (*i, n.to_string())).collect()
    }

    fn tokens(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_annotates_identified() {
        let transcript = "CHUNK_0_A: I think we should use DuckDB.\n\nCHUNK_0_B: That sounds right to me.\n";
        let result = annotate_transcript(
            transcript,
            &assignments(&[(0, "Peter"), (1, "Eby")]),
            &tokens(&[]),
        );
        assert!(result.contains("CHUNK_0_A - Peter: I think we should use DuckDB."));
        assert!(result.contains("CHUNK_0_B - Eby: That sounds right to me."));
    }

    #[test]
    fn test_annotates_minimal_utterance() {
        let result =
            annotate_transcript("CHUNK_0_A: Hi.\n", &assignments(&[(0, "Peter")]), &tokens(&[]));
        assert!(result.contains("CHUNK_0_A - Peter: Hi."));
    }

    #[test]
    fn test_marks_uncertain() {
        let result = annotate_transcript(
            "CHUNK_0_A: Hi.\n",
            &assignments(&[]),
            &tokens(&["CHUNK_0_A"]),
        );
        assert!(result.contains("CHUNK_0_A - <uncertain>: Hi."));
    }

    #[test]
    fn test_leaves_unevaluated_untouched() {
        let transcript = "CHUNK_0_A: I think we should use DuckDB.\n";
        let result = annotate_transcript(transcript, &assignments(&[]), &tokens(&[]));
        assert_eq!(result, transcript);
    }

    #[test]
    fn test_mixed() {
        let transcript = "\
CHUNK_0_A: I think we should use DuckDB for the normalized layer.

CHUNK_0_B: That sounds right to me, let me check the current setup.

CHUNK_0_C: We could also integrate it with the MCP server architecture.
";
        let result = annotate_transcript(
            transcript,
            &assignments(&[(0, "Peter")]),
            &tokens(&["CHUNK_0_B"]),
        );
        assert!(result.contains("CHUNK_0_A - Peter: I think"));
        assert!(result.contains("CHUNK_0_B - <uncertain>: That sounds"));
        assert!(result.contains("CHUNK_0_C: We could"));
    }

    #[test]
    fn test_assignment_wins_over_uncertain_for_that_utterance() {
        let transcript = "\
CHUNK_0_A: First utterance for this token right here.

CHUNK_0_A: Second utterance for the very same token.
";
        let result = annotate_transcript(
            transcript,
            &assignments(&[(1, "Peter")]),
            &tokens(&["CHUNK_0_A"]),
        );
        assert!(result.contains("CHUNK_0_A - <uncertain>: First"));
        assert!(result.contains("CHUNK_0_A - Peter: Second"));
    }

    #[test]
    fn test_conflicting_token_annotated_per_utterance() {
        let transcript = "\
CHUNK_0_A: I think we should use DuckDB for the normalized layer.

CHUNK_0_B: That sounds right to me, let me check the current setup.

CHUNK_0_A: Actually let me look at the IR agent logs instead.
";
        let result = annotate_transcript(
            transcript,
            &assignments(&[(0, "Peter"), (2, "Eby")]),
            &tokens(&[]),
        );
        assert!(result.contains("CHUNK_0_A - Peter: I think"));
        assert!(result.contains("CHUNK_0_A - Eby: Actually let me"));
    }

    #[test]
    fn test_preserves_non_utterance_bytes() {
        let transcript = "\
Some preamble text.

CHUNK_0_A: I think we should use DuckDB for the normalized layer.

--- CHUNK 1 ---

CHUNK_1_A: The visits pipeline outputs are what we really need.
";
        let result = annotate_transcript(
            transcript,
            &assignments(&[(0, "Peter"), (1, "Eby")]),
            &tokens(&[]),
        );
        assert!(result.contains("Some preamble text.\n"));
        assert!(result.contains("--- CHUNK 1 ---\n"));
        assert!(result.contains("CHUNK_0_A - Peter: I think"));
        assert!(result.contains("CHUNK_1_A - Eby: The visits"));
    }
}
