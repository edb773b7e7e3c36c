use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static TOKEN_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(CHUNK_\d+_[A-Z]+):").unwrap());

static SPEAKER_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]+):\s*(.*)$").unwrap());

/// Rewrite a transcript with a token -> name mapping.
///
/// Replaces line-leading tokens (unmapped tokens pass through), then merges
/// adjacent same-speaker blocks with exactly one blank line between blocks.
/// Word content is never altered; only token text and whitespace change.
/// Applying the same mapping twice is idempotent modulo blank-line
/// normalization.
pub fn apply_labels(transcript: &str, mapping: &BTreeMap<String, String>) -> String {
    let replaced = replace_tokens(transcript, mapping);
    merge_speaker_blocks(&replaced)
}

fn replace_tokens(transcript: &str, mapping: &BTreeMap<String, String>) -> String {
    TOKEN_LINE_RE
        .replace_all(transcript, |caps: &regex::Captures| {
            match mapping.get(&caps[1]) {
                Some(name) => format!("{name}:"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

enum Block {
    Speech { speaker: String, texts: Vec<String> },
    /// Separator or prose line carried through verbatim, never merged across
    Literal(String),
}

fn flush(blocks: &mut Vec<Block>, current: &mut Option<(String, Vec<String>)>) {
    if let Some((speaker, texts)) = current.take() {
        blocks.push(Block::Speech { speaker, texts });
    }
}

fn merge_speaker_blocks(text: &str) -> String {
    let mut blocks: Vec<Block> = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with("---") {
            flush(&mut blocks, &mut current);
            blocks.push(Block::Literal(line.to_string()));
            continue;
        }

        match SPEAKER_BLOCK_RE.captures(trimmed) {
            Some(caps) => {
                let speaker = caps[1].to_string();
                let speech = caps[2].to_string();
                match &mut current {
                    Some((name, texts)) if *name == speaker => texts.push(speech),
                    _ => {
                        flush(&mut blocks, &mut current);
                        current = Some((speaker, vec![speech]));
                    }
                }
            }
            None => {
                flush(&mut blocks, &mut current);
                blocks.push(Block::Literal(line.to_string()));
            }
        }
    }
    flush(&mut blocks, &mut current);

    debug!("merged into {} speaker blocks", blocks.len());

    if blocks.is_empty() {
        return String::new();
    }

    let rendered: Vec<String> = blocks
        .iter()
        .map(|block| match block {
            Block::Speech { speaker, texts } => format!("{speaker}: {}", texts.join(" ")),
            Block::Literal(line) => line.clone(),
        })
        .collect();

    let mut out = rendered.join("\n\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(token, name)| (token.to_string(), name.to_string()))
            .collect()
    }

    #[test]
    fn test_apply_replaces_tokens() {
        let result = apply_labels(
            "CHUNK_0_A: Hello there.\n\nCHUNK_0_B: Hi!\n",
            &mapping(&[("CHUNK_0_A", "Alice"), ("CHUNK_0_B", "Bob")]),
        );
        assert_eq!(result, "Alice: Hello there.\n\nBob: Hi!\n");
    }

    #[test]
    fn test_merges_consecutive_same_speaker() {
        let result = apply_labels("Caleb: One.\n\nCaleb: Two.\n", &mapping(&[]));
        assert_eq!(result, "Caleb: One. Two.\n");
    }

    #[test]
    fn test_many_tokens_one_name_merge() {
        let result = apply_labels(
            "CHUNK_0_A: One.\n\nCHUNK_0_C: Two.\n\nCHUNK_0_B: Three.\n",
            &mapping(&[
                ("CHUNK_0_A", "Caleb"),
                ("CHUNK_0_C", "Caleb"),
                ("CHUNK_0_B", "Austin"),
            ]),
        );
        assert_eq!(result, "Caleb: One. Two.\n\nAustin: Three.\n");
    }

    #[test]
    fn test_unmapped_tokens_pass_through() {
        let result = apply_labels(
            "CHUNK_0_A: Hello.\n\nCHUNK_0_B: Hi.\n",
            &mapping(&[("CHUNK_0_A", "Alice")]),
        );
        assert_eq!(result, "Alice: Hello.\n\nCHUNK_0_B: Hi.\n");
    }

    #[test]
    fn test_separator_closes_blocks_and_survives() {
        let result = apply_labels(
            "CHUNK_0_A: One.\n\n---\n\nCHUNK_1_A: Two.\n",
            &mapping(&[("CHUNK_0_A", "Caleb"), ("CHUNK_1_A", "Caleb")]),
        );
        // same name on both sides, but the separator is never merged across
        assert_eq!(result, "Caleb: One.\n\n---\n\nCaleb: Two.\n");
    }

    #[test]
    fn test_decorated_separator_preserved_verbatim() {
        let result = apply_labels(
            "CHUNK_0_A: One.\n\n--- CHUNK_1 ---\n\nCHUNK_1_B: Two.\n",
            &mapping(&[("CHUNK_0_A", "Caleb"), ("CHUNK_1_B", "Caleb")]),
        );
        assert_eq!(result, "Caleb: One.\n\n--- CHUNK_1 ---\n\nCaleb: Two.\n");
    }

    #[test]
    fn test_prose_lines_preserved() {
        let result = apply_labels(
            "Recorded Tuesday.\n\nCHUNK_0_A: Hello.\n",
            &mapping(&[("CHUNK_0_A", "Alice")]),
        );
        assert_eq!(result, "Recorded Tuesday.\n\nAlice: Hello.\n");
    }

    #[test]
    fn test_blank_line_normalization() {
        let result = apply_labels(
            "Caleb: One.\n\n\n\nAustin: Two.\n",
            &mapping(&[]),
        );
        assert_eq!(result, "Caleb: One.\n\nAustin: Two.\n");
    }

    #[test]
    fn test_idempotent_modulo_blank_lines() {
        let input = "CHUNK_0_A: Hello there.\n\nCHUNK_0_A: Again.\n\n---\n\nCHUNK_1_B: Hi!\n";
        let map = mapping(&[("CHUNK_0_A", "Alice"), ("CHUNK_1_B", "Bob")]);
        let once = apply_labels(input, &map);
        let twice = apply_labels(&once, &map);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(apply_labels("", &mapping(&[])), "");
    }
}
