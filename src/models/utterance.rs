use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Minimum text length for an utterance to join the guided walk
pub const MIN_SUBSTANTIAL_LEN: usize = 40;

static SPEAKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(CHUNK_(\d+)_[A-Z]+):[ \t]*(.+)$").unwrap());

/// The speaker-line pattern, for callers that need match offsets
pub(crate) fn speaker_re() -> &'static Regex {
    &SPEAKER_RE
}

/// One tokenized speech segment, in transcript order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Position among all utterances in the transcript
    pub index: usize,
    /// Synthetic speaker token, e.g. "CHUNK_0_A"
    pub token: String,
    /// Chunk id portion of the token, e.g. "0"
    pub chunk_id: String,
    /// The spoken text, trimmed
    pub text: String,
}

impl Utterance {
    /// Diarization-cluster letter portion of the token, e.g. "A"
    pub fn letter(&self) -> &str {
        self.token.rsplit('_').next().unwrap_or("")
    }
}

/// Guided-walk candidates for one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkGroup {
    pub chunk_id: String,
    /// (token, substantial utterance indices), tokens in first-appearance order
    pub tokens: Vec<(String, Vec<usize>)>,
}

/// Extract all `CHUNK_N_X: text` utterances from a transcript, in source order.
///
/// Lines that do not match the speaker pattern are not utterances; callers
/// that rewrite transcripts must carry them through verbatim.
pub fn parse_utterances(transcript: &str) -> Vec<Utterance> {
    SPEAKER_RE
        .captures_iter(transcript)
        .enumerate()
        .map(|(index, caps)| Utterance {
            index,
            token: caps[1].to_string(),
            chunk_id: caps[2].to_string(),
            text: caps[3].trim().to_string(),
        })
        .collect()
}

/// Group substantial utterance indices by chunk.
///
/// Chunks appear in first-appearance order and every chunk present in the
/// transcript gets a group, even when all of its utterances fall below
/// `min_len`. Within a group, tokens keep first-appearance order.
pub fn group_by_chunk(utterances: &[Utterance], min_len: usize) -> Vec<ChunkGroup> {
    let mut groups: Vec<ChunkGroup> = Vec::new();

    for utt in utterances {
        let pos = match groups.iter().position(|g| g.chunk_id == utt.chunk_id) {
            Some(pos) => pos,
            None => {
                groups.push(ChunkGroup {
                    chunk_id: utt.chunk_id.clone(),
                    tokens: Vec::new(),
                });
                groups.len() - 1
            }
        };

        if utt.text.chars().count() >= min_len {
            let group = &mut groups[pos];
            match group.tokens.iter().position(|(t, _)| t == &utt.token) {
                Some(tpos) => group.tokens[tpos].1.push(utt.index),
                None => group.tokens.push((utt.token.clone(), vec![utt.index])),
            }
        }
    }

    groups
}

/// Distinct speaker tokens in a transcript, sorted
pub fn extract_tokens(transcript: &str) -> Vec<String> {
    let tokens: BTreeSet<String> = SPEAKER_RE
        .captures_iter(transcript)
        .map(|caps| caps[1].to_string())
        .collect();
    tokens.into_iter().collect()
}
