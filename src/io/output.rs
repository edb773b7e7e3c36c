use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::info;

use crate::models::Utterance;
use crate::session::report::conflicting_tokens;
use crate::session::IdentificationOutcome;

const EXCERPT_LEN: usize = 120;

/// Default output path for a relabeled transcript: `x.txt` -> `x.labeled.txt`
pub fn default_labeled_path(input: &Path) -> PathBuf {
    input.with_extension("labeled.txt")
}

/// Default output path for an annotated transcript: `x.txt` -> `x.annotated.txt`
pub fn default_annotated_path(input: &Path) -> PathBuf {
    input.with_extension("annotated.txt")
}

pub fn write_text(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write: {:?}", path))?;
    info!("Wrote: {:?}", path);
    Ok(())
}

/// Seed a mapping file with one commented line per token, for hand editing.
/// Refuses to clobber an existing file.
pub fn write_mapping_skeleton(path: &Path, tokens: &[String]) -> Result<()> {
    if path.exists() {
        bail!("Refusing to overwrite existing mapping file: {:?}", path);
    }
    let content: String = tokens.iter().map(|token| format!("# {token}\n")).collect();
    write_text(path, &content)
}

/// Machine-readable session outcome for downstream tooling
#[derive(Debug, Clone, Serialize)]
pub struct IdentificationReport {
    pub utterances: Vec<IdentifiedUtterance>,
    pub uncertain_tokens: Vec<String>,
    pub conflicting_tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentifiedUtterance {
    pub index: usize,
    pub token: String,
    pub name: String,
    pub excerpt: String,
}

impl IdentificationReport {
    pub fn build(utterances: &[Utterance], outcome: &IdentificationOutcome) -> Self {
        let identified: Vec<IdentifiedUtterance> = outcome
            .assignments
            .iter()
            .filter_map(|(index, name)| {
                let utt = utterances.get(*index)?;
                Some(IdentifiedUtterance {
                    index: *index,
                    token: utt.token.clone(),
                    name: name.clone(),
                    excerpt: utt.text.chars().take(EXCERPT_LEN).collect(),
                })
            })
            .collect();

        let conflicting: BTreeSet<String> = conflicting_tokens(
            identified
                .iter()
                .map(|u| (u.token.as_str(), u.name.as_str())),
        );

        Self {
            utterances: identified,
            uncertain_tokens: outcome.uncertain_tokens.iter().cloned().collect(),
            conflicting_tokens: conflicting.into_iter().collect(),
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {:?}", path))?;
        info!("Wrote: {:?}", path);
        Ok(())
    }
}
