use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

/// Read a transcript file as UTF-8
pub fn read_transcript(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript: {:?}", path))
}

/// One name's token list in the mapping file: a single token or several
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenSpec {
    One(String),
    Many(Vec<String>),
}

/// Load a token -> name mapping from a TOML file.
///
/// File format, one entry per speaker:
///     Caleb = ["CHUNK_0_A", "CHUNK_1_B"]
///     Austin = "CHUNK_0_B"
///
/// A missing or unreadable file is a hard failure; no partial application
/// happens downstream.
pub fn load_mapping(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read mapping file: {:?}", path))?;
    let mapping = parse_mapping(&content)
        .with_context(|| format!("Failed to parse mapping file: {:?}", path))?;
    info!("Loaded {} token mappings from {:?}", mapping.len(), path);
    Ok(mapping)
}

/// Parse mapping TOML into token -> name
pub fn parse_mapping(content: &str) -> Result<BTreeMap<String, String>> {
    let table: BTreeMap<String, TokenSpec> =
        toml::from_str(content).context("Mapping is not valid TOML")?;

    let mut mapping: BTreeMap<String, String> = BTreeMap::new();
    for (name, spec) in table {
        let tokens = match spec {
            TokenSpec::One(token) => vec![token],
            TokenSpec::Many(tokens) => tokens,
        };
        for token in tokens {
            if let Some(previous) = mapping.insert(token.clone(), name.clone()) {
                if previous != name {
                    bail!("Token {token} is mapped to both {previous} and {name}");
                }
            }
        }
    }

    Ok(mapping)
}
