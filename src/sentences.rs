use anyhow::Context;
use std::fs;
use std::path::Path;
use tracing::warn;

/// One non-blank input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub index: usize,
    pub text: String,
    pub translation: Option<String>,
}

/// Each non-blank line is `text` or `text<TAB>translation`.
pub fn parse_sentences(input: &str) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    for (number, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (text, translation) = match line.split_once('\t') {
            Some((text, rest)) => (text.trim(), Some(rest.trim()).filter(|t| !t.is_empty())),
            None => (line.trim(), None),
        };
        if text.is_empty() {
            warn!("Line {} has a translation but no sentence; skipping", number + 1);
            continue;
        }
        sentences.push(Sentence {
            index: sentences.len(),
            text: text.to_string(),
            translation: translation.map(str::to_string),
        });
    }
    sentences
}

pub fn read_sentences(path: impl AsRef<Path>) -> anyhow::Result<Vec<Sentence>> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sentences from {}", path.display()))?;
    Ok(parse_sentences(&data))
}
