use crate::naming::Track;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub index: usize,
    pub track: Track,
    pub text: String,
    pub file: String,
    pub duration_seconds: f64,
}

/// Maps every clip file back to the sentence it was made from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn text_for(&self, file: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.file == file)
            .map(|e| e.text.as_str())
    }
}
