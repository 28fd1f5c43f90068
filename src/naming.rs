//! File names for synthesized clips.

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

const MAX_SLUG_CHARS: usize = 40;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{Alphabetic}\p{Nd}]+").expect("valid regex"));
static FORBIDDEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/\\:*?"<>|\p{Cc}]"#).expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Primary,
    Translation,
}

impl Track {
    fn tag(self) -> char {
        match self {
            Track::Primary => 'a',
            Track::Translation => 'b',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum NamingScheme {
    /// `001a-estoy_en_casa.wav`: line number, track, short slug
    #[default]
    Index,
    /// The sentence itself, e.g. `estoy en casa.wav`
    Text,
}

/// Lowercase, word characters joined by `_`, at most 40 characters.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let joined = NON_WORD.replace_all(&lowered, "_");
    let slug: String = joined.trim_matches('_').chars().take(MAX_SLUG_CHARS).collect();
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "clip".to_string()
    } else {
        slug.to_string()
    }
}

/// Keeps the text readable but drops anything a filesystem would choke on.
pub fn sanitize_filename(text: &str) -> String {
    let cleaned = FORBIDDEN.replace_all(text, "");
    let cleaned = cleaned.trim().trim_end_matches('.').trim();
    if cleaned.is_empty() {
        "clip".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Hands out clip file names, never the same one twice.
#[derive(Debug, Default)]
pub struct FileNamer {
    scheme: NamingScheme,
    used: HashSet<String>,
}

impl FileNamer {
    pub fn new(scheme: NamingScheme) -> Self {
        Self {
            scheme,
            used: HashSet::new(),
        }
    }

    pub fn name(&mut self, index: usize, track: Track, text: &str) -> String {
        let stem = match self.scheme {
            NamingScheme::Index => format!("{:03}{}-{}", index + 1, track.tag(), slugify(text)),
            NamingScheme::Text => sanitize_filename(text),
        };
        let mut candidate = format!("{}.wav", stem);
        let mut n = 2;
        // Case-insensitive filesystems treat `Casa.wav` and `casa.wav` as one file.
        while !self.used.insert(candidate.to_lowercase()) {
            candidate = format!("{}-{}.wav", stem, n);
            n += 1;
        }
        candidate
    }
}
