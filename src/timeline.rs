//! Clips, segments and the timeline handed to an assembler.

use crate::error::{AssembleError, Result};
use hound::WavReader;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

/// Where a clip's WAV data lives.
#[derive(Debug, Clone)]
pub enum ClipSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// A single synthesized or recorded audio unit.
#[derive(Debug, Clone)]
pub struct Clip {
    pub id: String,
    pub source: ClipSource,
}

impl Clip {
    pub fn from_path(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            source: ClipSource::Path(path.into()),
        }
    }

    pub fn from_wav_bytes(id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            source: ClipSource::Memory(bytes),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            ClipSource::Path(p) => Some(p),
            ClipSource::Memory(_) => None,
        }
    }

    pub fn open(&self) -> std::result::Result<WavReader<Box<dyn Read + '_>>, hound::Error> {
        let reader: Box<dyn Read + '_> = match &self.source {
            ClipSource::Path(p) => Box::new(BufReader::new(File::open(p)?)),
            ClipSource::Memory(bytes) => Box::new(Cursor::new(bytes.as_slice())),
        };
        WavReader::new(reader)
    }

    /// Duration from the WAV header. Informational only: the assembler
    /// counts decoded frames.
    pub fn duration_seconds(&self) -> std::result::Result<f64, hound::Error> {
        let reader = self.open()?;
        let spec = reader.spec();
        Ok(reader.duration() as f64 / spec.sample_rate as f64)
    }
}

#[derive(Debug, Clone)]
pub enum Segment {
    Clip(Clip),
    /// Digital silence, in seconds
    Silence(f64),
}

/// Non-empty ordered plan of segments. Consumed by an assembler.
#[derive(Debug)]
pub struct Timeline {
    segments: Vec<Segment>,
}

impl Timeline {
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(AssembleError::EmptyInput);
        }
        for (index, segment) in segments.iter().enumerate() {
            if let Segment::Silence(seconds) = *segment {
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(AssembleError::InvalidSilence { index, seconds });
                }
            }
        }
        Ok(Self { segments })
    }

    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Result<Self> {
        Self::new(segments.into_iter().collect())
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn clip_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Clip(_)))
            .count()
    }
}

/// How much silence goes between clips.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapPolicy {
    /// After a sentence, before its translation
    pub pair_gap: f64,
    /// Between consecutive items
    pub item_gap: f64,
    /// Extra silence per second of the preceding clip
    pub gap_scale: f64,
}

impl Default for GapPolicy {
    fn default() -> Self {
        Self {
            pair_gap: 1.0,
            item_gap: 1.0,
            gap_scale: 0.0,
        }
    }
}

impl GapPolicy {
    fn gap_after(&self, base: f64, clip_seconds: f64) -> f64 {
        base + self.gap_scale * clip_seconds
    }
}

/// A clip together with its measured duration.
#[derive(Debug, Clone)]
pub struct TimedClip {
    pub clip: Clip,
    pub seconds: f64,
}

/// One input line after synthesis: the sentence and optionally its translation.
#[derive(Debug, Clone)]
pub struct ItemClips {
    pub primary: TimedClip,
    pub translation: Option<TimedClip>,
}

/// Lays out items in order with gaps from `policy`. Nothing trails the last
/// clip, and zero-length gaps are left out. The iterator is lazy and can be
/// cloned to walk the plan again.
pub fn segments(
    items: &[ItemClips],
    policy: GapPolicy,
) -> impl Iterator<Item = Segment> + Clone + '_ {
    let last = items.len().saturating_sub(1);
    items.iter().enumerate().flat_map(move |(i, item)| {
        let mut out = Vec::with_capacity(4);
        out.push(Segment::Clip(item.primary.clip.clone()));
        let mut tail = &item.primary;
        if let Some(translation) = &item.translation {
            push_gap(&mut out, policy.gap_after(policy.pair_gap, tail.seconds));
            out.push(Segment::Clip(translation.clip.clone()));
            tail = translation;
        }
        if i < last {
            push_gap(&mut out, policy.gap_after(policy.item_gap, tail.seconds));
        }
        out
    })
}

fn push_gap(out: &mut Vec<Segment>, seconds: f64) {
    if seconds > 0.0 {
        out.push(Segment::Silence(seconds));
    }
}
