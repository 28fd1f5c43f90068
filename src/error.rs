//! Error types for clip assembly and speech synthesis.

use std::path::PathBuf;
use thiserror::Error;

/// Format of a decoded clip, as far as assembly cares about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub float: bool,
}

impl From<hound::WavSpec> for ClipFormat {
    fn from(spec: hound::WavSpec) -> Self {
        Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            float: spec.sample_format == hound::SampleFormat::Float,
        }
    }
}

impl From<ClipFormat> for hound::WavSpec {
    fn from(format: ClipFormat) -> Self {
        Self {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.bits_per_sample,
            sample_format: if format.float {
                hound::SampleFormat::Float
            } else {
                hound::SampleFormat::Int
            },
        }
    }
}

impl std::fmt::Display for ClipFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}-bit {}",
            self.sample_rate,
            self.channels,
            self.bits_per_sample,
            if self.float { "float" } else { "int" }
        )
    }
}

/// Errors raised while building or assembling a timeline
#[derive(Error, Debug)]
pub enum AssembleError {
    /// Timeline has no segments, or no clip to take the output format from
    #[error("timeline is empty: nothing to assemble")]
    EmptyInput,

    #[error("segment {index}: clip source not found: {}", .path.display())]
    MissingSource { index: usize, path: PathBuf },

    #[error("segment {index}: format mismatch (expected {expected}, found {found})")]
    FormatMismatch {
        index: usize,
        expected: ClipFormat,
        found: ClipFormat,
    },

    /// Silence must be finite and non-negative
    #[error("segment {index}: invalid silence duration {seconds}")]
    InvalidSilence { index: usize, seconds: f64 },

    #[error("segment {index}: unsupported clip format: {reason}")]
    UnsupportedFormat { index: usize, reason: String },

    #[error("{tool} exited with {status}")]
    ExternalToolFailure { tool: String, status: String },

    #[error("segment {index}: failed to decode clip: {source}")]
    Decode {
        index: usize,
        #[source]
        source: hound::Error,
    },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a speech synthesis backend for a single item
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend ran but reported failure (bad voice, text too long, throttled...)
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("synthesis task failed: {0}")]
    Task(String),

    /// Never started because an earlier item failed
    #[error("cancelled after an earlier failure")]
    Cancelled,

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AssembleError>;
