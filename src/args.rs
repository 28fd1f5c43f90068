use crate::naming::{NamingScheme, Track};
use crate::timeline::GapPolicy;
use crate::tts::Voice;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// What to do when the speech service rejects a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OnError {
    /// Stop the run
    #[default]
    Abort,
    /// Log the failure and leave the item out
    Skip,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "batch-tts", about = "Turn a file of sentences into speech clips with AWS Polly")]
pub struct Args {
    /// Sentences, one per line; `text<TAB>translation` adds a second track
    #[arg(long, short, env = "BATCH_TTS_INPUT", default_value = "sentences.txt")]
    pub input: PathBuf,

    #[arg(long, short, env = "BATCH_TTS_OUTPUT_DIR", default_value = "_Output")]
    pub output_dir: PathBuf,

    /// Polly voice for the sentence track (Lupe: Spanish, Zhiyu: Chinese)
    #[arg(long, env = "BATCH_TTS_VOICE", default_value = "Lupe")]
    pub voice: String,

    #[arg(long, env = "BATCH_TTS_ENGINE", default_value = "standard")]
    pub engine: String,

    /// Polly voice for the translation track
    #[arg(long, env = "BATCH_TTS_TRANSLATION_VOICE", default_value = "Joanna")]
    pub translation_voice: String,

    #[arg(long, env = "BATCH_TTS_TRANSLATION_ENGINE", default_value = "standard")]
    pub translation_engine: String,

    /// Speech rate in percent of normal
    #[arg(long, env = "BATCH_TTS_RATE", default_value_t = 50,
          value_parser = clap::value_parser!(u32).range(20..=200))]
    pub rate: u32,

    #[arg(long, env = "BATCH_TTS_SAMPLE_RATE", default_value_t = 16000, value_parser = parse_sample_rate)]
    pub sample_rate: u32,

    /// Seconds of silence after each clip in `padded/`; 0 disables padded copies
    #[arg(long, env = "BATCH_TTS_PAD", default_value_t = 1.0, value_parser = parse_seconds)]
    pub pad: f64,

    /// Also join every clip into this file (relative to the output dir); `.wav`
    /// is assembled in process, anything else goes through ffmpeg
    #[arg(long, env = "BATCH_TTS_CONCAT")]
    pub concat: Option<PathBuf>,

    /// Silence between a sentence and its translation
    #[arg(long, env = "BATCH_TTS_PAIR_GAP", default_value_t = 1.0, value_parser = parse_seconds)]
    pub pair_gap: f64,

    /// Silence between consecutive sentences
    #[arg(long, env = "BATCH_TTS_ITEM_GAP", default_value_t = 1.0, value_parser = parse_seconds)]
    pub item_gap: f64,

    /// Extra silence per second of the clip before each gap (room to repeat it)
    #[arg(long, env = "BATCH_TTS_GAP_SCALE", default_value_t = 0.0, value_parser = parse_seconds)]
    pub gap_scale: f64,

    #[arg(long, env = "BATCH_TTS_NAMING", value_enum, default_value_t = NamingScheme::Index)]
    pub naming: NamingScheme,

    #[arg(long, env = "BATCH_TTS_ON_ERROR", value_enum, default_value_t = OnError::Abort)]
    pub on_error: OnError,

    /// Concurrent Polly calls
    #[arg(long, env = "BATCH_TTS_JOBS", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..=16))]
    pub jobs: u16,

    /// Pause between Polly calls, in milliseconds
    #[arg(long, env = "BATCH_TTS_THROTTLE_MS", default_value_t = 150)]
    pub throttle_ms: u64,

    #[arg(long, env = "BATCH_TTS_AWS", default_value = "aws")]
    pub aws: String,

    #[arg(long, env = "BATCH_TTS_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: String,
}

impl Args {
    pub fn voice(&self, track: Track) -> Voice {
        match track {
            Track::Primary => Voice {
                id: self.voice.clone(),
                engine: self.engine.clone(),
            },
            Track::Translation => Voice {
                id: self.translation_voice.clone(),
                engine: self.translation_engine.clone(),
            },
        }
    }

    pub fn gap_policy(&self) -> GapPolicy {
        GapPolicy {
            pair_gap: self.pair_gap,
            item_gap: self.item_gap,
            gap_scale: self.gap_scale,
        }
    }

    pub fn padded_dir(&self) -> PathBuf {
        self.output_dir.join("padded")
    }

    pub fn concat_path(&self) -> Option<PathBuf> {
        self.concat.as_ref().map(|p| self.output_dir.join(p))
    }
}

fn parse_seconds(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{} is not a non-negative number of seconds", s));
    }
    Ok(value)
}

fn parse_sample_rate(s: &str) -> Result<u32, String> {
    match s.parse::<u32>() {
        Ok(rate @ (8000 | 16000)) => Ok(rate),
        _ => Err(format!("{} Hz not supported for PCM (use 8000 or 16000)", s)),
    }
}
