//! Realizes a [`Timeline`] into a single audio file.
//!
//! Every clip is checked before anything is written: sources must exist and
//! share one sample rate, channel layout and sample encoding. Output goes to a
//! temporary file next to the destination and is moved into place only once
//! the whole timeline has been written, so a failed run leaves nothing behind.

use crate::error::{AssembleError, ClipFormat, Result};
use crate::timeline::{Clip, ClipSource, Segment, Timeline};
use hound::{SampleFormat, WavWriter};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

/// Where each segment landed in the output, in frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub index: usize,
    /// Clip id, or `None` for silence
    pub clip_id: Option<String>,
    pub start_frame: u64,
    pub frames: u64,
}

#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub format: ClipFormat,
    pub total_frames: u64,
    pub placements: Vec<Placement>,
}

impl AssemblyReport {
    pub fn duration_seconds(&self) -> f64 {
        self.total_frames as f64 / self.format.sample_rate as f64
    }

    pub fn seconds(&self, frames: u64) -> f64 {
        frames as f64 / self.format.sample_rate as f64
    }
}

pub trait Assembler {
    fn assemble(&self, timeline: Timeline, output: &Path) -> Result<AssemblyReport>;
}

/// Frames of silence for `seconds` at `sample_rate`, rounded to the nearest frame.
pub fn silence_frames(seconds: f64, sample_rate: u32) -> u64 {
    (seconds * sample_rate as f64).round() as u64
}

/// Validates every clip and lays out the output without decoding samples.
pub fn plan(timeline: &Timeline) -> Result<AssemblyReport> {
    let mut format: Option<ClipFormat> = None;
    let mut clip_frames = Vec::with_capacity(timeline.len());

    for (index, segment) in timeline.segments().iter().enumerate() {
        let Segment::Clip(clip) = segment else {
            clip_frames.push(None);
            continue;
        };
        if let Some(path) = clip.path() {
            if !path.exists() {
                return Err(AssembleError::MissingSource {
                    index,
                    path: path.to_path_buf(),
                });
            }
        }
        let reader = clip
            .open()
            .map_err(|source| AssembleError::Decode { index, source })?;
        let found = ClipFormat::from(reader.spec());
        check_supported(index, found)?;
        match format {
            None => format = Some(found),
            Some(expected) if expected != found => {
                return Err(AssembleError::FormatMismatch {
                    index,
                    expected,
                    found,
                });
            }
            Some(_) => {}
        }
        clip_frames.push(Some(reader.duration() as u64));
    }

    let format = format.ok_or(AssembleError::EmptyInput)?;
    let mut placements = Vec::with_capacity(timeline.len());
    let mut cursor = 0u64;
    for (index, (segment, frames)) in timeline.segments().iter().zip(clip_frames).enumerate() {
        let (clip_id, frames) = match segment {
            Segment::Clip(clip) => (Some(clip.id.clone()), frames.unwrap_or(0)),
            Segment::Silence(seconds) => (None, silence_frames(*seconds, format.sample_rate)),
        };
        placements.push(Placement {
            index,
            clip_id,
            start_frame: cursor,
            frames,
        });
        cursor += frames;
    }

    Ok(AssemblyReport {
        format,
        total_frames: cursor,
        placements,
    })
}

fn check_supported(index: usize, format: ClipFormat) -> Result<()> {
    if !(1..=2).contains(&format.channels) {
        return Err(AssembleError::UnsupportedFormat {
            index,
            reason: format!("{} channels (mono or stereo only)", format.channels),
        });
    }
    if format.float && format.bits_per_sample != 32 {
        return Err(AssembleError::UnsupportedFormat {
            index,
            reason: format!("{}-bit float samples", format.bits_per_sample),
        });
    }
    Ok(())
}

fn temp_output(output: &Path) -> Result<NamedTempFile> {
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let suffix = output
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    Ok(tempfile::Builder::new()
        .prefix(".assemble-")
        .suffix(&suffix)
        .tempfile_in(dir)?)
}

fn persist(tmp: NamedTempFile, output: &Path) -> Result<()> {
    tmp.persist(output).map_err(|e| AssembleError::Io(e.error))?;
    Ok(())
}

/// Decodes WAV clips and writes a WAV in the clips' own format.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavAssembler;

impl Assembler for WavAssembler {
    fn assemble(&self, timeline: Timeline, output: &Path) -> Result<AssemblyReport> {
        let report = plan(&timeline)?;
        info!(
            "Assembling {} segments ({} clips) into {} [{}]",
            timeline.len(),
            timeline.clip_count(),
            output.display(),
            report.format
        );

        let tmp = temp_output(output)?;
        let mut writer = WavWriter::new(BufWriter::new(tmp.as_file()), report.format.into())?;
        let channels = report.format.channels as u64;

        for (segment, placement) in timeline.segments().iter().zip(&report.placements) {
            let index = placement.index;
            match segment {
                Segment::Clip(clip) => {
                    debug!("Segment {}: clip {} ({} frames)", index, clip.id, placement.frames);
                    let mut reader = clip
                        .open()
                        .map_err(|source| AssembleError::Decode { index, source })?;
                    match reader.spec().sample_format {
                        SampleFormat::Float => {
                            for sample in reader.samples::<f32>() {
                                let sample =
                                    sample.map_err(|source| AssembleError::Decode { index, source })?;
                                writer.write_sample(sample)?;
                            }
                        }
                        SampleFormat::Int => {
                            for sample in reader.samples::<i32>() {
                                let sample =
                                    sample.map_err(|source| AssembleError::Decode { index, source })?;
                                writer.write_sample(sample)?;
                            }
                        }
                    }
                }
                Segment::Silence(seconds) => {
                    debug!("Segment {}: {:.3}s silence ({} frames)", index, seconds, placement.frames);
                    for _ in 0..placement.frames * channels {
                        if report.format.float {
                            writer.write_sample(0.0f32)?;
                        } else {
                            writer.write_sample(0i32)?;
                        }
                    }
                }
            }
        }
        writer.finalize()?;

        persist(tmp, output)?;
        info!(
            "Wrote {} ({:.2}s)",
            output.display(),
            report.duration_seconds()
        );
        Ok(report)
    }
}

/// Hands the timeline to `ffmpeg` in a single invocation, letting it encode
/// whatever container the output extension names.
#[derive(Debug, Clone)]
pub struct FfmpegAssembler {
    pub program: String,
}

impl Default for FfmpegAssembler {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
        }
    }
}

impl Assembler for FfmpegAssembler {
    fn assemble(&self, timeline: Timeline, output: &Path) -> Result<AssemblyReport> {
        let report = plan(&timeline)?;
        let spill = tempfile::tempdir()?;
        let timeline = spill_memory_clips(timeline, spill.path())?;
        let tmp = temp_output(output)?;
        let args = ffmpeg_args(&timeline, &report, tmp.path())?;
        info!(
            "Concatenating {} segments with {} into {}",
            timeline.len(),
            self.program,
            output.display()
        );
        debug!("{} {}", self.program, args.join(" "));

        let status = Command::new(&self.program).args(&args).status()?;
        if !status.success() {
            error!("{} failed to concatenate clips", self.program);
            return Err(AssembleError::ExternalToolFailure {
                tool: self.program.clone(),
                status: status.to_string(),
            });
        }

        persist(tmp, output)?;
        info!(
            "Wrote {} ({:.2}s)",
            output.display(),
            report.duration_seconds()
        );
        Ok(report)
    }
}

/// Writes in-memory clips out to `dir` so ffmpeg can read them by path.
fn spill_memory_clips(timeline: Timeline, dir: &Path) -> Result<Timeline> {
    let mut segments = Vec::with_capacity(timeline.len());
    for (index, segment) in timeline.into_segments().into_iter().enumerate() {
        match segment {
            Segment::Clip(Clip {
                id,
                source: ClipSource::Memory(bytes),
            }) => {
                let path = dir.join(format!("{:04}.wav", index));
                std::fs::write(&path, bytes)?;
                segments.push(Segment::Clip(Clip::from_path(id, path)));
            }
            other => segments.push(other),
        }
    }
    Timeline::new(segments)
}

/// Command line for one ffmpeg run: clips as file inputs, silences as
/// `anullsrc` inputs trimmed to the exact frame count, joined by `concat`.
pub fn ffmpeg_args(
    timeline: &Timeline,
    report: &AssemblyReport,
    output: &Path,
) -> Result<Vec<String>> {
    let layout = if report.format.channels == 1 { "mono" } else { "stereo" };
    let rate = report.format.sample_rate;
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut filter = String::new();
    let mut labels = String::new();
    let mut input = 0usize;

    for (segment, placement) in timeline.segments().iter().zip(&report.placements) {
        match segment {
            Segment::Clip(clip) => {
                let Some(path) = clip.path() else {
                    return Err(AssembleError::UnsupportedFormat {
                        index: placement.index,
                        reason: "in-memory clip cannot be passed to ffmpeg".to_string(),
                    });
                };
                let source = path.to_string_lossy().into_owned();
                args.extend(["-i".to_string(), source]);
                labels.push_str(&format!("[{}:a]", input));
            }
            Segment::Silence(_) => {
                if placement.frames == 0 {
                    continue;
                }
                args.extend([
                    "-f".to_string(),
                    "lavfi".to_string(),
                    "-i".to_string(),
                    format!("anullsrc=r={}:cl={}", rate, layout),
                ]);
                filter.push_str(&format!(
                    "[{}:a]atrim=end_sample={}[s{}];",
                    input, placement.frames, input
                ));
                labels.push_str(&format!("[s{}]", input));
            }
        }
        input += 1;
    }

    filter.push_str(&format!("{}concat=n={}:v=0:a=1[out]", labels, input));
    args.extend([
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        "[out]".to_string(),
        output.to_string_lossy().into_owned(),
    ]);
    Ok(args)
}
