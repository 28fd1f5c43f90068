//! One batch run: synthesize every sentence, write padded copies and the
//! manifest, then optionally assemble everything into a single file.

use crate::args::{Args, OnError};
use crate::assembler::{Assembler, AssemblyReport, FfmpegAssembler, WavAssembler};
use crate::error::SynthesisError;
use crate::manifest::{Manifest, ManifestEntry};
use crate::naming::{FileNamer, Track};
use crate::sentences::{Sentence, read_sentences};
use crate::subtitle::{build_srt_entries, write_srt};
use crate::timeline::{Clip, ItemClips, Segment, TimedClip, Timeline, segments};
use crate::tts::{SpeechRequest, SynthesisJob, Synthesizer, synthesize_all};
use anyhow::{Context, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub synthesized: usize,
    pub skipped: Vec<usize>,
    pub manifest: PathBuf,
    pub combined: Option<PathBuf>,
    pub combined_seconds: Option<f64>,
}

struct PlannedClip {
    index: usize,
    track: Track,
    text: String,
    file: String,
}

fn plan_jobs(sentences: &[Sentence], args: &Args) -> (Vec<PlannedClip>, Vec<SynthesisJob>) {
    let mut namer = FileNamer::new(args.naming);
    let mut planned = Vec::new();
    let mut jobs = Vec::new();
    for sentence in sentences {
        let tracks = std::iter::once((Track::Primary, &sentence.text))
            .chain(sentence.translation.iter().map(|t| (Track::Translation, t)));
        for (track, text) in tracks {
            let file = namer.name(sentence.index, track, text);
            jobs.push(SynthesisJob {
                request: SpeechRequest {
                    text: text.clone(),
                    voice: args.voice(track),
                    rate_percent: args.rate,
                },
                output: args.output_dir.join(&file),
            });
            planned.push(PlannedClip {
                index: sentence.index,
                track,
                text: text.clone(),
                file,
            });
        }
    }
    (planned, jobs)
}

pub async fn run<S: Synthesizer>(args: &Args, synth: Arc<S>) -> anyhow::Result<BatchSummary> {
    let sentences = read_sentences(&args.input)?;
    if sentences.is_empty() {
        bail!("No sentences found in {}", args.input.display());
    }
    info!("Read {} sentences from {}", sentences.len(), args.input.display());

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
    if args.pad > 0.0 {
        fs::create_dir_all(args.padded_dir())?;
    }

    let (planned, jobs) = plan_jobs(&sentences, args);
    let results = synthesize_all(
        synth,
        jobs,
        args.jobs as usize,
        Duration::from_millis(args.throttle_ms),
        args.on_error == OnError::Abort,
    )
    .await;

    let mut failed: Vec<usize> = Vec::new();
    for (clip, result) in planned.iter().zip(&results) {
        if let Err(e) = result {
            match args.on_error {
                // Report the failure that stopped the run, not the jobs it cancelled.
                OnError::Abort if matches!(e, SynthesisError::Cancelled) => {}
                OnError::Abort => {
                    error!("Failed to synthesize item {} ({:?}): {}", clip.index + 1, clip.track, e);
                    bail!("Speech synthesis failed for {:?}: {}", clip.text, e);
                }
                OnError::Skip => {
                    warn!("Skipping item {} ({:?}): {}", clip.index + 1, clip.track, e);
                    if !failed.contains(&clip.index) {
                        failed.push(clip.index);
                    }
                }
            }
        }
    }

    let mut manifest = Manifest::default();
    let mut items: Vec<ItemClips> = Vec::new();
    for clip in planned.iter().filter(|c| !failed.contains(&c.index)) {
        let path = args.output_dir.join(&clip.file);
        let source = Clip::from_path(&clip.file, &path);
        let seconds = source
            .duration_seconds()
            .with_context(|| format!("Failed to read {}", path.display()))?;
        debug!("{} duration: {:.2} seconds", clip.file, seconds);

        if args.pad > 0.0 {
            pad_clip(&source, args.pad, &args.padded_dir().join(&clip.file))?;
        }

        manifest.entries.push(ManifestEntry {
            index: clip.index,
            track: clip.track,
            text: clip.text.clone(),
            file: clip.file.clone(),
            duration_seconds: seconds,
        });

        let timed = TimedClip {
            clip: source,
            seconds,
        };
        match clip.track {
            Track::Primary => items.push(ItemClips {
                primary: timed,
                translation: None,
            }),
            Track::Translation => {
                if let Some(item) = items.last_mut() {
                    item.translation = Some(timed);
                }
            }
        }
    }

    let manifest_path = args.output_dir.join("manifest.json");
    manifest.save(&manifest_path)?;
    info!("Wrote manifest {} ({} clips)", manifest_path.display(), manifest.entries.len());

    let mut summary = BatchSummary {
        synthesized: manifest.entries.len(),
        skipped: failed,
        manifest: manifest_path,
        ..Default::default()
    };

    if let Some(out) = args.concat_path() {
        let timeline = Timeline::from_segments(segments(&items, args.gap_policy()))
            .context("Nothing to concatenate")?;
        let report = assemble(args, timeline, &out)?;
        let srt_path = out.with_extension("srt");
        write_srt(&srt_path, &build_srt_entries(&report, &manifest))?;
        info!("Wrote subtitles {}", srt_path.display());
        summary.combined_seconds = Some(report.duration_seconds());
        summary.combined = Some(out);
    }

    info!(
        "Process complete: {} clips, {} items skipped",
        summary.synthesized,
        summary.skipped.len()
    );
    Ok(summary)
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

fn assemble(args: &Args, timeline: Timeline, out: &Path) -> anyhow::Result<AssemblyReport> {
    let report = if is_wav(out) {
        WavAssembler.assemble(timeline, out)
    } else {
        FfmpegAssembler {
            program: args.ffmpeg.clone(),
        }
        .assemble(timeline, out)
    };
    report.with_context(|| format!("Failed to assemble {}", out.display()))
}

/// Writes `clip` followed by `seconds` of silence to `out`.
pub fn pad_clip(clip: &Clip, seconds: f64, out: &Path) -> anyhow::Result<()> {
    let timeline = Timeline::new(vec![Segment::Clip(clip.clone()), Segment::Silence(seconds)])?;
    WavAssembler
        .assemble(timeline, out)
        .with_context(|| format!("Failed to pad {}", clip.id))?;
    Ok(())
}
