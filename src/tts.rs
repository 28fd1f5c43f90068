use crate::audio::write_pcm16_wav;
use crate::error::SynthesisError;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub id: String,
    pub engine: String,
}

#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: Voice,
    pub rate_percent: u32,
}

impl SpeechRequest {
    pub fn ssml(&self) -> String {
        format!(
            "<speak><prosody rate='{}%'>{}</prosody></speak>",
            self.rate_percent,
            escape_xml(&self.text)
        )
    }
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// A speech backend that turns one request into a WAV file at `output`.
pub trait Synthesizer: Send + Sync + 'static {
    fn synthesize(
        &self,
        request: &SpeechRequest,
        output: &Path,
    ) -> impl Future<Output = Result<(), SynthesisError>> + Send;
}

/// AWS Polly through the `aws` command line client.
#[derive(Debug, Clone)]
pub struct PollyCli {
    pub program: String,
    /// Polly only offers 8000 or 16000 Hz for PCM output
    pub sample_rate: u32,
}

impl Default for PollyCli {
    fn default() -> Self {
        Self {
            program: "aws".to_string(),
            sample_rate: 16000,
        }
    }
}

impl PollyCli {
    pub fn args(&self, request: &SpeechRequest, pcm_path: &Path) -> Vec<String> {
        vec![
            "polly".to_string(),
            "synthesize-speech".to_string(),
            "--output-format".to_string(),
            "pcm".to_string(),
            "--sample-rate".to_string(),
            self.sample_rate.to_string(),
            "--text-type".to_string(),
            "ssml".to_string(),
            "--engine".to_string(),
            request.voice.engine.clone(),
            "--voice-id".to_string(),
            request.voice.id.clone(),
            "--text".to_string(),
            request.ssml(),
            pcm_path.to_string_lossy().into_owned(),
        ]
    }
}

impl Synthesizer for PollyCli {
    async fn synthesize(&self, request: &SpeechRequest, output: &Path) -> Result<(), SynthesisError> {
        let pcm_path = output.with_extension("pcm");
        debug!("Calling Polly ({}) for {}", request.voice.id, output.display());

        let result = Command::new(&self.program)
            .args(self.args(request, &pcm_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| SynthesisError::Spawn {
                tool: self.program.clone(),
                source,
            })?;

        if !result.status.success() {
            let _ = tokio::fs::remove_file(&pcm_path).await;
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            error!("Polly failed for {}: {}", output.display(), stderr);
            return Err(SynthesisError::ToolFailed {
                tool: self.program.clone(),
                status: result.status.to_string(),
                stderr,
            });
        }

        let pcm = tokio::fs::read(&pcm_path).await?;
        tokio::fs::remove_file(&pcm_path).await?;
        write_pcm16_wav(&pcm, self.sample_rate, 1, output)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisJob {
    pub request: SpeechRequest,
    pub output: PathBuf,
}

/// Runs every job with at most `concurrency` in flight, waiting `throttle`
/// between launches. Results come back in job order regardless of which
/// call finished first.
///
/// With `stop_on_error`, the first failure stops new jobs from starting.
/// Calls already in flight finish; jobs never started report `Cancelled`.
pub async fn synthesize_all<S: Synthesizer>(
    synth: Arc<S>,
    jobs: Vec<SynthesisJob>,
    concurrency: usize,
    throttle: Duration,
    stop_on_error: bool,
) -> Vec<Result<(), SynthesisError>> {
    let total = jobs.len();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let failed = Arc::new(AtomicBool::new(false));
    let mut set = JoinSet::new();

    for (position, job) in jobs.into_iter().enumerate() {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        if failed.load(Ordering::SeqCst) {
            warn!("Stopping after a failed item; {} not started", total - position);
            break;
        }
        info!("Synthesizing item {}/{}: {}", position + 1, total, job.output.display());
        let synth = synth.clone();
        let failed = failed.clone();
        set.spawn(async move {
            let _permit = permit;
            let result = synth.synthesize(&job.request, &job.output).await;
            // Set before the permit is released so the launcher sees it.
            if result.is_err() && stop_on_error {
                failed.store(true, Ordering::SeqCst);
            }
            (position, result)
        });
        if !throttle.is_zero() && position + 1 < total {
            sleep(throttle).await;
        }
    }

    let mut results: Vec<Option<Result<(), SynthesisError>>> = (0..total).map(|_| None).collect();
    let mut panicked = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((position, result)) => results[position] = Some(result),
            // A panicked task takes its position with it; its slot stays empty.
            Err(e) => panicked = Some(e.to_string()),
        }
    }

    results
        .into_iter()
        .map(|r| {
            r.unwrap_or_else(|| match &panicked {
                Some(msg) => Err(SynthesisError::Task(msg.clone())),
                None => Err(SynthesisError::Cancelled),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn request(text: &str) -> SpeechRequest {
        SpeechRequest {
            text: text.to_string(),
            voice: Voice {
                id: "Lupe".to_string(),
                engine: "neural".to_string(),
            },
            rate_percent: 50,
        }
    }

    #[test]
    fn ssml_wraps_and_escapes_text() {
        assert_eq!(
            request("Tom & \"Jerry\" <3").ssml(),
            "<speak><prosody rate='50%'>Tom &amp; &quot;Jerry&quot; &lt;3</prosody></speak>"
        );
    }

    #[test]
    fn polly_command_line() {
        let polly = PollyCli::default();
        let args = polly.args(&request("hola"), Path::new("out/001.pcm"));
        assert_eq!(&args[..2], &["polly", "synthesize-speech"]);
        let value = |flag: &str| {
            let at = args.iter().position(|a| a == flag).unwrap();
            args[at + 1].clone()
        };
        assert_eq!(value("--output-format"), "pcm");
        assert_eq!(value("--sample-rate"), "16000");
        assert_eq!(value("--text-type"), "ssml");
        assert_eq!(value("--engine"), "neural");
        assert_eq!(value("--voice-id"), "Lupe");
        assert_eq!(args.last().unwrap(), "out/001.pcm");
    }

    /// Finishes later jobs first and fails on texts starting with '!'.
    struct Reversed {
        seen: Mutex<Vec<String>>,
    }

    impl Synthesizer for Reversed {
        async fn synthesize(&self, request: &SpeechRequest, _output: &Path) -> Result<(), SynthesisError> {
            let delay: u64 = 40 - request.text.len() as u64 * 10;
            sleep(Duration::from_millis(delay)).await;
            self.seen.lock().unwrap().push(request.text.clone());
            if request.text.starts_with('!') {
                return Err(SynthesisError::ToolFailed {
                    tool: "fake".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "throttled".to_string(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn results_keep_job_order_under_concurrency() {
        let synth = Arc::new(Reversed {
            seen: Mutex::new(Vec::new()),
        });
        let jobs = ["a", "!b", "ccc"]
            .iter()
            .map(|t| SynthesisJob {
                request: request(t),
                output: PathBuf::from(format!("{}.wav", t)),
            })
            .collect();
        let results = synthesize_all(synth.clone(), jobs, 3, Duration::ZERO, false).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(SynthesisError::ToolFailed { .. })));
        assert!(results[2].is_ok());
        assert_eq!(synth.seen.lock().unwrap()[0], "ccc");
    }

    #[tokio::test]
    async fn no_jobs_no_results() {
        let synth = Arc::new(Reversed {
            seen: Mutex::new(Vec::new()),
        });
        assert!(synthesize_all(synth, Vec::new(), 1, Duration::ZERO, true).await.is_empty());
    }

    /// Counts calls; fails every request whose text is "FAIL".
    struct Counting {
        calls: AtomicUsize,
    }

    impl Synthesizer for Counting {
        async fn synthesize(&self, request: &SpeechRequest, _output: &Path) -> Result<(), SynthesisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.text == "FAIL" {
                return Err(SynthesisError::ToolFailed {
                    tool: "fake".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "bad voice".to_string(),
                });
            }
            Ok(())
        }
    }

    fn counted_jobs(texts: &[&str]) -> Vec<SynthesisJob> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| SynthesisJob {
                request: request(t),
                output: PathBuf::from(format!("{}.wav", i)),
            })
            .collect()
    }

    #[tokio::test]
    async fn first_failure_stops_new_jobs() {
        let synth = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let mut texts = vec!["FAIL"];
        texts.extend(["ok"; 9]);
        let results =
            synthesize_all(synth.clone(), counted_jobs(&texts), 1, Duration::ZERO, true).await;

        assert_eq!(synth.calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 10);
        assert!(matches!(results[0], Err(SynthesisError::ToolFailed { .. })));
        assert!(results[1..]
            .iter()
            .all(|r| matches!(r, Err(SynthesisError::Cancelled))));
    }

    #[tokio::test]
    async fn failures_do_not_stop_jobs_when_skipping() {
        let synth = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let results = synthesize_all(
            synth.clone(),
            counted_jobs(&["FAIL", "ok", "ok"]),
            1,
            Duration::ZERO,
            false,
        )
        .await;
        assert_eq!(synth.calls.load(Ordering::SeqCst), 3);
        assert!(results[0].is_err());
        assert!(results[1..].iter().all(|r| r.is_ok()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn polly_failure_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("001a-hola.wav");
        let polly = PollyCli {
            program: "false".to_string(),
            sample_rate: 16000,
        };
        let err = polly.synthesize(&request("hola"), &output).await.unwrap_err();

        assert!(matches!(err, SynthesisError::ToolFailed { .. }));
        assert!(!output.exists());
        assert!(!output.with_extension("pcm").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_polly_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let polly = PollyCli {
            program: "/nonexistent/aws".to_string(),
            sample_rate: 16000,
        };
        let err = polly
            .synthesize(&request("hola"), &dir.path().join("a.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Spawn { .. }));
    }
}
