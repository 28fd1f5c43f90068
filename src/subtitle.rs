use crate::assembler::AssemblyReport;
use crate::manifest::Manifest;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One cue per clip, timed by where the clip landed in the assembled output.
/// Clips without a manifest entry get no cue.
pub fn build_srt_entries(report: &AssemblyReport, manifest: &Manifest) -> Vec<(f64, f64, String)> {
    report
        .placements
        .iter()
        .filter_map(|p| {
            let text = manifest.text_for(p.clip_id.as_deref()?)?;
            let start = report.seconds(p.start_frame);
            let end = report.seconds(p.start_frame + p.frames);
            Some((start, end, text.to_string()))
        })
        .collect()
}

pub fn write_srt(path: impl AsRef<Path>, entries: &[(f64, f64, String)]) -> anyhow::Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    for (i, (start, end, text)) in entries.iter().enumerate() {
        writeln!(f, "{}", i + 1)?;
        writeln!(f, "{} --> {}", format_srt_time(*start), format_srt_time(*end))?;
        for line in wrap_text(text, 42) {
            writeln!(f, "{}", line)?;
        }
        writeln!(f)?;
    }
    f.flush()?;
    Ok(())
}

fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round() as u64;
    let (total_sec, ms) = (total_ms / 1000, total_ms % 1000);
    let (total_min, s) = (total_sec / 60, total_sec % 60);
    let (h, m) = (total_min / 60, total_min % 60);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// Greedy word wrap on character counts.
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in s.split_whitespace() {
        let needed = current.chars().count() + word.chars().count() + 1;
        if !current.is_empty() && needed > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
