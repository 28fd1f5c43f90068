use batch_tts::assembler::{Assembler, WavAssembler};
use batch_tts::error::AssembleError;
use batch_tts::timeline::{Clip, Segment, Timeline};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::{Path, PathBuf};

const RATE: u32 = 16000;

fn spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Writes a clip whose samples are a recognizable ramp seeded by `seed`.
fn write_clip(dir: &Path, name: &str, seconds: f64, seed: i16) -> (PathBuf, Vec<i16>) {
    let path = dir.join(name);
    let frames = (seconds * RATE as f64).round() as usize;
    let samples: Vec<i16> = (0..frames)
        .map(|i| seed.wrapping_add((i % 97) as i16).max(1))
        .collect();
    let mut writer = WavWriter::create(&path, spec(RATE)).unwrap();
    for &s in &samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
    (path, samples)
}

fn read_all(path: &Path) -> Vec<i16> {
    WavReader::open(path)
        .unwrap()
        .into_samples::<i16>()
        .map(|s| s.unwrap())
        .collect()
}

#[test]
fn lesson_example_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let (casa, casa_s) = write_clip(dir.path(), "casa.wav", 1.2, 100);
    let (house, house_s) = write_clip(dir.path(), "house.wav", 0.9, 2000);
    let (estoy, estoy_s) = write_clip(dir.path(), "estoy_en_casa.wav", 1.5, 5000);
    let (home, home_s) = write_clip(dir.path(), "i_am_at_home.wav", 1.3, 9000);

    let timeline = Timeline::new(vec![
        Segment::Clip(Clip::from_path("casa", &casa)),
        Segment::Silence(1.0),
        Segment::Clip(Clip::from_path("house", &house)),
        Segment::Silence(1.0),
        Segment::Clip(Clip::from_path("estoy_en_casa", &estoy)),
        Segment::Silence(4.0),
        Segment::Clip(Clip::from_path("i_am_at_home", &home)),
    ])
    .unwrap();

    let out = dir.path().join("lesson.wav");
    let report = WavAssembler.assemble(timeline, &out).unwrap();

    let expected = 1.2 + 1.0 + 0.9 + 1.0 + 1.5 + 4.0 + 1.3;
    assert!((report.duration_seconds() - expected).abs() <= 1.0 / RATE as f64);
    let reader = WavReader::open(&out).unwrap();
    assert_eq!(reader.duration() as u64, report.total_frames);
    drop(reader);

    let output = read_all(&out);
    let ids: Vec<Option<&str>> = report
        .placements
        .iter()
        .map(|p| p.clip_id.as_deref())
        .collect();
    assert_eq!(
        ids,
        vec![
            Some("casa"),
            None,
            Some("house"),
            None,
            Some("estoy_en_casa"),
            None,
            Some("i_am_at_home")
        ]
    );

    // Split the output back apart along the reported placements.
    let mut clips = Vec::new();
    for p in &report.placements {
        let part = &output[p.start_frame as usize..(p.start_frame + p.frames) as usize];
        match p.clip_id {
            Some(_) => clips.push(part.to_vec()),
            None => assert!(part.iter().all(|&s| s == 0), "silence at {} not zero", p.index),
        }
    }
    assert_eq!(clips, vec![casa_s, house_s, estoy_s, home_s]);
}

#[test]
fn same_clip_may_appear_twice() {
    let dir = tempfile::tempdir().unwrap();
    let (a, a_s) = write_clip(dir.path(), "a.wav", 0.1, 42);
    let clip = Clip::from_path("a", &a);
    let timeline = Timeline::new(vec![
        Segment::Clip(clip.clone()),
        Segment::Silence(0.05),
        Segment::Clip(clip),
    ])
    .unwrap();
    let out = dir.path().join("out.wav");
    WavAssembler.assemble(timeline, &out).unwrap();

    let output = read_all(&out);
    assert_eq!(output.len(), a_s.len() * 2 + 800);
    assert_eq!(&output[..a_s.len()], a_s.as_slice());
    assert_eq!(&output[a_s.len() + 800..], a_s.as_slice());
    // Input clip is untouched.
    assert_eq!(read_all(&a), a_s);
}

#[test]
fn empty_timeline_never_reaches_the_assembler() {
    let err = Timeline::from_segments(Vec::new()).unwrap_err();
    assert!(matches!(err, AssembleError::EmptyInput));
}

#[test]
fn mismatched_sample_rate_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let (a, _) = write_clip(dir.path(), "a.wav", 0.1, 1);
    let b = dir.path().join("b.wav");
    let mut writer = WavWriter::create(&b, spec(8000)).unwrap();
    writer.write_sample(1i16).unwrap();
    writer.finalize().unwrap();

    let out = dir.path().join("out.wav");
    let timeline = Timeline::new(vec![
        Segment::Clip(Clip::from_path("a", &a)),
        Segment::Silence(1.0),
        Segment::Clip(Clip::from_path("b", &b)),
    ])
    .unwrap();
    match WavAssembler.assemble(timeline, &out) {
        Err(AssembleError::FormatMismatch { index, expected, found }) => {
            assert_eq!(index, 2);
            assert_eq!(expected.sample_rate, 16000);
            assert_eq!(found.sample_rate, 8000);
        }
        other => panic!("expected FormatMismatch, got {:?}", other.map(|r| r.total_frames)),
    }
    assert!(!out.exists());
}

#[test]
fn in_memory_and_file_clips_mix() {
    let dir = tempfile::tempdir().unwrap();
    let (a, a_s) = write_clip(dir.path(), "a.wav", 0.01, 7);
    let bytes = std::fs::read(&a).unwrap();
    let out = dir.path().join("out.wav");
    let timeline = Timeline::new(vec![
        Segment::Clip(Clip::from_wav_bytes("mem", bytes)),
        Segment::Clip(Clip::from_path("file", &a)),
    ])
    .unwrap();
    let report = WavAssembler.assemble(timeline, &out).unwrap();
    assert_eq!(report.total_frames as usize, a_s.len() * 2);
    assert_eq!(read_all(&out), [a_s.clone(), a_s].concat());
}
