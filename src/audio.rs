use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

/// Wraps raw signed 16-bit little-endian PCM (what Polly returns for
/// `--output-format pcm`) into a WAV file.
pub fn write_pcm16_wav(
    pcm: &[u8],
    sample_rate: u32,
    channels: u16,
    path: impl AsRef<Path>,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    // A trailing odd byte is not a whole sample; drop it.
    for pair in pcm.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
    }
    writer.finalize()
}
