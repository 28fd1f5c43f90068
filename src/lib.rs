pub mod args;
pub mod assembler;
pub mod audio;
pub mod batch;
pub mod error;
pub mod manifest;
pub mod naming;
pub mod sentences;
pub mod subtitle;
pub mod timeline;
pub mod tts;

pub use assembler::{Assembler, AssemblyReport, FfmpegAssembler, WavAssembler};
pub use error::{AssembleError, SynthesisError};
pub use timeline::{Clip, GapPolicy, Segment, Timeline};
