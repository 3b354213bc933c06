//! Burn pipeline: the backpressured frame stream and synthesis collaborators.

pub mod ffmpeg;
pub mod stream;
pub mod synthesis;

pub use ffmpeg::{FfmpegOpts, FfmpegSynthesis, is_ffmpeg_on_path};
pub use stream::{FramePull, FrameStream, FrameStreamOpts, StreamStats};
pub use synthesis::{CancelToken, FrameSource, InMemorySynthesis, Synthesis, SynthesisOutput};
