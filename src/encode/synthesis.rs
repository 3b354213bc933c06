use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::audio::AudioTrack;
use crate::foundation::error::{MontageError, MontageResult};
use crate::render::FramePayload;

/// Pull side of the frame pipeline as seen by a synthesis.
pub trait FrameSource {
    /// Next frame in timeline order, `None` at the end.
    fn next_frame(&mut self) -> MontageResult<Option<FramePayload>>;
}

/// Result of a finished synthesis.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SynthesisOutput {
    /// Produced file, if the synthesis writes one.
    pub path: Option<PathBuf>,
    pub frames: u64,
}

/// Muxing/encoding collaborator of the burn pipeline.
///
/// The orchestrator configures it with `set_frames_num`, `set_duration` and `add_audios`, then
/// calls `start`, which pulls every frame from the source and returns once the output is
/// complete. An error from the source must abort the synthesis and be returned unchanged.
pub trait Synthesis: Send {
    fn set_frames_num(&mut self, frames: u64);
    fn set_duration(&mut self, secs: f64);
    fn add_audios(&mut self, tracks: Vec<AudioTrack>);
    fn start(&mut self, frames: &mut dyn FrameSource) -> MontageResult<SynthesisOutput>;
}

/// Synthesis that keeps everything in memory; for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySynthesis {
    frames_num: u64,
    duration: f64,
    audios: Vec<AudioTrack>,
    pub(crate) frames: Vec<FramePayload>,
    output: Option<PathBuf>,
}

impl InMemorySynthesis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path reported as the synthesis result.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn frames_num(&self) -> u64 {
        self.frames_num
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn audios(&self) -> &[AudioTrack] {
        &self.audios
    }

    /// Captured frames in delivery order.
    pub fn frames(&self) -> &[FramePayload] {
        &self.frames
    }
}

impl Synthesis for InMemorySynthesis {
    fn set_frames_num(&mut self, frames: u64) {
        self.frames_num = frames;
    }

    fn set_duration(&mut self, secs: f64) {
        self.duration = secs;
    }

    fn add_audios(&mut self, tracks: Vec<AudioTrack>) {
        self.audios.extend(tracks);
    }

    fn start(&mut self, frames: &mut dyn FrameSource) -> MontageResult<SynthesisOutput> {
        self.frames.clear();
        while let Some(frame) = frames.next_frame()? {
            if let Some(last) = self.frames.last()
                && frame.index <= last.index
            {
                return Err(MontageError::synthesis(
                    "synthesis received out-of-order frame index",
                ));
            }
            self.frames.push(frame);
        }
        if self.frames.len() as u64 != self.frames_num {
            return Err(MontageError::synthesis(format!(
                "expected {} frames, received {}",
                self.frames_num,
                self.frames.len()
            )));
        }
        Ok(SynthesisOutput {
            path: self.output.clone(),
            frames: self.frames.len() as u64,
        })
    }
}

/// Cooperative cancellation flag shared between the orchestrator and its frame source.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/synthesis.rs"]
mod tests;
