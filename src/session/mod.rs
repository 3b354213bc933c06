//! Render sessions: configuration, lifecycle events, the orchestrator and interactive playback.

pub mod config;
pub mod events;
pub mod playback;
mod renderer;

pub use config::{CacheFormat, RenderBackendKind, RenderConfig};
pub use events::{EventEmitter, RenderEvent, Usage};
pub use playback::{
    Clock, DriftController, ManualClock, PlaybackHandle, PlaybackOutcome, SystemClock,
};
pub use renderer::RenderTask;

/// What a session is being prepared for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Real-time playback against the virtual clock.
    #[default]
    Interactive,
    /// Offline rendering through a synthesis collaborator.
    Burn,
}

/// Orchestrator phase.
///
/// `Start → PreProcessing → TimelineBuilt → MaterialPrepared → (Interactive | Burning) →
/// Complete | Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Start,
    PreProcessing,
    TimelineBuilt,
    MaterialPrepared,
    Interactive,
    Burning,
    Complete,
    Error,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::PreProcessing => "preProcessing",
            Phase::TimelineBuilt => "timelineBuilt",
            Phase::MaterialPrepared => "materialPrepared",
            Phase::Interactive => "interactive",
            Phase::Burning => "burning",
            Phase::Complete => "complete",
            Phase::Error => "error",
        }
    }

    /// Terminal phases accept no further operations.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Error)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
