#![forbid(unsafe_code)]

pub mod assets;
pub mod audio;
pub mod clip;
pub mod encode;
pub mod foundation;
pub mod render;
pub mod scene;
pub mod session;
pub mod timeline;

pub use assets::{DefaultMaterials, Material, MaterialCtx, MaterialFactory, ProbeCache, Prober};
pub use audio::{AudioTrack, collect_audio_tracks};
pub use clip::{ClipConf, ClipId, ClipKind, ClipNode, ClipTiming, ClipTree, TimeExpr};
pub use encode::{
    CancelToken, FfmpegOpts, FfmpegSynthesis, FrameSource, FrameStream, FrameStreamOpts,
    InMemorySynthesis, Synthesis, SynthesisOutput,
};
pub use foundation::core::{Canvas, Fps, FrameIndex, TimeWindow};
pub use foundation::error::{MontageError, MontageResult};
pub use render::{ClearRenderer, FrameBuffer, FramePayload, FrameRenderer, FrameState, Presenter};
pub use scene::{ClipDef, SceneDef};
pub use session::{
    EventEmitter, ManualClock, Phase, PlaybackHandle, PlaybackOutcome, RenderConfig, RenderEvent,
    RenderMode, RenderTask,
};
pub use timeline::{AnnotateMode, AnnotateReport, Timeline};
