//! Frame production seam: immutable scene snapshots, renderer/presenter traits and payload
//! encoding.

pub mod backend;
pub mod frame;
pub mod scene;

pub use backend::{ClearRenderer, FrameRenderer, Presenter};
pub use frame::{FrameBuffer, FramePayload, encode_payload};
pub use scene::{FrameState, Layer, LayerSpec, SceneSnapshot};
