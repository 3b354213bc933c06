//! Scene file boundary (JSON → [`crate::clip::ClipTree`]).

mod model;

pub use model::{ClipDef, SceneDef};
