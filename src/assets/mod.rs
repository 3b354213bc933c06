//! Node resources: materials, media probing and cache paths.

pub mod material;
pub mod media;
pub mod paths;

pub use material::{
    DefaultMaterials, FileMaterial, Material, MaterialCtx, MaterialFactory, MediaMaterial,
    NoMaterial, Prepared,
};
pub use media::{Ffprobe, MediaProbe, ProbeCache, Prober};
