//! Per-node resource loading.
//!
//! Every node gets one [`Material`] from the session's [`MaterialFactory`]. The orchestrator
//! calls [`Material::preprocess`] during pre-processing (with retries) and
//! [`Material::prepare`] once timing is final.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::assets::media::{MediaProbe, ProbeCache, extract_audio, playable_length};
use crate::assets::paths::{cache_key, resolve_source};
use crate::clip::{ClipKind, ClipNode, ClipTiming};
use crate::foundation::error::{MontageError, MontageResult};
use crate::session::RenderMode;

/// Session context shared with materials.
pub struct MaterialCtx<'a> {
    pub assets_root: &'a Path,
    pub cache_dir: &'a Path,
    pub probes: &'a ProbeCache,
    pub mode: RenderMode,
}

/// Output of [`Material::prepare`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Prepared {
    /// Audio track extracted from the node's media, ready to be mixed.
    pub extracted_audio: Option<PathBuf>,
}

pub trait Material: Send {
    /// Load the node's resource. `progress` takes fractions in `0.0..=1.0`.
    fn preprocess(
        &mut self,
        node: &ClipNode,
        ctx: &MaterialCtx<'_>,
        progress: &mut dyn FnMut(f64),
    ) -> MontageResult<()>;

    /// Playable length in seconds, once known.
    fn length(&self) -> Option<f64> {
        None
    }

    /// Prepare the material against the node's final timing.
    fn prepare(
        &mut self,
        _node: &ClipNode,
        _timing: &ClipTiming,
        _ctx: &MaterialCtx<'_>,
    ) -> MontageResult<Prepared> {
        Ok(Prepared::default())
    }
}

pub trait MaterialFactory: Send + Sync {
    fn create(&self, node: &ClipNode) -> Box<dyn Material>;
}

/// Built-in materials: file check for images, ffprobe-backed media, nothing for the rest.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultMaterials;

impl MaterialFactory for DefaultMaterials {
    fn create(&self, node: &ClipNode) -> Box<dyn Material> {
        match node.kind() {
            ClipKind::Image => Box::new(FileMaterial::default()),
            ClipKind::Video | ClipKind::Gif | ClipKind::Audio => {
                Box::new(MediaMaterial::default())
            }
            _ => Box::new(NoMaterial),
        }
    }
}

impl<F> MaterialFactory for F
where
    F: Fn(&ClipNode) -> Box<dyn Material> + Send + Sync,
{
    fn create(&self, node: &ClipNode) -> Box<dyn Material> {
        self(node)
    }
}

/// Material for nodes without external resources.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMaterial;

impl Material for NoMaterial {
    fn preprocess(
        &mut self,
        _node: &ClipNode,
        _ctx: &MaterialCtx<'_>,
        progress: &mut dyn FnMut(f64),
    ) -> MontageResult<()> {
        progress(1.0);
        Ok(())
    }
}

fn source_of(node: &ClipNode, ctx: &MaterialCtx<'_>) -> MontageResult<PathBuf> {
    let src = node.conf().src.as_deref().ok_or_else(|| {
        MontageError::material(format!("{}[id={}] has no 'src'", node.kind(), node.id()))
    })?;
    resolve_source(src, ctx.assets_root)
}

/// A local file that must exist.
#[derive(Clone, Debug, Default)]
pub struct FileMaterial {
    path: Option<PathBuf>,
}

impl FileMaterial {
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Material for FileMaterial {
    fn preprocess(
        &mut self,
        node: &ClipNode,
        ctx: &MaterialCtx<'_>,
        progress: &mut dyn FnMut(f64),
    ) -> MontageResult<()> {
        let path = source_of(node, ctx)?;
        if !path.is_file() {
            return Err(MontageError::material(format!(
                "file not found: '{}'",
                path.display()
            )));
        }
        self.path = Some(path);
        progress(1.0);
        Ok(())
    }
}

/// Video, gif or audio source probed through the session's [`ProbeCache`].
#[derive(Clone, Debug, Default)]
pub struct MediaMaterial {
    path: Option<PathBuf>,
    probe: Option<Arc<MediaProbe>>,
    length: Option<f64>,
}

impl MediaMaterial {
    pub fn probe(&self) -> Option<&MediaProbe> {
        self.probe.as_deref()
    }
}

impl Material for MediaMaterial {
    fn preprocess(
        &mut self,
        node: &ClipNode,
        ctx: &MaterialCtx<'_>,
        progress: &mut dyn FnMut(f64),
    ) -> MontageResult<()> {
        let path = source_of(node, ctx)?;
        progress(0.5);
        let probe = ctx.probes.get(&path)?;
        let conf = node.conf();
        self.length = probe
            .duration
            .map(|total| playable_length(total, conf.ss, conf.to, conf.speed));
        self.path = Some(path);
        self.probe = Some(probe);
        progress(1.0);
        Ok(())
    }

    fn length(&self) -> Option<f64> {
        self.length
    }

    fn prepare(
        &mut self,
        node: &ClipNode,
        _timing: &ClipTiming,
        ctx: &MaterialCtx<'_>,
    ) -> MontageResult<Prepared> {
        let wants_audio = node.kind() == ClipKind::Video
            && ctx.mode == RenderMode::Burn
            && node.conf().audio.unwrap_or(true)
            && self.probe.as_ref().is_some_and(|p| p.has_audio);
        let Some(src) = self.path.as_ref().filter(|_| wants_audio) else {
            return Ok(Prepared::default());
        };

        let conf = node.conf();
        let key = cache_key(&[
            &src.to_string_lossy(),
            &format!("{:?}", conf.ss),
            &format!("{:?}", conf.to),
        ]);
        let dest = ctx.cache_dir.join(format!("{}_{key}.m4a", node.id()));
        extract_audio(src, &dest, conf.ss, conf.to)?;
        Ok(Prepared {
            extracted_audio: Some(dest),
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/material.rs"]
mod tests;
