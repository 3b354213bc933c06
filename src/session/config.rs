use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MontageError, MontageResult};
use crate::timeline::AnnotateMode;

/// Drawing backend requested by the scene. Interpreted by the frame renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderBackendKind {
    #[default]
    Webgl,
    Canvas,
}

/// Encoding of frames handed from the frame stream to the synthesis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheFormat {
    /// Unencoded RGBA8.
    #[default]
    Raw,
    #[serde(alias = "jpeg")]
    Jpg,
    Png,
}

/// Session configuration.
///
/// Keys are camelCase in scene files (`highWaterMark`, `cacheFormat`, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub render: RenderBackendKind,
    pub antialias: bool,
    pub cache_format: CacheFormat,
    /// JPEG quality, 1..=100.
    pub cache_quality: u8,
    /// Maximum frames buffered between production and the encoder.
    pub high_water_mark: usize,
    /// Maximum frames produced concurrently.
    pub parallel: usize,
    pub output_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    /// Explicit output file; wins over `output_dir`.
    pub output: Option<PathBuf>,
    /// Initial root duration in seconds, before the timeline settles it.
    pub duration: Option<f64>,
    /// Keep the per-task cache directory after burning.
    pub debug: bool,
    /// Background color (RGBA8) used by the default renderer.
    pub background: [u8; 4],
    pub annotate: AnnotateMode,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 450,
            fps: 30,
            render: RenderBackendKind::default(),
            antialias: false,
            cache_format: CacheFormat::default(),
            cache_quality: 80,
            high_water_mark: 10,
            parallel: 2,
            output_dir: None,
            cache_dir: None,
            output: None,
            duration: None,
            debug: false,
            background: [0, 0, 0, 255],
            annotate: AnnotateMode::default(),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> MontageResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MontageError::validation("width/height must be > 0"));
        }
        if self.fps == 0 {
            return Err(MontageError::validation("fps must be > 0"));
        }
        if self.high_water_mark == 0 {
            return Err(MontageError::validation("highWaterMark must be >= 1"));
        }
        if self.parallel == 0 {
            return Err(MontageError::validation("parallel must be >= 1"));
        }
        if !(1..=100).contains(&self.cache_quality) {
            return Err(MontageError::validation("cacheQuality must be in 1..=100"));
        }
        if let Some(d) = self.duration
            && (!d.is_finite() || d < 0.0)
        {
            return Err(MontageError::validation("duration must be a finite value >= 0"));
        }
        if let AnnotateMode::Converge { max_passes } = self.annotate
            && max_passes < 2
        {
            return Err(MontageError::validation(
                "annotate max_passes must be >= 2",
            ));
        }
        Ok(())
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    pub fn fps(&self) -> MontageResult<Fps> {
        Fps::new(self.fps, 1)
    }

    pub fn cache_root(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("montage-cache"))
    }

    /// Per-task cache directory under [`Self::cache_root`].
    pub fn task_cache_dir(&self, task_key: &str) -> PathBuf {
        self.cache_root().join(task_key)
    }

    /// `output`, or `<outputDir>/<task_key>.mp4`.
    pub fn output_path(&self, task_key: &str) -> PathBuf {
        if let Some(out) = &self.output {
            return out.clone();
        }
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!("{task_key}.mp4"))
    }
}
