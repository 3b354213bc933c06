use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::foundation::error::{MontageError, MontageResult};

/// Stream metadata of a media source.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaProbe {
    pub path: PathBuf,
    /// Container duration in seconds, when reported.
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub has_video: bool,
    /// Whether at least one audio stream was detected.
    pub has_audio: bool,
}

/// Source of [`MediaProbe`]s.
pub trait Prober: Send + Sync {
    fn probe(&self, path: &Path) -> MontageResult<MediaProbe>;
}

/// Prober backed by the system `ffprobe`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ffprobe;

impl Prober for Ffprobe {
    fn probe(&self, path: &Path) -> MontageResult<MediaProbe> {
        probe_media(path)
    }
}

/// Probe a media file through `ffprobe`.
pub fn probe_media(source_path: &Path) -> MontageResult<MediaProbe> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        #[serde(default)]
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| MontageError::material(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(MontageError::material(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| MontageError::material(format!("ffprobe json parse failed: {e}")))?;

    let parse_secs = |s: &Option<String>| {
        s.as_deref()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
    };
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let duration = parsed
        .format
        .as_ref()
        .and_then(|f| parse_secs(&f.duration))
        .or_else(|| parsed.streams.iter().find_map(|s| parse_secs(&s.duration)));

    Ok(MediaProbe {
        path: source_path.to_path_buf(),
        duration,
        width: video.and_then(|v| v.width),
        height: video.and_then(|v| v.height),
        has_video: video.is_some(),
        has_audio: parsed
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio")),
    })
}

/// Per-session cache of probe results, keyed by source path.
pub struct ProbeCache {
    prober: Arc<dyn Prober>,
    entries: Mutex<HashMap<PathBuf, Arc<MediaProbe>>>,
}

impl ProbeCache {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self {
            prober,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ffprobe() -> Self {
        Self::new(Arc::new(Ffprobe))
    }

    /// Cached probe for `path`, probing on first use.
    pub fn get(&self, path: &Path) -> MontageResult<Arc<MediaProbe>> {
        if let Some(hit) = self.lock()?.get(path) {
            return Ok(hit.clone());
        }
        // Probe without holding the lock; a concurrent miss probes twice and keeps the first.
        let probed = Arc::new(self.prober.probe(path)?);
        let mut entries = self.lock()?;
        Ok(entries
            .entry(path.to_path_buf())
            .or_insert(probed)
            .clone())
    }

    /// Drop the cached entry for `path`. Returns whether one existed.
    pub fn invalidate(&self, path: &Path) -> bool {
        self.lock()
            .map(|mut e| e.remove(path).is_some())
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut e) = self.lock() {
            e.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MontageResult<std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<MediaProbe>>>> {
        self.entries
            .lock()
            .map_err(|_| MontageError::material("probe cache lock poisoned"))
    }
}

impl std::fmt::Debug for ProbeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeCache")
            .field("entries", &self.len())
            .finish()
    }
}

/// Extract the audio stream of `source` (sliced to `[ss, to)`) into `dest` as AAC.
pub fn extract_audio(
    source: &Path,
    dest: &Path,
    ss: Option<f64>,
    to: Option<f64>,
) -> MontageResult<()> {
    crate::assets::paths::ensure_parent_dir(dest)?;

    let mut cmd = std::process::Command::new("ffmpeg");
    cmd.args(["-y", "-v", "error"]);
    if let Some(ss) = ss.filter(|v| *v > 0.0) {
        cmd.args(["-ss", &format!("{ss:.3}")]);
    }
    if let Some(to) = to {
        cmd.args(["-to", &format!("{to:.3}")]);
    }
    cmd.arg("-i")
        .arg(source)
        .args(["-vn", "-ac", "2", "-ar", "44100", "-c:a", "aac"])
        .arg(dest);

    let out = cmd
        .output()
        .map_err(|e| MontageError::material(format!("failed to run ffmpeg: {e}")))?;
    if !out.status.success() {
        return Err(MontageError::material(format!(
            "audio extraction failed for '{}': {}",
            source.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    Ok(())
}

/// Playable length of a source slice `[ss, to)` at `speed`.
pub fn playable_length(total: f64, ss: Option<f64>, to: Option<f64>, speed: Option<f64>) -> f64 {
    let ss = ss.unwrap_or(0.0).clamp(0.0, total);
    let to = to.map_or(total, |t| t.min(total));
    let speed = speed.filter(|s| s.is_finite() && *s > 0.0).unwrap_or(1.0);
    (to - ss).max(0.0) / speed
}
