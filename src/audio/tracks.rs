use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::assets::paths::resolve_source;
use crate::clip::{ClipId, ClipKind, ClipTree};
use crate::foundation::core::{TimeWindow, round_ms};
use crate::foundation::error::{MontageError, MontageResult};

/// One audio input of the final mix, placed on the timeline.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    pub id: String,
    pub path: PathBuf,
    /// Timeline window in seconds.
    pub start: f64,
    pub end: f64,
    /// Source offset where playback begins.
    pub ss: f64,
    /// Source offset where playback ends.
    pub to: Option<f64>,
    pub volume: f64,
    pub speed: f64,
    pub looping: bool,
    pub fade_in: f64,
    pub fade_out: f64,
}

impl AudioTrack {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Collect every active audio node of an annotated tree.
///
/// A track plays during its show window, narrowed by the show windows of its ancestors. Clips
/// meeting at a transition therefore hand their audio over at the transition's centre.
pub fn collect_audio_tracks(tree: &ClipTree, assets_root: &Path) -> MontageResult<Vec<AudioTrack>> {
    let mut tracks = Vec::new();
    for id in tree.all_nodes(tree.root()) {
        let node = tree.node(id);
        if node.kind() != ClipKind::Audio || !tree.is_live(id) {
            continue;
        }
        let Some(src) = node.conf().src.as_deref() else {
            tracing::warn!(id = node.id(), "audio node without 'src' skipped");
            continue;
        };
        let timing = node.timing().ok_or_else(|| {
            MontageError::state(format!(
                "audio[id={}] has no timing; annotate the timeline first",
                node.id()
            ))
        })?;

        let window = ancestor_scope(tree, id, timing.show);
        if window.is_empty() {
            continue;
        }

        let conf = node.conf();
        let speed = conf
            .speed
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(1.0);
        let skipped = (window.start - timing.abs_start).max(0.0) * speed;
        tracks.push(AudioTrack {
            id: node.id().to_string(),
            path: resolve_source(src, assets_root)?,
            start: window.start,
            end: window.end,
            ss: round_ms(conf.ss.unwrap_or(0.0).max(0.0) + skipped),
            to: conf.to,
            volume: conf.volume.filter(|v| v.is_finite()).unwrap_or(1.0).max(0.0),
            speed,
            looping: node.looping(),
            fade_in: conf.fade_in.unwrap_or(0.0).max(0.0),
            fade_out: conf.fade_out.unwrap_or(0.0).max(0.0),
        });
    }
    Ok(tracks)
}

/// Active with every ancestor active.
fn ancestor_scope(tree: &ClipTree, id: ClipId, mut window: TimeWindow) -> TimeWindow {
    let mut cur = tree.node(id).parent();
    while let Some(p) = cur {
        let node = tree.node(p);
        if node.kind() == ClipKind::Root {
            break;
        }
        if let Some(t) = node.timing() {
            window = TimeWindow::new(window.start.max(t.show.start), window.end.min(t.show.end));
        }
        cur = node.parent();
    }
    window
}

#[cfg(test)]
#[path = "../../tests/unit/audio/tracks.rs"]
mod tests;
