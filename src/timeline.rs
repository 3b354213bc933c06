//! Timeline: total duration aggregation and the virtual clock.

use crate::clip::{ClipId, ClipKind, ClipTree};
use crate::foundation::core::{FrameIndex, Fps, round_ms};

/// How many annotate passes the timeline runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum AnnotateMode {
    /// Structural pass, duration update, second pass. Dependencies deeper than that may keep
    /// stale values; [`AnnotateReport::converged`] reports it.
    #[default]
    TwoPass,
    /// Repeat until the root duration stops changing, bounded by `max_passes`.
    Converge { max_passes: u32 },
}

/// Outcome of [`Timeline::annotate`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnnotateReport {
    pub duration: f64,
    pub previous: f64,
    /// The root duration differs from the one before annotating.
    pub changed: bool,
    pub passes: u32,
    /// A further pass would not change the root duration.
    pub converged: bool,
}

#[derive(Clone, Debug)]
pub struct Timeline {
    fps: Fps,
    mode: AnnotateMode,
    duration: f64,
    frames_num: u64,
    current_ms: f64,
    cursor: u64,
}

impl Timeline {
    pub fn new(fps: Fps) -> Self {
        Self {
            fps,
            mode: AnnotateMode::default(),
            duration: 0.0,
            frames_num: 0,
            current_ms: 0.0,
            cursor: 0,
        }
    }

    pub fn with_mode(mut self, mode: AnnotateMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Total duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn frames_num(&self) -> u64 {
        self.frames_num
    }

    /// Resolve the timing of every node and settle the root duration.
    #[tracing::instrument(skip_all, fields(mode = ?self.mode))]
    pub fn annotate(&mut self, tree: &mut ClipTree) -> AnnotateReport {
        let previous = tree.root_duration();
        let (min_passes, max_passes) = match self.mode {
            AnnotateMode::TwoPass => (2, 2),
            AnnotateMode::Converge { max_passes } => (1, max_passes.max(2)),
        };

        tree.assign_z_indices();
        tree.annotate_structure();
        tree.annotate_all();
        let mut passes = 1;
        let converged = loop {
            let target = Self::max_end_time(tree);
            let stable = target == tree.root_duration();
            if passes >= max_passes || (stable && passes >= min_passes) {
                break stable;
            }
            if !stable {
                tree.set_root_duration(target);
            }
            tree.annotate_structure();
            tree.annotate_all();
            passes += 1;
        };

        if !converged {
            tracing::warn!(
                passes,
                duration = tree.root_duration(),
                "timeline duration did not settle; some percentages may use a stale duration"
            );
        }

        self.duration = tree.root_duration();
        self.frames_num = self.fps.frames_to_cover(self.duration);
        tracing::debug!(duration = self.duration, frames = self.frames_num, passes, "annotated");

        AnnotateReport {
            duration: self.duration,
            previous,
            changed: self.duration != previous,
            passes,
            converged,
        }
    }

    /// Structural duration, extended by visual media that end later.
    ///
    /// Looping media only count when they carry an explicit `duration` or `end`.
    fn max_end_time(tree: &ClipTree) -> f64 {
        let root = tree.root();
        let mut max = match tree.spine() {
            Some(spine) => tree.duration(spine),
            None => tree
                .node(root)
                .children()
                .iter()
                .filter(|c| tree.node(**c).kind() != ClipKind::Audio)
                .map(|c| tree.end_time(*c))
                .fold(0.0, f64::max),
        };
        for id in tree.all_nodes(root) {
            if Self::extends(tree, id) {
                let abs_end = tree
                    .node(id)
                    .timing()
                    .map_or_else(|| tree.abs_end_time(id), |t| t.abs_end);
                max = max.max(abs_end);
            }
        }
        round_ms(max)
    }

    fn extends(tree: &ClipTree, id: ClipId) -> bool {
        let node = tree.node(id);
        node.kind().extends_timeline()
            && (!node.looping() || node.conf().duration.is_some() || node.conf().end.is_some())
    }

    /// Current virtual time in milliseconds.
    pub fn current_ms(&self) -> f64 {
        self.current_ms
    }

    /// Last addressable millisecond.
    pub fn total_ms(&self) -> f64 {
        (self.duration * 1000.0).floor()
    }

    pub fn is_over(&self) -> bool {
        self.current_ms >= self.total_ms()
    }

    /// Timeline position of frame `idx` in seconds.
    pub fn frame_time(&self, idx: FrameIndex) -> f64 {
        self.fps.frames_to_secs(idx.0)
    }

    /// Advance by exactly one frame.
    pub fn next_frame(&mut self) {
        self.cursor += 1;
        self.current_ms = self.fps.frames_to_secs(self.cursor) * 1000.0;
    }

    /// Advance by `delta_ms` of virtual time, stopping at [`Timeline::total_ms`].
    pub fn advance(&mut self, delta_ms: f64) {
        self.current_ms = (self.current_ms + delta_ms).clamp(0.0, self.total_ms().max(0.0));
        self.cursor = (self.current_ms / self.fps.frame_duration_ms()).floor() as u64;
    }

    /// Move the clock to `ms`, clamped to the timeline.
    pub fn jump_to(&mut self, ms: f64) {
        self.current_ms = ms.clamp(0.0, self.total_ms().max(0.0));
        self.cursor = (self.current_ms / self.fps.frame_duration_ms()).floor() as u64;
    }

    pub fn rewind(&mut self) {
        self.current_ms = 0.0;
        self.cursor = 0;
    }
}

#[cfg(test)]
#[path = "../tests/unit/timeline.rs"]
mod tests;
