//! Memoized timing resolution over a [`ClipTree`].
//!
//! A node's start depends on its previous sibling's end, so resolving a chain naively walks the
//! chain again for every getter. [`Resolver`] caches each resolved value for the lifetime of
//! one pass; the tree must not change while a resolver borrows it.

use crate::clip::node::{ClipKind, ClipNode, ClipTiming};
use crate::clip::tree::{ClipId, ClipTree, DEFAULT_TRANSITION_DURATION, FALLBACK_DURATION};
use crate::foundation::core::{TimeWindow, round_ms};

pub(crate) struct Resolver<'t> {
    tree: &'t ClipTree,
    start: Vec<Option<f64>>,
    end: Vec<Option<f64>>,
    duration: Vec<Option<f64>>,
    abs_start: Vec<Option<f64>>,
}

fn memo(slot: &[Option<f64>], id: ClipId) -> Option<f64> {
    slot.get(id.index()).copied().flatten()
}

fn store(slot: &mut [Option<f64>], id: ClipId, value: f64) -> f64 {
    if let Some(s) = slot.get_mut(id.index()) {
        *s = Some(value);
    }
    value
}

impl<'t> Resolver<'t> {
    pub(crate) fn new(tree: &'t ClipTree) -> Self {
        let n = tree.slot_count();
        Self {
            tree,
            start: vec![None; n],
            end: vec![None; n],
            duration: vec![None; n],
            abs_start: vec![None; n],
        }
    }

    fn node(&self, id: ClipId) -> &'t ClipNode {
        self.tree.node(id)
    }

    fn time(&mut self, id: ClipId, expr: Option<&crate::clip::TimeExpr>) -> Option<f64> {
        let expr = expr?;
        let parent_duration = if expr.is_relative() {
            self.node(id).parent.map(|p| self.duration(p))
        } else {
            None
        };
        expr.resolve(parent_duration)
    }

    pub(crate) fn duration(&mut self, id: ClipId) -> f64 {
        if let Some(v) = memo(&self.duration, id) {
            return v;
        }
        let node = self.node(id);
        let value = match node.kind {
            ClipKind::Root => node.derived_duration.unwrap_or(0.0),
            ClipKind::Spine if node.derived_duration.is_some() => {
                node.derived_duration.unwrap_or(0.0)
            }
            ClipKind::Transition => round_ms(self.transition_duration(id)),
            _ => {
                let end = self.end_time(id);
                round_ms(end - self.start_time(id))
            }
        };
        store(&mut self.duration, id, value)
    }

    fn transition_duration(&mut self, id: ClipId) -> f64 {
        self.time(id, self.node(id).conf.duration.as_ref())
            .filter(|d| *d >= 0.0)
            .unwrap_or(DEFAULT_TRANSITION_DURATION)
    }

    pub(crate) fn start_time(&mut self, id: ClipId) -> f64 {
        if let Some(v) = memo(&self.start, id) {
            return v;
        }
        let node = self.node(id);
        let start = match node.kind {
            ClipKind::Root => 0.0,
            ClipKind::Transition => match self.tree.prev_sibling(id) {
                Some(prev) => {
                    let prev_end = self.end_time(prev);
                    (prev_end - self.transition_duration(id) * 0.5).max(0.0)
                }
                None => self.configured_start(id),
            },
            _ => self.configured_start(id),
        };
        store(&mut self.start, id, round_ms(start))
    }

    fn configured_start(&mut self, id: ClipId) -> f64 {
        match self.time(id, self.node(id).conf.start.as_ref()) {
            Some(start) => start,
            None => self.chained_start(id),
        }
    }

    /// Default start: the previous sibling's end. Root children are parallel layers (the
    /// spine and background audio) and start at 0.
    fn chained_start(&mut self, id: ClipId) -> f64 {
        let parent = self.node(id).parent;
        if parent.is_some_and(|p| self.node(p).kind == ClipKind::Root) {
            return 0.0;
        }
        self.tree
            .prev_sibling(id)
            .map_or(0.0, |p| self.end_time(p))
    }

    pub(crate) fn end_time(&mut self, id: ClipId) -> f64 {
        if let Some(v) = memo(&self.end, id) {
            return v;
        }
        let node = self.node(id);
        let end = match node.kind {
            ClipKind::Root => self.duration(id),
            // Chained siblings start where the outgoing clip ended.
            ClipKind::Transition => match self.tree.prev_sibling(id) {
                Some(prev) => self.end_time(prev),
                None => self.start_time(id) + self.transition_duration(id),
            },
            ClipKind::Spine if node.derived_duration.is_some() => {
                self.start_time(id) + node.derived_duration.unwrap_or(0.0)
            }
            _ => {
                let start = self.start_time(id);
                let real = self.resolve_real_end(id, start);
                let end = match node.parent {
                    Some(p) if self.node(p).kind.is_bounded() => real.min(self.duration(p)),
                    _ => real,
                };
                end.max(start)
            }
        };
        store(&mut self.end, id, round_ms(end))
    }

    pub(crate) fn real_end_time(&mut self, id: ClipId) -> f64 {
        let start = self.start_time(id);
        round_ms(self.resolve_real_end(id, start))
    }

    fn resolve_real_end(&mut self, id: ClipId, start: f64) -> f64 {
        let node = self.node(id);
        if let Some(end) = self.time(id, node.conf.end.as_ref())
            && end >= start
        {
            return end;
        }

        let duration = self
            .time(id, node.conf.duration.as_ref())
            .filter(|d| *d >= 0.0)
            .or_else(|| default_duration(node));
        if let Some(duration) = duration {
            return start + duration;
        }

        if let Some(end) = self.default_end(node)
            && end > start
        {
            return end;
        }
        start + FALLBACK_DURATION
    }

    /// `100%` of the parent, except for non-looping media which end with their material.
    fn default_end(&mut self, node: &ClipNode) -> Option<f64> {
        if node.kind.is_media() && !node.looping() {
            return None;
        }
        node.parent.map(|p| self.duration(p))
    }

    pub(crate) fn abs_start_time(&mut self, id: ClipId) -> f64 {
        if let Some(v) = memo(&self.abs_start, id) {
            return v;
        }
        let base = match self.node(id).parent {
            Some(p) => self.abs_start_time(p),
            None => 0.0,
        };
        let value = round_ms(base + self.start_time(id));
        store(&mut self.abs_start, id, value)
    }

    pub(crate) fn abs_end_time(&mut self, id: ClipId) -> f64 {
        let base = match self.node(id).parent {
            Some(p) => self.abs_start_time(p),
            None => 0.0,
        };
        round_ms(base + self.end_time(id))
    }

    /// Half the duration of `id` when it is a transition, else 0.
    fn transition_half(&mut self, id: Option<ClipId>) -> f64 {
        match id {
            Some(id) if self.node(id).kind == ClipKind::Transition => self.duration(id) * 0.5,
            _ => 0.0,
        }
    }

    /// Absolute timing of `id` with its draw and show windows.
    pub(crate) fn timing(&mut self, id: ClipId) -> ClipTiming {
        let kind = self.node(id).kind;
        let start = self.start_time(id);
        let end = self.end_time(id);
        let duration = self.duration(id);
        let abs_start = self.abs_start_time(id);
        let abs_end = self.abs_end_time(id);

        let (draw, show) = if kind == ClipKind::Transition {
            let window = TimeWindow::new(abs_start, round_ms(abs_start + duration));
            (window, window)
        } else {
            let lead = self.transition_half(self.tree.prev_sibling(id));
            let trail = self.transition_half(self.tree.next_sibling(id));
            let draw = TimeWindow::new(
                round_ms((abs_start - lead).max(0.0)),
                round_ms(abs_end + trail),
            );
            (draw, TimeWindow::new(abs_start, abs_end))
        };

        ClipTiming {
            start,
            end,
            duration,
            abs_start,
            abs_end,
            draw,
            show,
        }
    }
}

fn default_duration(node: &ClipNode) -> Option<f64> {
    if node.kind.is_media() && !node.looping() {
        node.media_length
    } else {
        None
    }
}
