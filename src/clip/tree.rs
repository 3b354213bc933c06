use crate::clip::node::{ClipKind, ClipNode, ClipTiming};
use crate::clip::resolve::Resolver;
use crate::foundation::core::{Canvas, round_ms};
use crate::foundation::error::{MontageError, MontageResult};
use crate::foundation::units::Units;

/// Seconds added to `start` when neither `end`, `duration` nor a usable default resolves.
pub const FALLBACK_DURATION: f64 = 3.0;
/// Transition length in seconds when the transition does not set one.
pub const DEFAULT_TRANSITION_DURATION: f64 = 1.0;

const MAX_BASE_Z: f64 = 999.0;

/// Handle to a node inside a [`ClipTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(pub(crate) u32);

impl ClipId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Arena-backed clip tree.
///
/// Parents own their children through ordered id lists. Sibling relations are derived from the
/// parent's list, so there are no back-pointers to keep consistent.
#[derive(Clone, Debug)]
pub struct ClipTree {
    slots: Vec<Option<ClipNode>>,
    root: ClipId,
    canvas: Canvas,
}

impl ClipTree {
    pub fn new(canvas: Canvas) -> Self {
        Self {
            slots: vec![Some(ClipNode::new(ClipKind::Root, "root"))],
            root: ClipId(0),
            canvas,
        }
    }

    pub fn root(&self) -> ClipId {
        self.root
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn set_canvas(&mut self, canvas: Canvas) {
        self.canvas = canvas;
    }

    /// Unit resolver for the current root canvas.
    pub fn units(&self) -> Units {
        Units::new(self.canvas)
    }

    pub fn get(&self, id: ClipId) -> Option<&ClipNode> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Borrow a live node.
    ///
    /// Panics when `id` refers to a removed node; ids handed out by this tree stay valid until
    /// the node is removed.
    pub fn node(&self, id: ClipId) -> &ClipNode {
        self.get(id).expect("ClipId refers to a removed node")
    }

    pub(crate) fn node_mut(&mut self, id: ClipId) -> &mut ClipNode {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .expect("ClipId refers to a removed node")
    }

    pub fn find(&self, id: &str) -> Option<ClipId> {
        self.slots
            .iter()
            .enumerate()
            .find(|(_, slot)| slot.as_ref().is_some_and(|n| n.id == id))
            .map(|(i, _)| ClipId(i as u32))
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    pub fn add_child(&mut self, parent: ClipId, node: ClipNode) -> MontageResult<ClipId> {
        let at = self.node(parent).children.len();
        self.insert_child(parent, at, node)
    }

    pub fn insert_child(
        &mut self,
        parent: ClipId,
        index: usize,
        mut node: ClipNode,
    ) -> MontageResult<ClipId> {
        let Some(p) = self.get(parent) else {
            return Err(MontageError::validation("parent node was removed"));
        };
        if node.kind == ClipKind::Root {
            return Err(MontageError::validation("a root node cannot be nested"));
        }
        if !p.kind.accepts_child(node.kind) {
            return Err(MontageError::validation(format!(
                "{}[id={}] cannot have {} children",
                p.kind, p.id, node.kind
            )));
        }
        if self.find(&node.id).is_some() {
            return Err(MontageError::validation(format!(
                "duplicate clip id '{}'",
                node.id
            )));
        }

        let id = ClipId(self.slots.len() as u32);
        node.parent = Some(parent);
        node.children.clear();
        node.timing = None;
        self.slots.push(Some(node));

        let children = &mut self.node_mut(parent).children;
        let index = index.min(children.len());
        children.insert(index, id);
        self.reindex(parent, index);
        Ok(id)
    }

    /// Move an existing child under a new parent, appended last.
    pub(crate) fn reparent(&mut self, id: ClipId, new_parent: ClipId) {
        let from = self.node(id).index;
        if let Some(old) = self.node(id).parent {
            self.node_mut(old).children.retain(|c| *c != id);
            self.reindex(old, from);
        }
        self.node_mut(id).parent = Some(new_parent);
        let children = &mut self.node_mut(new_parent).children;
        children.push(id);
        let last = children.len() - 1;
        self.reindex(new_parent, last);
    }

    /// Detach `id` from its parent and destroy it together with its subtree.
    pub fn remove(&mut self, id: ClipId) -> MontageResult<()> {
        if id == self.root {
            return Err(MontageError::validation("the root node cannot be removed"));
        }
        let Some(node) = self.get(id) else {
            return Err(MontageError::validation("node already removed"));
        };
        let from = node.index;
        if let Some(parent) = node.parent {
            self.node_mut(parent).children.retain(|c| *c != id);
            self.reindex(parent, from);
        }
        self.destroy(id);
        Ok(())
    }

    fn destroy(&mut self, id: ClipId) {
        if let Some(node) = self.slots.get_mut(id.index()).and_then(Option::take) {
            for child in node.children {
                self.destroy(child);
            }
        }
    }

    pub fn set_active(&mut self, id: ClipId, active: bool) {
        self.node_mut(id).active = active;
    }

    /// Mutable access to a node's raw configuration. Cached timing is stale until the next
    /// annotate.
    pub fn conf_mut(&mut self, id: ClipId) -> &mut crate::clip::ClipConf {
        &mut self.node_mut(id).conf
    }

    pub fn set_media_length(&mut self, id: ClipId, length: Option<f64>) {
        self.node_mut(id).media_length = length.filter(|l| l.is_finite() && *l >= 0.0);
    }

    pub fn root_duration(&self) -> f64 {
        self.duration(self.root)
    }

    pub fn set_root_duration(&mut self, secs: f64) {
        let root = self.root;
        self.node_mut(root).derived_duration = Some(round_ms(secs.max(0.0)));
    }

    /// The spine container directly under the root, if any.
    pub fn spine(&self) -> Option<ClipId> {
        self.node(self.root)
            .children
            .iter()
            .copied()
            .find(|c| self.node(*c).kind == ClipKind::Spine)
    }

    /// `id` and all of its ancestors are active.
    pub fn is_live(&self, id: ClipId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            let node = self.node(c);
            if !node.active {
                return false;
            }
            cur = node.parent;
        }
        true
    }

    /// Every descendant of `id`: direct children first, then each child's descendants.
    pub fn all_nodes(&self, id: ClipId) -> Vec<ClipId> {
        let children = &self.node(id).children;
        let mut out = children.clone();
        for child in children {
            out.extend(self.all_nodes(*child));
        }
        out
    }

    fn sibling(&self, id: ClipId, offset: isize) -> Option<ClipId> {
        let node = self.node(id);
        let siblings = &self.node(node.parent?).children;
        let target = node.index.checked_add_signed(offset)?;
        siblings.get(target).copied()
    }

    pub fn prev_sibling(&self, id: ClipId) -> Option<ClipId> {
        self.sibling(id, -1)
    }

    pub fn next_sibling(&self, id: ClipId) -> Option<ClipId> {
        self.sibling(id, 1)
    }

    /// Refresh the cached child positions of `parent` from position `from` on.
    fn reindex(&mut self, parent: ClipId, from: usize) {
        let tail: Vec<ClipId> = self.node(parent).children.iter().skip(from).copied().collect();
        for (i, child) in tail.into_iter().enumerate() {
            self.node_mut(child).index = from + i;
        }
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn duration(&self, id: ClipId) -> f64 {
        Resolver::new(self).duration(id)
    }

    /// Start relative to the parent.
    pub fn start_time(&self, id: ClipId) -> f64 {
        Resolver::new(self).start_time(id)
    }

    /// End relative to the parent, clamped to the parent's duration inside bounded containers.
    pub fn end_time(&self, id: ClipId) -> f64 {
        Resolver::new(self).end_time(id)
    }

    /// End before clamping to a bounded parent.
    pub fn real_end_time(&self, id: ClipId) -> f64 {
        Resolver::new(self).real_end_time(id)
    }

    pub fn abs_start_time(&self, id: ClipId) -> f64 {
        Resolver::new(self).abs_start_time(id)
    }

    pub fn abs_end_time(&self, id: ClipId) -> f64 {
        Resolver::new(self).abs_end_time(id)
    }

    /// Recompute and cache the absolute timing of `id`. Idempotent.
    pub fn annotate(&mut self, id: ClipId) {
        let timing = Resolver::new(self).timing(id);
        self.store_timing(id, timing);
    }

    fn store_timing(&mut self, id: ClipId, timing: ClipTiming) {
        if self.node(id).kind == ClipKind::Transition {
            let z = |c: Option<ClipId>| c.map_or(0, |c| self.node(c).z_index);
            let z_index = z(self.prev_sibling(id)).max(z(self.next_sibling(id))) + 1;
            self.node_mut(id).z_index = z_index;
        }
        self.node_mut(id).timing = Some(timing);
    }

    /// Structural pass: refresh the spine's duration from its children.
    ///
    /// Percentages inside the spine resolve against the spine's previous duration, which is
    /// why the timeline runs this more than once.
    pub fn annotate_structure(&mut self) {
        let Some(spine) = self.spine() else {
            return;
        };
        let mut resolver = Resolver::new(self);
        let span = self
            .node(spine)
            .children
            .iter()
            .map(|c| resolver.end_time(*c))
            .fold(0.0_f64, f64::max);
        self.node_mut(spine).derived_duration = Some(round_ms(span));
    }

    /// Annotate the root and every descendant in tree order.
    ///
    /// One memoized resolver serves the whole pass, so a chain of siblings resolves in linear
    /// time.
    pub fn annotate_all(&mut self) {
        let root = self.root;
        let mut ids = vec![root];
        ids.extend(self.all_nodes(root));
        let mut resolver = Resolver::new(self);
        let timings: Vec<ClipTiming> = ids.iter().map(|id| resolver.timing(*id)).collect();
        for (id, timing) in ids.into_iter().zip(timings) {
            self.store_timing(id, timing);
        }
    }

    /// Depth-first z-order: each node gets `base + counter`, where `base` comes from the
    /// nearest `zIndex` configured on the node or its ancestors (capped at 999, times 1000).
    pub fn assign_z_indices(&mut self) {
        let mut counter = 0;
        self.assign_z_rec(self.root, &mut counter);
    }

    fn assign_z_rec(&mut self, id: ClipId, counter: &mut i64) {
        let parent_base = self.node(id).base_z_index;
        for child in self.node(id).children.clone() {
            let node = self.node_mut(child);
            node.base_z_index = node
                .conf
                .z_index
                .filter(|z| z.is_finite() && *z != 0.0)
                .map(|z| (z.min(MAX_BASE_Z) * 1000.0) as i64)
                .unwrap_or(parent_base);
            node.z_index = node.base_z_index + *counter;
            *counter += 1;
            self.assign_z_rec(child, counter);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clip/tree.rs"]
mod tests;
