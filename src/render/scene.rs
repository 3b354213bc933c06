use crate::clip::{ClipConf, ClipId, ClipKind, ClipTree};
use crate::foundation::core::{Canvas, FrameIndex, TimeWindow};
use crate::foundation::error::{MontageError, MontageResult};

/// Drawable node frozen out of an annotated [`ClipTree`].
#[derive(Clone, Debug, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub kind: ClipKind,
    pub z_index: i64,
    pub draw: TimeWindow,
    pub show: TimeWindow,
    pub conf: ClipConf,
    /// Intersection of the ancestors' draw windows.
    scope: TimeWindow,
}

/// Immutable view of the drawable nodes, shared by frame producers.
///
/// Producers only read the snapshot, so frames can be rendered in any order and on any thread.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneSnapshot {
    canvas: Canvas,
    layers: Vec<LayerSpec>,
}

/// One layer at a given instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Layer<'a> {
    pub spec: &'a LayerSpec,
    /// Inside the show window; otherwise the layer is only drawn for an adjoining transition.
    pub visible: bool,
    /// Position within the layer's window, `0.0..=1.0`.
    pub progress: f64,
}

/// Everything a renderer needs for one frame. Layers are sorted by z-index.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameState<'a> {
    pub index: FrameIndex,
    pub time: f64,
    pub canvas: Canvas,
    pub layers: Vec<Layer<'a>>,
}

impl SceneSnapshot {
    /// Collect the active drawable nodes. Containers and audio are structural only; an inactive
    /// node hides its whole subtree.
    pub fn from_tree(tree: &ClipTree) -> MontageResult<Self> {
        let mut layers = Vec::new();
        let root = tree.root();
        let mut stack: Vec<(ClipId, TimeWindow)> = tree
            .node(root)
            .children()
            .iter()
            .rev()
            .map(|c| (*c, TimeWindow::new(0.0, f64::INFINITY)))
            .collect();

        while let Some((id, scope)) = stack.pop() {
            let node = tree.node(id);
            if !node.active() {
                continue;
            }
            let timing = node.timing().ok_or_else(|| {
                MontageError::state(format!(
                    "{}[id={}] has no timing; annotate the timeline first",
                    node.kind(),
                    node.id()
                ))
            })?;

            if !node.kind().is_container() && node.kind() != ClipKind::Audio {
                layers.push(LayerSpec {
                    id: node.id().to_string(),
                    kind: node.kind(),
                    z_index: node.z_index(),
                    draw: timing.draw,
                    show: timing.show,
                    conf: node.conf().clone(),
                    scope,
                });
            }

            let inner = TimeWindow::new(
                scope.start.max(timing.draw.start),
                scope.end.min(timing.draw.end),
            );
            for child in node.children().iter().rev() {
                stack.push((*child, inner));
            }
        }

        layers.sort_by_key(|l| l.z_index);
        Ok(Self {
            canvas: tree.canvas(),
            layers,
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    /// Layers drawn at `time` (seconds).
    pub fn frame_state(&self, index: FrameIndex, time: f64) -> FrameState<'_> {
        let layers = self
            .layers
            .iter()
            .filter(|l| l.scope.contains(time) && l.draw.contains(time))
            .map(|spec| {
                let window = if spec.kind == ClipKind::Transition {
                    spec.draw
                } else {
                    spec.show
                };
                let progress = if window.is_empty() {
                    1.0
                } else {
                    ((time - window.start) / window.len()).clamp(0.0, 1.0)
                };
                Layer {
                    spec,
                    visible: spec.show.contains(time),
                    progress,
                }
            })
            .collect();

        FrameState {
            index,
            time,
            canvas: self.canvas,
            layers,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/scene.rs"]
mod tests;
