use serde::{Deserialize, Serialize};

use crate::clip::expr::TimeExpr;
use crate::foundation::core::TimeWindow;

/// Closed set of clip node kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    /// Tree root; owns canvas size and total duration.
    Root,
    /// Structural sequential container whose duration follows its children.
    Spine,
    /// Bounded container: children are clamped to its duration.
    Scene,
    /// Unbounded container.
    Group,
    Image,
    Text,
    Graphic,
    Video,
    Gif,
    Audio,
    #[serde(rename = "trans", alias = "transition")]
    Transition,
}

impl ClipKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ClipKind::Root => "root",
            ClipKind::Spine => "spine",
            ClipKind::Scene => "scene",
            ClipKind::Group => "group",
            ClipKind::Image => "image",
            ClipKind::Text => "text",
            ClipKind::Graphic => "graphic",
            ClipKind::Video => "video",
            ClipKind::Gif => "gif",
            ClipKind::Audio => "audio",
            ClipKind::Transition => "trans",
        }
    }

    pub fn is_container(self) -> bool {
        matches!(
            self,
            ClipKind::Root | ClipKind::Spine | ClipKind::Scene | ClipKind::Group
        )
    }

    /// Whether a node of this kind may own a `child` node. Videos carry their extracted audio.
    pub fn accepts_child(self, child: ClipKind) -> bool {
        child != ClipKind::Root
            && (self.is_container() || (self == ClipKind::Video && child == ClipKind::Audio))
    }

    /// Children of a bounded container end no later than the container itself.
    pub fn is_bounded(self) -> bool {
        matches!(self, ClipKind::Scene)
    }

    /// Kinds whose natural duration comes from their material.
    pub fn is_media(self) -> bool {
        matches!(self, ClipKind::Video | ClipKind::Gif | ClipKind::Audio)
    }

    /// Visual media that can extend the timeline past the spine.
    pub fn extends_timeline(self) -> bool {
        matches!(self, ClipKind::Video | ClipKind::Gif)
    }

    pub(crate) fn default_loop(self) -> bool {
        matches!(self, ClipKind::Gif)
    }
}

impl std::fmt::Display for ClipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw per-node configuration as authored in the scene.
///
/// Unknown keys are kept in `extra` so drawing collaborators can read them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipConf {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<TimeExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<TimeExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<TimeExpr>,
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub looping: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<f64>,
    /// Additional load attempts after the first failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Source offset (seconds) where media playback begins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ss: Option<f64>,
    /// Source offset (seconds) where media playback ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_in: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_out: Option<f64>,
    /// Video only: extract and mix the source's audio stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ClipConf {
    pub fn with_start(mut self, e: impl Into<TimeExpr>) -> Self {
        self.start = Some(e.into());
        self
    }

    pub fn with_end(mut self, e: impl Into<TimeExpr>) -> Self {
        self.end = Some(e.into());
        self
    }

    pub fn with_duration(mut self, e: impl Into<TimeExpr>) -> Self {
        self.duration = Some(e.into());
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = Some(looping);
        self
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    /// JSON snapshot used in error reports.
    pub fn snapshot(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Resolved timing of one node, cached by `annotate`.
///
/// Relative values are in the parent's time space, `abs_*` values in timeline space. All values
/// are rounded to milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipTiming {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub abs_start: f64,
    pub abs_end: f64,
    /// Window during which the node is rendered (may reach into adjoining transitions).
    pub draw: TimeWindow,
    /// Window during which the node is composited.
    pub show: TimeWindow,
}

/// A clip tree node.
#[derive(Clone, Debug)]
pub struct ClipNode {
    pub(crate) id: String,
    pub(crate) kind: ClipKind,
    pub(crate) conf: ClipConf,
    pub(crate) active: bool,
    pub(crate) parent: Option<super::ClipId>,
    pub(crate) children: Vec<super::ClipId>,
    /// Position in the parent's child list.
    pub(crate) index: usize,
    pub(crate) z_index: i64,
    pub(crate) base_z_index: i64,
    /// Playable length reported by the node's material, when known.
    pub(crate) media_length: Option<f64>,
    /// Duration cached by the structural pass (root and spine only).
    pub(crate) derived_duration: Option<f64>,
    pub(crate) timing: Option<ClipTiming>,
}

impl ClipNode {
    pub fn new(kind: ClipKind, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            conf: ClipConf::default(),
            active: true,
            parent: None,
            children: Vec::new(),
            index: 0,
            z_index: 0,
            base_z_index: 0,
            media_length: None,
            derived_duration: None,
            timing: None,
        }
    }

    pub fn with_conf(mut self, conf: ClipConf) -> Self {
        self.conf = conf;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ClipKind {
        self.kind
    }

    pub fn conf(&self) -> &ClipConf {
        &self.conf
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn z_index(&self) -> i64 {
        self.z_index
    }

    pub fn parent(&self) -> Option<super::ClipId> {
        self.parent
    }

    pub fn children(&self) -> &[super::ClipId] {
        &self.children
    }

    /// Timing cached by the last `annotate`, if any.
    pub fn timing(&self) -> Option<&ClipTiming> {
        self.timing.as_ref()
    }

    pub fn media_length(&self) -> Option<f64> {
        self.media_length
    }

    pub fn looping(&self) -> bool {
        self.conf.looping.unwrap_or(self.kind.default_loop())
    }

    /// Retry budget for resource loading.
    pub fn retry(&self) -> u32 {
        self.conf.retry.unwrap_or(1)
    }
}
