use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::Serialize;

/// Resource usage reported on completion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub elapsed_ms: u64,
    pub frames: u64,
    /// Produced frames per wall-clock second.
    pub fps: f64,
}

/// Lifecycle notifications of a render task, in emission order.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RenderEvent {
    Start,
    Preloading {
        loaded: f64,
        total: usize,
        id: String,
    },
    #[serde(rename = "prepareMaterial")]
    PrepareMaterial {
        prepared: usize,
        total: usize,
        id: String,
    },
    LoadedMetadata {
        duration: f64,
        width: u32,
        height: u32,
    },
    CanPlay,
    Play,
    Playing {
        #[serde(rename = "currentTime")]
        current_time: f64,
    },
    TimeUpdate {
        #[serde(rename = "currentTime")]
        current_time: f64,
        total: f64,
    },
    Seeking {
        time: f64,
    },
    Seeked {
        #[serde(rename = "currentTime")]
        current_time: f64,
    },
    Pause {
        #[serde(rename = "currentTime")]
        current_time: f64,
    },
    Ended,
    Progress {
        percent: f64,
    },
    Complete {
        result: Option<PathBuf>,
        #[serde(rename = "useage")]
        usage: Usage,
    },
    Error {
        error: String,
        pos: String,
    },
}

impl RenderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Preloading { .. } => "preloading",
            Self::PrepareMaterial { .. } => "prepareMaterial",
            Self::LoadedMetadata { .. } => "loadedmetadata",
            Self::CanPlay => "canplay",
            Self::Play => "play",
            Self::Playing { .. } => "playing",
            Self::TimeUpdate { .. } => "timeupdate",
            Self::Seeking { .. } => "seeking",
            Self::Seeked { .. } => "seeked",
            Self::Pause { .. } => "pause",
            Self::Ended => "ended",
            Self::Progress { .. } => "progress",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

type Listener = Arc<dyn Fn(&RenderEvent) + Send + Sync>;

/// Synchronous fan-out of [`RenderEvent`]s. Clones share the listener list.
#[derive(Clone, Default)]
pub struct EventEmitter {
    listeners: Arc<RwLock<Vec<Listener>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, listener: impl Fn(&RenderEvent) + Send + Sync + 'static) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(Arc::new(listener));
        }
    }

    pub fn emit(&self, event: RenderEvent) {
        tracing::trace!(event = event.name(), "emit");
        // Snapshot so listeners may register further listeners.
        let listeners: Vec<Listener> = match self.listeners.read() {
            Ok(l) => l.clone(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn remove_all_listeners(&self) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.clear();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().map(|l| l.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
