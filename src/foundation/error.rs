use crate::session::Phase;

/// Crate result alias.
pub type MontageResult<T> = Result<T, MontageError>;

#[derive(thiserror::Error, Debug)]
pub enum MontageError {
    #[error("validation error: {0}")]
    Validation(String),

    /// An operation was invoked in a phase that does not allow it (for example `play` before
    /// `canplay`).
    #[error("state error: {0}")]
    State(String),

    /// A node's resource failed to load after exhausting its retries.
    #[error(
        "resource load error: {kind}[id={id}] failed after {attempts} attempt(s): {cause}; conf: {conf}"
    )]
    ResourceLoad {
        id: String,
        kind: String,
        attempts: u32,
        conf: String,
        cause: String,
    },

    #[error("material error: {0}")]
    Material(String),

    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Error raised while the orchestrator was in `phase`.
    #[error("{phase} failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<MontageError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MontageError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn material(msg: impl Into<String>) -> Self {
        Self::Material(msg.into())
    }

    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    /// Attach the orchestrator phase. Already-annotated errors are returned unchanged.
    pub fn in_phase(self, phase: Phase) -> Self {
        match self {
            Self::Phase { .. } => self,
            other => Self::Phase {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// The error without its phase annotation.
    pub fn inner(&self) -> &MontageError {
        match self {
            Self::Phase { source, .. } => source.inner(),
            other => other,
        }
    }

    /// Phase the error was raised in, if annotated.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}
