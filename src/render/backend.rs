use crate::foundation::error::MontageResult;
use crate::render::frame::FrameBuffer;
use crate::render::scene::FrameState;

/// Draws one frame from a [`FrameState`].
///
/// Implementations must be deterministic per state: the frame stream may render frames out of
/// order, concurrently, and more than once.
pub trait FrameRenderer: Send + Sync {
    fn render_frame(&self, state: &FrameState<'_>) -> MontageResult<FrameBuffer>;
}

impl<F> FrameRenderer for F
where
    F: Fn(&FrameState<'_>) -> MontageResult<FrameBuffer> + Send + Sync,
{
    fn render_frame(&self, state: &FrameState<'_>) -> MontageResult<FrameBuffer> {
        self(state)
    }
}

/// Renderer that clears to a background color and draws nothing else.
#[derive(Clone, Copy, Debug)]
pub struct ClearRenderer {
    pub background: [u8; 4],
}

impl Default for ClearRenderer {
    fn default() -> Self {
        Self {
            background: [0, 0, 0, 255],
        }
    }
}

impl FrameRenderer for ClearRenderer {
    fn render_frame(&self, state: &FrameState<'_>) -> MontageResult<FrameBuffer> {
        Ok(FrameBuffer::filled(
            state.canvas.width,
            state.canvas.height,
            self.background,
        ))
    }
}

/// Receives frames during interactive playback.
pub trait Presenter: Send {
    fn present(&mut self, frame: &FrameBuffer, state: &FrameState<'_>) -> MontageResult<()>;
}
