//! Renderer hand-off.
//!
//! The poller never calls the renderer itself. It publishes batches on
//! a `watch` channel and [`spawn_overlay_dispatch`] applies them on a
//! separate task, so a slow renderer only ever sees the most recent
//! batch.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::message::DetectionBatch;

/// Something that draws detection boxes.
pub trait OverlayRenderer: Send + 'static {
    /// Remove every box currently shown.
    fn clear(&mut self);

    /// Replace whatever is shown with `batch`.
    fn show(&mut self, batch: DetectionBatch);
}

impl<R: OverlayRenderer + ?Sized> OverlayRenderer for Box<R> {
    fn clear(&mut self) {
        (**self).clear();
    }

    fn show(&mut self, batch: DetectionBatch) {
        (**self).show(batch);
    }
}

/// Feed `renderer` from `batches` until the publishing side is dropped.
///
/// Empty batches become [`OverlayRenderer::clear`]. The renderer is
/// handed back when the task ends.
pub fn spawn_overlay_dispatch<R: OverlayRenderer>(
    mut batches: watch::Receiver<DetectionBatch>,
    mut renderer: R,
) -> JoinHandle<R> {
    tokio::spawn(async move {
        while batches.changed().await.is_ok() {
            let batch = batches.borrow_and_update().clone();
            trace!("rendering {} boxes", batch.len());
            if batch.is_empty() {
                renderer.clear();
            } else {
                renderer.show(batch);
            }
        }
        renderer
    })
}
