//! Port for viewport proximity notifications.

use tokio::sync::oneshot;

use crate::domain::entities::{ElementId, Rect};

/// A source of one-shot "element is near the viewport" notifications.
///
/// Each registration fires at most once. After firing, or after
/// [`VisibilityPort::unobserve`], the registration is gone.
#[cfg_attr(test, mockall::automock)]
pub trait VisibilityPort: Send + Sync {
    /// Registers `target` at `bounds`; the receiver resolves once the element
    /// comes within `margin` pixels of the viewport.
    fn observe(&self, target: ElementId, bounds: Rect, margin: u32) -> oneshot::Receiver<()>;

    /// Releases a pending registration. Unknown targets are ignored.
    fn unobserve(&self, target: ElementId);
}
