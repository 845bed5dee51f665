//! In-process intersection observer.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

use crate::domain::entities::{ElementId, Rect, Viewport};
use crate::domain::ports::VisibilityPort;

struct Registration {
    bounds: Rect,
    margin: u32,
    notify: oneshot::Sender<()>,
}

struct ObserverState {
    viewport: Viewport,
    registrations: HashMap<ElementId, Registration>,
}

impl ObserverState {
    /// Fires and drops every registration near the viewport.
    fn fire_near(&mut self) -> usize {
        let viewport = self.viewport;
        self.registrations
            .retain(|_, reg| !reg.notify.is_closed());

        let near: Vec<ElementId> = self
            .registrations
            .iter()
            .filter(|(_, reg)| viewport.is_near(&reg.bounds, reg.margin))
            .map(|(id, _)| *id)
            .collect();

        near.iter().filter(|id| self.fire(**id)).count()
    }

    fn fire(&mut self, id: ElementId) -> bool {
        match self.registrations.remove(&id) {
            Some(reg) => {
                trace!(element = %id, "Element near viewport");
                reg.notify.send(()).is_ok()
            }
            None => false,
        }
    }
}

/// Tracks element bounds against a viewport and fires one-shot notifications
/// when an element comes within its margin.
///
/// Bounds are in viewport coordinates; scrolling shifts every tracked element.
pub struct ViewportObserver {
    state: Mutex<ObserverState>,
}

impl ViewportObserver {
    /// Creates an observer for `viewport`.
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            state: Mutex::new(ObserverState {
                viewport,
                registrations: HashMap::new(),
            }),
        }
    }

    /// Current viewport.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.state.lock().viewport
    }

    /// Resizes the viewport. Returns how many registrations fired.
    pub fn set_viewport(&self, viewport: Viewport) -> usize {
        let mut state = self.state.lock();
        state.viewport = viewport;
        state.fire_near()
    }

    /// Scrolls the page down by `dy` pixels (negative scrolls up).
    /// Returns how many registrations fired.
    pub fn scroll_by(&self, dy: f64) -> usize {
        let mut state = self.state.lock();
        for reg in state.registrations.values_mut() {
            reg.bounds.y -= dy;
        }
        state.fire_near()
    }

    /// Moves one element after a layout change. Returns true if it fired.
    pub fn move_element(&self, target: ElementId, bounds: Rect) -> bool {
        let mut state = self.state.lock();
        let viewport = state.viewport;
        let near = match state.registrations.get_mut(&target) {
            Some(reg) => {
                reg.bounds = bounds;
                viewport.is_near(&bounds, reg.margin)
            }
            None => return false,
        };
        near && state.fire(target)
    }

    /// Fires a registration regardless of geometry. Returns true if it fired.
    pub fn notify_visible(&self, target: ElementId) -> bool {
        self.state.lock().fire(target)
    }

    /// Number of registrations still waiting.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().registrations.len()
    }
}

impl Default for ViewportObserver {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

impl std::fmt::Debug for ViewportObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportObserver")
            .field("viewport", &self.viewport())
            .field("pending", &self.pending())
            .finish()
    }
}

impl VisibilityPort for ViewportObserver {
    fn observe(&self, target: ElementId, bounds: Rect, margin: u32) -> oneshot::Receiver<()> {
        let (notify, rx) = oneshot::channel();
        let mut state = self.state.lock();

        if state.viewport.is_near(&bounds, margin) {
            let _ = notify.send(());
            return rx;
        }

        trace!(element = %target, margin, "Observing element");
        state.registrations.insert(
            target,
            Registration {
                bounds,
                margin,
                notify,
            },
        );
        rx
    }

    fn unobserve(&self, target: ElementId) {
        if self.state.lock().registrations.remove(&target).is_some() {
            trace!(element = %target, "Stopped observing element");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot::error::TryRecvError;

    fn below_fold() -> Rect {
        Rect::new(0.0, 2000.0, 300.0, 400.0)
    }

    #[test]
    fn test_fires_immediately_when_near() {
        let observer = ViewportObserver::new(Viewport::new(1000.0, 800.0));
        let mut rx = observer.observe(ElementId::new(), Rect::new(0.0, 900.0, 10.0, 10.0), 200);

        assert_eq!(rx.try_recv(), Ok(()));
        assert_eq!(observer.pending(), 0);
    }

    #[test]
    fn test_scroll_fires_once() {
        let observer = ViewportObserver::new(Viewport::new(1000.0, 800.0));
        let mut rx = observer.observe(ElementId::new(), below_fold(), 400);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        assert_eq!(observer.scroll_by(500.0), 0);
        assert_eq!(observer.scroll_by(400.0), 1);
        assert_eq!(rx.try_recv(), Ok(()));

        assert_eq!(observer.scroll_by(100.0), 0);
        assert_eq!(observer.pending(), 0);
    }

    #[test]
    fn test_unobserve_releases_registration() {
        let observer = ViewportObserver::new(Viewport::new(1000.0, 800.0));
        let id = ElementId::new();
        let mut rx = observer.observe(id, below_fold(), 100);
        assert_eq!(observer.pending(), 1);

        observer.unobserve(id);

        assert_eq!(observer.pending(), 0);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
        assert!(!observer.notify_visible(id));
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let observer = ViewportObserver::new(Viewport::new(1000.0, 800.0));
        drop(observer.observe(ElementId::new(), below_fold(), 100));

        observer.scroll_by(1.0);
        assert_eq!(observer.pending(), 0);
    }

    #[test]
    fn test_move_element_and_resize() {
        let observer = ViewportObserver::new(Viewport::new(1000.0, 800.0));
        let a = ElementId::new();
        let b = ElementId::new();
        let mut rx_a = observer.observe(a, below_fold(), 0);
        let mut rx_b = observer.observe(b, below_fold(), 0);

        assert!(observer.move_element(a, Rect::new(0.0, 10.0, 10.0, 10.0)));
        assert_eq!(rx_a.try_recv(), Ok(()));

        assert_eq!(observer.set_viewport(Viewport::new(1000.0, 2500.0)), 1);
        assert_eq!(rx_b.try_recv(), Ok(()));
    }
}
