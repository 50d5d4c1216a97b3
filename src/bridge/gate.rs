//! Lifecycle gates: liveness predicates sampled at every dispatch.

use std::sync::{Arc, Mutex};

/// Notification sent to gate listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The gate flipped from inactive to active.
    Activated,
    /// The gate reached its terminal state.
    Destroyed,
}

/// Listener registered on a gate; returns false to be removed.
pub type LifecycleListener = Box<dyn Fn(LifecycleEvent) -> bool + Send + Sync>;

/// A liveness predicate supplied by the hosting lifecycle.
///
/// Any `Fn() -> bool` closure is a gate. Gates that can announce activation
/// (like [`Lifecycle`]) override [`LifecycleGate::on_lifecycle`] so bound
/// bridges request a replay when they become active.
pub trait LifecycleGate: Send + Sync {
    /// Sampled fresh at each dispatch attempt.
    fn is_active(&self) -> bool;

    /// Register a listener for activation/destruction. Gates without such
    /// notifications ignore it.
    fn on_lifecycle(&self, listener: LifecycleListener) {
        let _ = listener;
    }
}

impl<F> LifecycleGate for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_active(&self) -> bool {
        self()
    }
}

/// Gate that is always active.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysActive;

impl LifecycleGate for AlwaysActive {
    fn is_active(&self) -> bool {
        true
    }
}

/// State of a [`Lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Inactive,
    Active,
    /// Terminal.
    Destroyed,
}

#[derive(Default)]
struct LifecycleInner {
    state: Mutex<Option<LifecycleState>>,
    listeners: Mutex<Vec<LifecycleListener>>,
}

/// A concrete gate driven by its host: `activate`, `deactivate`, `destroy`.
///
/// Cloning yields another handle to the same lifecycle. Activation notifies
/// listeners after the state flips, so a replay triggered by the listener
/// sees the gate open. Destruction notifies listeners and then clears them.
#[derive(Clone, Default)]
pub struct Lifecycle {
    inner: Arc<LifecycleInner>,
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle").field("state", &self.state()).finish()
    }
}

impl Lifecycle {
    /// A new, inactive lifecycle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A new lifecycle that starts active.
    #[must_use]
    pub fn active() -> Self {
        let lifecycle = Self::new();
        lifecycle.set_state(LifecycleState::Active);
        lifecycle
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.inner
            .state
            .lock()
            .map_or(LifecycleState::Destroyed, |s| s.unwrap_or(LifecycleState::Inactive))
    }

    /// Flip to active; listeners are told only on an actual transition.
    pub fn activate(&self) {
        if self.transition(LifecycleState::Active) {
            self.notify(LifecycleEvent::Activated);
        }
    }

    pub fn deactivate(&self) {
        self.transition(LifecycleState::Inactive);
    }

    /// Enter the terminal state; bound bridges detach.
    pub fn destroy(&self) {
        if self.transition(LifecycleState::Destroyed) {
            self.notify(LifecycleEvent::Destroyed);
            if let Ok(mut listeners) = self.inner.listeners.lock() {
                listeners.clear();
            }
        }
    }

    fn set_state(&self, next: LifecycleState) {
        if let Ok(mut state) = self.inner.state.lock() {
            *state = Some(next);
        }
    }

    /// Returns true if the state changed. Destroyed is never left.
    fn transition(&self, next: LifecycleState) -> bool {
        let Ok(mut state) = self.inner.state.lock() else {
            return false;
        };
        let current = state.unwrap_or(LifecycleState::Inactive);
        if current == next || current == LifecycleState::Destroyed {
            return false;
        }
        *state = Some(next);
        true
    }

    /// Call listeners without holding the lock, keeping those that ask to
    /// stay and any registered meanwhile.
    fn notify(&self, event: LifecycleEvent) {
        let current = match self.inner.listeners.lock() {
            Ok(mut listeners) => std::mem::take(&mut *listeners),
            Err(_) => return,
        };

        let kept: Vec<LifecycleListener> = current.into_iter().filter(|listener| listener(event)).collect();

        if let Ok(mut listeners) = self.inner.listeners.lock() {
            let added = std::mem::replace(&mut *listeners, kept);
            listeners.extend(added);
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().map(|l| l.len()).unwrap_or_default()
    }
}

impl LifecycleGate for Lifecycle {
    fn is_active(&self) -> bool {
        self.state() == LifecycleState::Active
    }

    fn on_lifecycle(&self, listener: LifecycleListener) {
        if self.state() == LifecycleState::Destroyed {
            listener(LifecycleEvent::Destroyed);
            return;
        }
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.push(listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn closure_gate_is_sampled() {
        let open = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&open);
        let gate = move || flag.load(Ordering::SeqCst);
        assert!(!gate.is_active());
        open.store(true, Ordering::SeqCst);
        assert!(gate.is_active());
    }

    #[test]
    fn lifecycle_transitions() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Inactive);
        lifecycle.activate();
        assert!(lifecycle.is_active());
        lifecycle.deactivate();
        assert!(!lifecycle.is_active());
        lifecycle.destroy();
        lifecycle.activate();
        assert_eq!(lifecycle.state(), LifecycleState::Destroyed);
        assert!(Lifecycle::active().is_active());
    }

    #[test]
    fn activation_notifies_only_on_transition() {
        let lifecycle = Lifecycle::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        lifecycle.on_lifecycle(Box::new(move |event| {
            if event == LifecycleEvent::Activated {
                c.fetch_add(1, Ordering::SeqCst);
            }
            true
        }));

        lifecycle.activate();
        lifecycle.activate();
        lifecycle.deactivate();
        lifecycle.activate();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listeners_returning_false_are_dropped() {
        let lifecycle = Lifecycle::new();
        lifecycle.on_lifecycle(Box::new(|_| false));
        lifecycle.on_lifecycle(Box::new(|_| true));
        lifecycle.activate();
        assert_eq!(lifecycle.listener_count(), 1);
    }

    #[test]
    fn destroy_notifies_and_clears() {
        let lifecycle = Lifecycle::active();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&destroyed);
        lifecycle.on_lifecycle(Box::new(move |event| {
            if event == LifecycleEvent::Destroyed {
                d.fetch_add(1, Ordering::SeqCst);
            }
            true
        }));
        lifecycle.destroy();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.listener_count(), 0);

        let late = Arc::clone(&destroyed);
        lifecycle.on_lifecycle(Box::new(move |_| {
            late.fetch_add(1, Ordering::SeqCst);
            true
        }));
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }
}
