//! Callbacks fired on circuit breaker events.

use crate::state::{State, Transition};
use parking_lot::RwLock;
use std::sync::Arc;

type HookFn = Arc<dyn Fn() + Send + Sync + 'static>;
type TransitionHookFn = Arc<dyn Fn(Transition) + Send + Sync + 'static>;

#[derive(Default)]
struct Hooks {
    on_transition: Option<TransitionHookFn>,
    on_open: Option<HookFn>,
    on_close: Option<HookFn>,
    on_half_open: Option<HookFn>,
    on_success: Option<HookFn>,
    on_failure: Option<HookFn>,
    on_rejected: Option<HookFn>,
}

/// A registry for circuit breaker event hooks.
///
/// Hooks run on the thread that caused the event, after the breaker has
/// released its lock, so they may call back into the breaker.
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<Hooks>,
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hook called for every state transition.
    pub fn set_on_transition<F>(&self, f: F)
    where
        F: Fn(Transition) + Send + Sync + 'static,
    {
        self.hooks.write().on_transition = Some(Arc::new(f));
    }

    /// Sets the hook to call when the circuit opens.
    pub fn set_on_open<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.write().on_open = Some(Arc::new(f));
    }

    /// Sets the hook to call when the circuit closes.
    pub fn set_on_close<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.write().on_close = Some(Arc::new(f));
    }

    /// Sets the hook to call when the circuit half-opens.
    pub fn set_on_half_open<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.write().on_half_open = Some(Arc::new(f));
    }

    /// Sets the hook to call when a success is recorded.
    pub fn set_on_success<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.write().on_success = Some(Arc::new(f));
    }

    /// Sets the hook to call when a failure is recorded.
    pub fn set_on_failure<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.write().on_failure = Some(Arc::new(f));
    }

    /// Sets the hook to call when a request is rejected.
    pub fn set_on_rejected<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.write().on_rejected = Some(Arc::new(f));
    }

    pub(crate) fn execute_transition_hooks(&self, transition: Transition) {
        // Clone out of the lock so a hook can register hooks.
        let (general, specific) = {
            let hooks = self.hooks.read();
            let specific = match transition.to {
                State::Open => hooks.on_open.clone(),
                State::Closed => hooks.on_close.clone(),
                State::HalfOpen => hooks.on_half_open.clone(),
            };
            (hooks.on_transition.clone(), specific)
        };
        if let Some(hook) = general {
            hook(transition);
        }
        if let Some(hook) = specific {
            hook();
        }
    }

    pub(crate) fn execute_success_hook(&self) {
        let hook = self.hooks.read().on_success.clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    pub(crate) fn execute_failure_hook(&self) {
        let hook = self.hooks.read().on_failure.clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    pub(crate) fn execute_rejected_hook(&self) {
        let hook = self.hooks.read().on_rejected.clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn transition_runs_general_and_specific_hooks() {
        let registry = HookRegistry::new();
        let opened = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let counter = Arc::clone(&opened);
        registry.set_on_open(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let log = Arc::clone(&seen);
        registry.set_on_transition(move |t| log.lock().push(t));

        let trip = Transition {
            from: State::Closed,
            to: State::Open,
        };
        registry.execute_transition_hooks(trip);
        registry.execute_transition_hooks(Transition {
            from: State::Open,
            to: State::HalfOpen,
        });

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(seen.lock()[0], trip);
    }

    #[test]
    fn missing_hooks_are_skipped() {
        let registry = HookRegistry::new();
        registry.execute_success_hook();
        registry.execute_failure_hook();
        registry.execute_rejected_hook();
    }
}
