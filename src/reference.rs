use std::sync::{Arc, Mutex};

use crate::types::Value;

/// Callback fired when the awaited value becomes available.
pub type Action = Box<dyn FnOnce(&Value) + Send>;

/// Deferred value cell for a name still under construction.
///
/// Two states: pending with a list of waiting actions, or resolved with the
/// value. Resolving drains and invokes the actions synchronously in
/// registration order; each action fires at most once.
#[derive(Clone)]
pub struct Reference(Arc<Inner>);

struct Inner {
    name: String,
    state: Mutex<State>,
}

enum State {
    Pending(Vec<Action>),
    Resolved(Value),
}

impl Reference {
    pub fn new(name: impl Into<String>) -> Self {
        Reference(Arc::new(Inner {
            name: name.into(),
            state: Mutex::new(State::Pending(Vec::new())),
        }))
    }

    /// The name this reference is waiting on.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.0.state.lock().unwrap(), State::Resolved(_))
    }

    /// The resolved value, if any.
    pub fn get(&self) -> Option<Value> {
        match &*self.0.state.lock().unwrap() {
            State::Resolved(value) => Some(value.clone()),
            State::Pending(_) => None,
        }
    }

    /// Registers an action; fires immediately when already resolved.
    pub fn on_set(&self, action: Action) {
        let resolved = {
            let mut state = self.0.state.lock().unwrap();
            match &mut *state {
                State::Pending(actions) => {
                    actions.push(action);
                    return;
                }
                State::Resolved(value) => value.clone(),
            }
        };
        // lock dropped before the action runs; actions may inspect other
        // references or this one
        action(&resolved);
    }

    /// Resolves the cell and fires all waiting actions. Resolving twice is
    /// a no-op on the second call.
    pub fn set(&self, value: Value) {
        let actions = {
            let mut state = self.0.state.lock().unwrap();
            match std::mem::replace(&mut *state, State::Resolved(value.clone())) {
                State::Pending(actions) => actions,
                State::Resolved(previous) => {
                    *state = State::Resolved(previous);
                    tracing::warn!(name = %self.0.name, "reference resolved twice; keeping first value");
                    return;
                }
            }
        };
        for action in actions {
            action(&value);
        }
    }
}

impl std::fmt::Debug for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reference")
            .field("name", &self.0.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
