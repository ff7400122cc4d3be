//! The shared readiness-state table.
//!
//! One entry per resource, each backed by a [`tokio::sync::watch`] channel so
//! control tasks can await a predecessor's state without polling. Every write
//! is a compare-and-set: exactly one writer can move a resource out of a given
//! state, and each accepted move is appended to that resource's history.

use chrono::{DateTime, Utc};
use conductor_core::ResourceName;
use conductor_model::WaitCondition;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::error::ExecutionError;
use crate::state::ResourceState;
use crate::transition::validate_transition;

/// What a watcher sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateView {
    /// The current state.
    pub state: ResourceState,
    /// The resource's control task has finished deciding its outcome.
    pub settled: bool,
}

/// One accepted state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// State before.
    pub from: ResourceState,
    /// State after.
    pub to: ResourceState,
    /// When the change was recorded.
    pub at: DateTime<Utc>,
}

/// How a wait gate stands right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// The predecessor has met the condition at some point.
    Satisfied,
    /// Not yet decided.
    Open,
    /// The predecessor is in a state that rules the condition out.
    Foreclosed(ResourceState),
    /// The predecessor settled without ever leaving `Pending`.
    Stalled,
}

#[derive(Debug)]
struct Entry {
    tx: watch::Sender<StateView>,
    history: Mutex<Vec<Transition>>,
}

impl Entry {
    fn new() -> Self {
        let (tx, _) = watch::channel(StateView {
            state: ResourceState::Pending,
            settled: false,
        });
        Self {
            tx,
            history: Mutex::new(Vec::new()),
        }
    }
}

/// Readiness state of every resource in one run.
#[derive(Debug)]
pub struct StateTable {
    entries: IndexMap<ResourceName, Entry>,
}

impl StateTable {
    /// A table with every resource `Pending`.
    pub fn new(names: impl IntoIterator<Item = ResourceName>) -> Self {
        Self {
            entries: names.into_iter().map(|name| (name, Entry::new())).collect(),
        }
    }

    fn entry(&self, name: &str) -> Result<&Entry, ExecutionError> {
        self.entries
            .get(name)
            .ok_or_else(|| ExecutionError::UnknownResource(name.to_owned()))
    }

    /// Tracked resources, in graph-insertion order.
    pub fn names(&self) -> impl Iterator<Item = &ResourceName> {
        self.entries.keys()
    }

    /// The current state of `name`.
    pub fn state(&self, name: &str) -> Result<ResourceState, ExecutionError> {
        Ok(self.entry(name)?.tx.borrow().state)
    }

    /// The current view of `name`.
    pub fn view(&self, name: &str) -> Result<StateView, ExecutionError> {
        Ok(*self.entry(name)?.tx.borrow())
    }

    /// A receiver notified on every change to `name`.
    pub fn subscribe(&self, name: &str) -> Result<watch::Receiver<StateView>, ExecutionError> {
        Ok(self.entry(name)?.tx.subscribe())
    }

    /// Move `name` from `expected` to `next`.
    ///
    /// Fails with [`ExecutionError::StateConflict`] if another writer got
    /// there first, and with [`ExecutionError::InvalidTransition`] if the
    /// move is not legal.
    pub fn compare_and_set(
        &self,
        name: &str,
        expected: ResourceState,
        next: ResourceState,
    ) -> Result<(), ExecutionError> {
        validate_transition(name, expected, next)?;
        let entry = self.entry(name)?;
        let mut actual = expected;
        let applied = entry.tx.send_if_modified(|view| {
            if view.state != expected {
                actual = view.state;
                return false;
            }
            view.state = next;
            entry.history.lock().push(Transition {
                from: expected,
                to: next,
                at: Utc::now(),
            });
            true
        });
        if applied {
            debug!(resource = name, from = %expected, to = %next, "state changed");
            Ok(())
        } else {
            Err(ExecutionError::StateConflict {
                resource: name.to_owned(),
                expected,
                actual,
            })
        }
    }

    /// Move `name` from whatever it is now to `next`.
    pub fn transition(&self, name: &str, next: ResourceState) -> Result<(), ExecutionError> {
        let current = self.state(name)?;
        self.compare_and_set(name, current, next)
    }

    /// Record that `name`'s control task has decided its outcome.
    pub fn mark_settled(&self, name: &str) -> Result<(), ExecutionError> {
        self.entry(name)?.tx.send_if_modified(|view| {
            let changed = !view.settled;
            view.settled = true;
            changed
        });
        Ok(())
    }

    /// Every accepted change of `name`, oldest first.
    pub fn history(&self, name: &str) -> Result<Vec<Transition>, ExecutionError> {
        Ok(self.entry(name)?.history.lock().clone())
    }

    /// Returns `true` if `name` is in, or has passed through, a state that
    /// meets `condition`.
    pub fn has_reached(&self, name: &str, condition: WaitCondition) -> Result<bool, ExecutionError> {
        let entry = self.entry(name)?;
        if entry.tx.borrow().state.satisfies(condition) {
            return Ok(true);
        }
        Ok(entry
            .history
            .lock()
            .iter()
            .any(|transition| transition.to.satisfies(condition)))
    }

    /// Evaluate one wait gate against `name`.
    pub fn gate(&self, name: &str, condition: WaitCondition) -> Result<Gate, ExecutionError> {
        if self.has_reached(name, condition)? {
            return Ok(Gate::Satisfied);
        }
        let view = self.view(name)?;
        if view.state.forecloses(condition) {
            Ok(Gate::Foreclosed(view.state))
        } else if view.settled && view.state == ResourceState::Pending {
            Ok(Gate::Stalled)
        } else {
            Ok(Gate::Open)
        }
    }

    /// Current state of every resource.
    pub fn states(&self) -> IndexMap<ResourceName, ResourceState> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.tx.borrow().state))
            .collect()
    }
}
