//! Projection of decoded updates onto the current snapshot and the history store.
//!
//! Merge policy, per field: present in the update replaces the snapshot field, absent
//! keeps it. A frame that only changes the speed therefore leaves every simulation
//! array exactly as it was.
//!
//! A present reward array replaces the snapshot's rewards as a whole. A `None` entry
//! stays `None` in the snapshot, and history records `0.0` for that tick.

use crate::data::history::TelemetryHistoryStore;
use crate::network::protocol::{Action, EntityState, LandingStatus, SimulationUpdate};
use serde::Serialize;

/// Current state of every entity slot as of the last processed tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationSnapshot {
    /// Local tick counter, 1 after the first update
    pub tick: u64,
    /// Latest state per slot, `None` for slots that never reported one
    pub states: Vec<Option<EntityState>>,
    /// Latest control input per slot
    pub actions: Vec<Action>,
    /// Rewards from the last frame that carried any
    pub rewards: Vec<Option<f64>>,
    /// Landing outcome per slot
    pub landing: Vec<Option<LandingStatus>>,
    /// Episode-finished flag per slot
    pub done: Vec<bool>,
}

impl SimulationSnapshot {
    /// Number of entity slots in the current state array.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.states.len()
    }

    /// Number of slots with a live state.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.states.iter().filter(|s| s.is_some()).count()
    }
}

/// Applies [`SimulationUpdate`]s in arrival order.
///
/// The projector is the single writer of both the snapshot and the history store it
/// was given; everything else reads through [`StateProjector::snapshot`] and
/// [`StateProjector::history`].
#[derive(Debug, Clone, Default)]
pub struct StateProjector {
    snapshot: SimulationSnapshot,
    history: TelemetryHistoryStore,
}

impl StateProjector {
    /// Create a projector writing into `history`.
    #[must_use]
    pub fn new(history: TelemetryHistoryStore) -> Self {
        Self {
            snapshot: SimulationSnapshot::default(),
            history,
        }
    }

    /// Apply one update and return the new tick.
    pub fn apply(&mut self, update: SimulationUpdate) -> u64 {
        self.snapshot.tick += 1;
        let tick = self.snapshot.tick;

        if let Some(states) = &update.states {
            if states.len() != self.snapshot.states.len() {
                self.history.reconcile(states.len());
            }

            for (index, state) in states.iter().enumerate() {
                let Some(state) = state else { continue };
                let reward = update
                    .rewards
                    .as_ref()
                    .and_then(|rewards| rewards.get(index).copied().flatten())
                    .unwrap_or(0.0);
                self.history.record(index, tick, state, reward);
            }
        }

        let SimulationUpdate {
            states,
            actions,
            rewards,
            landing,
            done,
        } = update;

        if let Some(states) = states {
            self.snapshot.states = states;
        }
        if let Some(actions) = actions {
            self.snapshot.actions = actions;
        }
        if let Some(rewards) = rewards {
            self.snapshot.rewards = rewards;
        }
        if let Some(landing) = landing {
            self.snapshot.landing = landing;
        }
        if let Some(done) = done {
            self.snapshot.done = done;
        }

        tracing::trace!(tick, entities = self.snapshot.entity_count(), "Projected update");
        tick
    }

    /// Clear history and restart the tick counter. The snapshot arrays are kept until
    /// the next update replaces them.
    pub fn reset(&mut self) {
        self.history.clear();
        self.snapshot.tick = 0;
        tracing::debug!("History cleared");
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &SimulationSnapshot {
        &self.snapshot
    }

    /// History written by this projector.
    #[must_use]
    pub fn history(&self) -> &TelemetryHistoryStore {
        &self.history
    }

    /// Current tick.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.snapshot.tick
    }
}
