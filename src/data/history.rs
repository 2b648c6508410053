//! Per-entity telemetry history.
//!
//! The store holds one [`EntityHistory`] per entity slot, created lazily the first time
//! a live state is seen in that slot. Each history is a tick-index buffer plus one
//! [`RingBuffer`] per [`Metric`], all with the same capacity and always pushed together,
//! so position `k` of every series refers to the same tick.
//!
//! Slots are positional. If the producer reorders its entities, history silently
//! follows the slot, not the vehicle.

use crate::data::ring_buffer::RingBuffer;
use crate::network::protocol::EntityState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default number of samples retained per metric.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Charted per-entity metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    /// Vertical velocity
    Vy,
    /// Horizontal velocity
    Vx,
    /// Vertical acceleration
    Ay,
    /// Horizontal acceleration
    Ax,
    /// Attitude angle
    Angle,
    /// Angular velocity
    AngularVelocity,
    /// Angular acceleration
    AngularAcceleration,
    /// Derived speed, `hypot(vx, vy)`
    Speed,
    /// Per-tick reward, `0` when the entity reported none
    Reward,
}

impl Metric {
    /// Number of metrics.
    pub const COUNT: usize = 9;

    /// Every metric, in storage order.
    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::Vy,
        Metric::Vx,
        Metric::Ay,
        Metric::Ax,
        Metric::Angle,
        Metric::AngularVelocity,
        Metric::AngularAcceleration,
        Metric::Speed,
        Metric::Reward,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Read this metric from a state. `Reward` is not part of the state and reads `None`.
    #[must_use]
    pub fn sample(self, state: &EntityState) -> Option<f64> {
        match self {
            Metric::Vy => Some(state.vy),
            Metric::Vx => Some(state.vx),
            Metric::Ay => Some(state.ay),
            Metric::Ax => Some(state.ax),
            Metric::Angle => Some(state.angle),
            Metric::AngularVelocity => Some(state.angular_velocity),
            Metric::AngularAcceleration => Some(state.angular_acceleration),
            Metric::Speed => Some(state.speed),
            Metric::Reward => None,
        }
    }

    /// Key used by chart consumers.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Metric::Vy => "vy",
            Metric::Vx => "vx",
            Metric::Ay => "ay",
            Metric::Ax => "ax",
            Metric::Angle => "angle",
            Metric::AngularVelocity => "angularVelocity",
            Metric::AngularAcceleration => "angularAcceleration",
            Metric::Speed => "speed",
            Metric::Reward => "reward",
        }
    }
}

/// History buffers of one entity slot.
#[derive(Debug, Clone)]
pub struct EntityHistory {
    ticks: RingBuffer<f64>,
    series: [RingBuffer<f64>; Metric::COUNT],
}

impl EntityHistory {
    fn new(capacity: usize) -> Self {
        Self {
            ticks: RingBuffer::new(capacity),
            series: std::array::from_fn(|_| RingBuffer::new(capacity)),
        }
    }

    fn record(&mut self, tick: u64, state: &EntityState, reward: f64) {
        // Precision loss only past 2^53 ticks.
        self.ticks.push(tick as f64);
        for metric in Metric::ALL {
            let value = metric.sample(state).unwrap_or(reward);
            self.series[metric.index()].push(value);
        }
    }

    fn clear(&mut self) {
        self.ticks.clear();
        for buffer in &mut self.series {
            buffer.clear();
        }
    }

    /// Tick indices, oldest first.
    #[must_use]
    pub fn ticks(&self) -> Vec<f64> {
        self.ticks.to_vec()
    }

    /// One metric's samples, oldest first, aligned with [`EntityHistory::ticks`].
    #[must_use]
    pub fn series(&self, metric: Metric) -> Vec<f64> {
        self.series[metric.index()].to_vec()
    }

    /// Direct access to a metric's buffer.
    #[must_use]
    pub fn buffer(&self, metric: Metric) -> &RingBuffer<f64> {
        &self.series[metric.index()]
    }

    /// Number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    /// Returns true if no samples are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

/// All entity histories, keyed by slot index.
///
/// Owned by the projector, which is its only writer. Readers borrow it immutably.
#[derive(Debug, Clone)]
pub struct TelemetryHistoryStore {
    capacity: usize,
    entities: BTreeMap<usize, EntityHistory>,
}

impl Default for TelemetryHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl TelemetryHistoryStore {
    /// Create an empty store whose buffers will each hold `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entities: BTreeMap::new(),
        }
    }

    /// Record one tick for one slot, creating its buffers on first sighting.
    pub fn record(&mut self, index: usize, tick: u64, state: &EntityState, reward: f64) {
        let capacity = self.capacity;
        self.entities
            .entry(index)
            .or_insert_with(|| {
                tracing::debug!(index, capacity, "Allocating history for new entity slot");
                EntityHistory::new(capacity)
            })
            .record(tick, state, reward);
    }

    /// Drop histories of slots that no longer exist after the entity count changed.
    ///
    /// Slots below `entity_count` keep their buffers untouched so that index `i` keeps
    /// pointing at the same history.
    pub fn reconcile(&mut self, entity_count: usize) {
        let removed = self.entities.split_off(&entity_count);
        if !removed.is_empty() {
            tracing::debug!(
                entity_count,
                dropped = removed.len(),
                "Entity count shrank, dropped stale histories"
            );
        }
    }

    /// Empty every buffer without releasing it.
    pub fn clear(&mut self) {
        for history in self.entities.values_mut() {
            history.clear();
        }
    }

    /// History of one slot, if it was ever seen.
    #[must_use]
    pub fn entity(&self, index: usize) -> Option<&EntityHistory> {
        self.entities.get(&index)
    }

    /// Iterate over `(slot, history)` in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &EntityHistory)> {
        self.entities.iter().map(|(index, history)| (*index, history))
    }

    /// Number of slots with allocated history.
    #[must_use]
    pub fn tracked_entities(&self) -> usize {
        self.entities.len()
    }

    /// Samples retained per metric.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
