//! Metropolis acceptance and the calibration-mode pbad estimator.

use crate::change::Change;
use crate::lineage::{CellModel, Lineage};
use rand::Rng;

/// Metropolis acceptance probability.
///
/// `1.0` for non-positive `costdiff`; `exp(-costdiff / temperature)`
/// otherwise. A non-positive temperature rejects every uphill move.
pub fn acceptance_probability(costdiff: f64, temperature: f64) -> f64 {
    if costdiff <= 0.0 {
        1.0
    } else if temperature > 0.0 {
        (-costdiff / temperature).exp()
    } else {
        0.0
    }
}

/// Bounded-memory running mean of uphill acceptance probabilities.
///
/// Keeps the most recent `capacity` values in a ring buffer together
/// with their sum. The sum is recomputed from the buffer every time the
/// cursor wraps, so rounding error from evictions never outlives one
/// lap of the ring.
#[derive(Debug, Clone)]
pub struct PbadTracker {
    buffer: Vec<f64>,
    capacity: usize,
    cursor: usize,
    seen: usize,
    total: f64,
}

impl PbadTracker {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pbad capacity must be positive");
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
            seen: 0,
            total: 0.0,
        }
    }

    pub fn record(&mut self, probability: f64) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(probability);
            self.total += probability;
        } else {
            self.total -= self.buffer[self.cursor];
            self.buffer[self.cursor] = probability;
            self.total += probability;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
        self.seen += 1;
        if self.cursor == 0 {
            self.total = self.buffer.iter().sum();
        }
    }

    /// Running sum of the buffered values.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Values recorded so far, including evicted ones.
    pub fn seen(&self) -> usize {
        self.seen
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `total / min(seen, capacity)`, or `None` before the first record.
    pub fn estimate(&self) -> Option<f64> {
        (!self.buffer.is_empty()).then(|| self.total / self.buffer.len() as f64)
    }
}

/// Outcome of one Metropolis step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// Cost delta normalized by the number of z-slices.
    pub costdiff: f64,
    pub probability: f64,
    pub accepted: bool,
}

/// Scores edits and draws the accept/reject decision.
#[derive(Debug, Clone, Default)]
pub struct AcceptanceEvaluator {
    tracker: Option<PbadTracker>,
}

impl AcceptanceEvaluator {
    /// Evaluator for annealing runs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluator that also tracks pbad over the last `capacity` uphill moves.
    pub fn calibrating(capacity: usize) -> Self {
        Self {
            tracker: Some(PbadTracker::new(capacity)),
        }
    }

    /// Scores `change` against the current lineage and decides.
    ///
    /// The lineage is only borrowed; committing an accepted edit is
    /// left to the caller.
    pub fn evaluate<M: CellModel, R: Rng>(
        &mut self,
        change: &Change,
        model: &M,
        lineage: &Lineage,
        temperature: f64,
        rng: &mut R,
    ) -> Decision {
        let depth = lineage.z_slices().len().max(1) as f64;
        let costdiff = change.cost_delta(model, lineage) / depth;
        self.decide(costdiff, temperature, rng)
    }

    /// Metropolis decision for a normalized cost delta.
    ///
    /// A non-finite `costdiff` is rejected and not tracked.
    pub fn decide<R: Rng>(&mut self, costdiff: f64, temperature: f64, rng: &mut R) -> Decision {
        if !costdiff.is_finite() {
            return Decision {
                costdiff,
                probability: 0.0,
                accepted: false,
            };
        }
        let probability = acceptance_probability(costdiff, temperature);
        if costdiff > 0.0 {
            if let Some(tracker) = self.tracker.as_mut() {
                tracker.record(probability);
            }
        }
        let accepted = rng.random::<f64>() < probability;
        Decision {
            costdiff,
            probability,
            accepted,
        }
    }

    pub fn tracker(&self) -> Option<&PbadTracker> {
        self.tracker.as_ref()
    }

    /// Current pbad estimate, if calibrating and any uphill move was seen.
    pub fn pbad(&self) -> Option<f64> {
        self.tracker.as_ref().and_then(PbadTracker::estimate)
    }
}
