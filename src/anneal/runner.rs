//! Core annealing loop.

use super::acceptance::AcceptanceEvaluator;
use super::config::AnnealConfig;
use super::proposal::{Proposal, Proposer};
use super::schedule::TemperatureSchedule;
use super::types::{RunStats, Window};
use super::window::total_iterations;
use crate::change::ChangeKind;
use crate::error::Result;
use crate::lineage::{CellModel, Lineage};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};

/// Parameters of one core run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreRun {
    pub window: Window,

    /// Global iteration index to start from.
    pub current_iteration: usize,

    /// Iterations to perform at most. `usize::MAX` runs to the budget.
    pub batch_size: usize,

    /// Budget of the whole window run, used for temperature progress.
    pub total_iterations: usize,

    pub schedule: TemperatureSchedule,

    /// The lineage is a detached slice of the window.
    pub offset: bool,
}

impl CoreRun {
    /// A run over the whole budget on the shared lineage.
    pub fn full(window: Window, total_iterations: usize, schedule: TemperatureSchedule) -> Self {
        Self {
            window,
            current_iteration: 0,
            batch_size: usize::MAX,
            total_iterations,
            schedule,
            offset: false,
        }
    }

    pub fn with_offset(mut self, offset: bool) -> Self {
        self.offset = offset;
        self
    }

    /// Whether this run pins temperature and tracks pbad.
    pub fn calibrating(&self) -> bool {
        matches!(self.schedule, TemperatureSchedule::Constant(_))
    }
}

/// Result of a core run.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreOutcome {
    pub stats: RunStats,
    /// pbad estimate for calibration runs.
    pub pbad: Option<f64>,
}

/// Executes the core annealing loop.
pub struct AnnealRunner;

impl AnnealRunner {
    /// Runs iterations `[current, min(current + batch, total))` on `lineage`.
    ///
    /// Every iteration consumes budget, whether or not an edit reaches
    /// the Metropolis step. Accepted edits are applied to `lineage` in
    /// place. When a split or combination changes the number of cells,
    /// the budget is re-derived from the new density.
    ///
    /// # Errors
    /// Invalid configuration or window; both are checked before the first
    /// iteration.
    pub fn run_core<M: CellModel, R: Rng>(
        lineage: &mut Lineage,
        model: &M,
        config: &AnnealConfig,
        run: CoreRun,
        rng: &mut R,
    ) -> Result<CoreOutcome> {
        Self::run_core_with_cancel(lineage, model, config, run, rng, None)
    }

    /// Like [`run_core`](Self::run_core), with an optional cancellation
    /// token checked at each iteration boundary.
    pub fn run_core_with_cancel<M: CellModel, R: Rng>(
        lineage: &mut Lineage,
        model: &M,
        config: &AnnealConfig,
        run: CoreRun,
        rng: &mut R,
        cancel: Option<&AtomicBool>,
    ) -> Result<CoreOutcome> {
        config.validate()?;
        run.window.check(lineage, run.offset)?;
        let proposer = Proposer::new(config)?;
        let mut evaluator = if run.calibrating() {
            AcceptanceEvaluator::calibrating(config.pbad_max_size)
        } else {
            AcceptanceEvaluator::new()
        };

        let window = run.window;
        let range = window.frame_range(run.offset);

        let mut stats = RunStats::default();
        let mut current = run.current_iteration;
        let mut total = run.total_iterations;
        let run_end = |total: usize| run.current_iteration.saturating_add(run.batch_size).min(total);
        let mut end = run_end(total);

        while current < end {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                stats.cancelled = true;
                break;
            }

            let proposal = proposer.propose(lineage, model, window, run.offset, rng);
            let progress = current as f64 / total as f64;
            let temperature = run
                .schedule
                .temperature(window, proposal.frame(), run.offset, progress);
            stats.final_temperature = temperature;

            match proposal {
                Proposal::Dormant { .. } => stats.dormant += 1,
                Proposal::Ineligible { .. } => stats.ineligible += 1,
                Proposal::Built(change) if !change.is_valid(model, lineage) => stats.invalid += 1,
                Proposal::Built(change) => {
                    stats.proposed += 1;
                    let decision = evaluator.evaluate(&change, model, lineage, temperature, rng);
                    if decision.accepted {
                        let kind = change.kind();
                        stats.accepted += 1;
                        stats.accepted_by_kind[kind.index()] += 1;
                        if decision.costdiff < 0.0 {
                            stats.improving += 1;
                        }
                        stats.cost_delta += decision.costdiff;
                        change.apply(model, lineage);

                        if matches!(kind, ChangeKind::Split | ChangeKind::Combination) {
                            let cells = lineage.count_cells_in(range.start, range.end);
                            total = total_iterations(config.iterations_per_cell, cells, window.len());
                            end = run_end(total);
                        }
                    }
                }
            }

            current += 1;
            stats.iterations += 1;

            log::trace!(
                "window [{}, {}) iter {}/{} temp {:.6} pbad_total {:.6} pbad_count {} cost {:.6}",
                window.start,
                window.end,
                current,
                total,
                temperature,
                evaluator.tracker().map_or(0.0, |t| t.total()),
                evaluator.tracker().map_or(0, |t| t.seen().min(t.capacity())),
                stats.cost_delta,
            );
        }

        stats.end_iteration = current;
        stats.total_iterations = total;
        Ok(CoreOutcome {
            pbad: evaluator.pbad(),
            stats,
        })
    }
}
