//! Distributed batch coordinator.
//!
//! The window budget is split into batches. Each batch races `jobs`
//! workers on private copies of the window, waits for them until the
//! batch deadline, and folds exactly one surviving trajectory back in.
//! Workers never share mutable state; results travel over a channel.

use super::config::AnnealConfig;
use super::runner::{AnnealRunner, CoreRun};
use super::schedule::TemperatureSchedule;
use super::types::{RunStats, Window};
use super::window::total_iterations;
use crate::error::{AnnealError, Result};
use crate::lineage::{CellModel, Lineage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Instant;

/// Summary of a distributed window run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Batches executed.
    pub batches: usize,

    /// Workers that finished in time, over all batches.
    pub survivors: usize,

    /// Workers cancelled at a batch deadline, over all batches.
    pub cancelled: usize,

    /// Merged statistics of the winning trajectories.
    pub stats: RunStats,

    /// Window cost after the last batch.
    pub cost: f64,
}

/// A worker trajectory that finished before the deadline.
struct Survivor {
    worker: usize,
    cost: f64,
    lineage: Lineage,
    stats: RunStats,
}

impl Survivor {
    fn finishes_window(&self) -> bool {
        self.stats.end_iteration >= self.stats.total_iterations
    }
}

/// Races batches of workers over a window and keeps one winner per batch.
pub struct BatchCoordinator<'a, M: CellModel> {
    model: &'a M,
    config: &'a AnnealConfig,
}

impl<'a, M: CellModel> BatchCoordinator<'a, M> {
    pub fn new(model: &'a M, config: &'a AnnealConfig) -> Self {
        Self { model, config }
    }

    /// Runs the window in batches and splices the final trajectory back
    /// into `lineage`.
    ///
    /// # Errors
    /// - The strategy has no selection rule, or any other configuration
    ///   error; reported before a worker is dispatched.
    /// - [`AnnealError::BatchFailed`] when no worker of a batch finished
    ///   in time. `lineage` is left as it was before the call.
    pub fn run<R: Rng>(&self, lineage: &mut Lineage, window: Window, rng: &mut R) -> Result<BatchReport> {
        let config = self.config;
        config.strategy.validate()?;
        config.validate()?;
        window.check(lineage, false)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.jobs)
            .build()
            .map_err(|e| AnnealError::WorkerPool(e.to_string()))?;

        let len = window.len();
        let mut detached = lineage.detach(window.start, window.end);
        let mut total = total_iterations(config.iterations_per_cell, detached.count_cells_in(0, len), len);
        let batch_size = (total / config.batches).max(1);
        let schedule = TemperatureSchedule::Annealing {
            start: config.start_temperature,
            end: config.end_temperature,
        };

        let mut report = BatchReport {
            batches: 0,
            survivors: 0,
            cancelled: 0,
            stats: RunStats::default(),
            cost: detached.cost_in(self.model, 0, len),
        };
        let mut current = 0;

        while current < total {
            let batch = report.batches;
            let run = CoreRun {
                window,
                current_iteration: current,
                batch_size,
                total_iterations: total,
                schedule,
                offset: true,
            };
            log::debug!(
                "window [{}, {}) batch {batch}: iterations {current}..{} of {total}, {} workers",
                window.start,
                window.end,
                current.saturating_add(batch_size).min(total),
                config.jobs
            );

            let seeds: Vec<u64> = (0..config.jobs).map(|_| rng.random()).collect();
            let survivors = self.race(&pool, &detached, run, &seeds, batch)?;
            report.survivors += survivors.len();
            report.cancelled += config.jobs - survivors.len();
            if survivors.is_empty() {
                return Err(AnnealError::BatchFailed { batch });
            }

            // a batch is final once any trajectory would close the window,
            // including budgets that shrank during the batch
            let final_batch = survivors.iter().any(Survivor::finishes_window);

            let winner = config
                .strategy
                .select(survivors, final_batch, |s| s.cost)?
                .ok_or(AnnealError::BatchFailed { batch })?;
            log::debug!(
                "batch {batch}: worker {} wins with cost {:.6} ({})",
                winner.worker,
                winner.cost,
                config.strategy.name()
            );

            current = winner.stats.end_iteration;
            report.cost = winner.cost;
            report.stats.merge(&winner.stats);
            report.batches += 1;
            detached = winner.lineage;
            total = total_iterations(config.iterations_per_cell, detached.count_cells_in(0, len), len);
        }

        report.stats.total_iterations = total;
        lineage.splice(window.start, detached);
        Ok(report)
    }

    /// Dispatches one worker per seed and collects those that finish
    /// before the batch deadline, ordered by worker index.
    fn race(
        &self,
        pool: &rayon::ThreadPool,
        detached: &Lineage,
        run: CoreRun,
        seeds: &[u64],
        batch: usize,
    ) -> Result<Vec<Survivor>> {
        let (model, config) = (self.model, self.config);
        let len = run.window.len();
        let cancel: Vec<AtomicBool> = seeds.iter().map(|_| AtomicBool::new(false)).collect();
        let deadline = Instant::now() + config.batch_timeout;
        let mut finished = Vec::with_capacity(seeds.len());

        pool.in_place_scope(|scope| {
            let (tx, rx) = mpsc::channel();
            for (worker, (&seed, flag)) in seeds.iter().zip(&cancel).enumerate() {
                let tx = tx.clone();
                let mut copy = detached.clone();
                scope.spawn(move |_| {
                    let mut rng = StdRng::seed_from_u64(seed);
                    let result = AnnealRunner::run_core_with_cancel(&mut copy, model, config, run, &mut rng, Some(flag))
                        .map(|outcome| Survivor {
                            worker,
                            cost: copy.cost_in(model, 0, len),
                            stats: outcome.stats,
                            lineage: copy,
                        });
                    // the receiver is gone once the deadline has passed
                    let _ = tx.send((worker, result));
                });
            }
            drop(tx);

            while finished.len() < seeds.len() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match rx.recv_timeout(remaining) {
                    Ok(message) => finished.push(message),
                    Err(_) => break,
                }
            }

            for (worker, flag) in cancel.iter().enumerate() {
                if !finished.iter().any(|(w, _)| *w == worker) {
                    log::warn!(
                        "batch {batch}: worker {worker} missed the {:?} deadline and was cancelled",
                        config.batch_timeout
                    );
                }
                flag.store(true, Ordering::Relaxed);
            }
        });

        finished.sort_by_key(|(worker, _)| *worker);
        finished
            .into_iter()
            .map(|(_, result)| result)
            .filter(|result| !matches!(result, Ok(s) if s.stats.cancelled))
            .collect()
    }
}
