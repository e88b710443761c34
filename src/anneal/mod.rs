//! Windowed simulated annealing over a lineage.
//!
//! A window of frames is optimized by repeatedly proposing an edit
//! ([`Proposer`]), scoring it against the real images and accepting or
//! rejecting it with the Metropolis rule ([`AcceptanceEvaluator`]). The
//! temperature follows a two-level geometric schedule over frame
//! position and run progress ([`TemperatureSchedule`]).
//!
//! [`WindowScheduler`] sizes the budget from cell density and runs a
//! window in one of three modes: a single annealing run, an isolated
//! calibration run at a pinned temperature that reports pbad, or a
//! distributed run of racing worker batches.
//!
//! # References
//!
//! - Metropolis et al. (1953), "Equation of State Calculations by Fast
//!   Computing Machines"
//! - Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by Simulated Annealing"

mod acceptance;
#[cfg(feature = "parallel")]
mod batch;
mod config;
mod proposal;
mod runner;
mod schedule;
mod types;
mod window;

pub use acceptance::{acceptance_probability, AcceptanceEvaluator, Decision, PbadTracker};
#[cfg(feature = "parallel")]
pub use batch::{BatchCoordinator, BatchReport};
pub use config::{AnnealConfig, EditProbabilities, EnabledKinds, Strategy, PROBABILITY_TOLERANCE};
pub use proposal::{split_admission, Proposal, Proposer};
pub use runner::{AnnealRunner, CoreOutcome, CoreRun};
pub use schedule::{gerp, TemperatureSchedule};
pub use types::{RunStats, Window};
pub use window::{total_iterations, Mode, WindowOutcome, WindowScheduler};
