//! Simulated-annealing engine for fitting cell lineage models to
//! microscopy time series.
//!
//! - **Lineage**: frames of tracked cells with their real images and the
//!   synthetic renderings they are scored against. Pixel work is
//!   delegated to a [`lineage::CellModel`].
//! - **Change**: the closed set of edits the annealer may propose
//!   (perturbation, split, combination and per-frame offsets).
//! - **Anneal**: proposal, temperature schedule, Metropolis acceptance,
//!   the core loop, window scheduling, calibration and distributed
//!   batch racing.
//!
//! # Architecture
//!
//! The engine owns no pixels and no geometry of its own. Consumers supply
//! a `CellModel` that renders cells and proposes new ones; the engine
//! decides which proposals survive.

pub mod anneal;
pub mod change;
pub mod error;
pub mod lineage;

pub use error::{AnnealError, Result};
