//! Error types for annealing runs.

use thiserror::Error;

/// Errors surfaced by the annealing engine.
///
/// Every variant is raised before the shared lineage is mutated, except
/// [`AnnealError::BatchFailed`], which aborts only the batch it names.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnnealError {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A named option is not recognised.
    #[error("unknown configuration option `{0}`")]
    UnknownOption(String),

    /// Edit-kind probabilities cannot be normalized into a distribution.
    #[error("edit probabilities are not a valid distribution: {0}")]
    InvalidProbabilities(String),

    /// The batch strategy name is not one of the supported strategies.
    #[error("strategy must be one of \"best-wins\", \"worst-wins\", \"extreme-wins\", got \"{0}\"")]
    UnknownStrategy(String),

    /// The strategy is recognised but has no selection rule yet.
    #[error("strategy \"{0}\" has no defined selection rule")]
    UndefinedStrategy(String),

    /// The window is empty or lies outside the lineage.
    #[error("invalid window [{start}, {end}) for lineage of {frames} frames")]
    InvalidWindow {
        start: usize,
        end: usize,
        frames: usize,
    },

    /// A frame's image stacks do not hold one image per z-slice.
    #[error("frame {frame} holds {depth} images per stack, expected {z_slices}")]
    DepthMismatch {
        frame: usize,
        depth: usize,
        z_slices: usize,
    },

    /// A frame inside the window has no nodes to propose edits on.
    #[error("frame {0} has no nodes")]
    EmptyFrame(usize),

    /// The worker pool for a distributed run could not be started.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    /// No worker of a batch finished before the deadline.
    #[error("batch {batch} produced no surviving worker")]
    BatchFailed { batch: usize },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AnnealError>;
