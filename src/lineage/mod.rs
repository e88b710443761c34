//! Lineage data model.
//!
//! A [`Lineage`] is an ordered series of [`Frame`]s. Each frame holds
//! tracked [`Node`]s (cells linked to parents and children in adjacent
//! frames) and per-z-slice image stacks: the real image, the synthetic
//! rendering, a cell map and a distance map.
//!
//! Pixel-level behavior is supplied by a [`CellModel`]: it renders
//! cells, scores renderings, and proposes geometry for edits.

mod model;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use model::CellModel;
pub use types::{Cell, Frame, FrameParams, FrameStacks, Image, Lineage, Node, Rendering, SliceView};
