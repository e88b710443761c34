//! Proposed edits to a lineage.
//!
//! A [`Change`] is built for one iteration, scored against the frame's
//! current stacks, and either applied or dropped. Scoring only borrows
//! the lineage, so no mutation can happen before the accept/reject
//! decision is made.

mod kind;

pub use kind::ChangeKind;

use crate::lineage::{Cell, CellModel, Frame, FrameParams, Lineage, Node};

/// A single proposed edit, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Replace the cell of one node.
    Perturbation { frame: usize, node: usize, cell: Cell },

    /// Replace one node by two daughters sharing its parent.
    Split {
        frame: usize,
        node: usize,
        daughters: (Cell, Cell),
    },

    /// Merge two sibling nodes into one.
    Combination {
        frame: usize,
        nodes: (usize, usize),
        merged: Cell,
    },

    /// Shift the frame's background luminosity.
    BackgroundOffset { frame: usize, delta: f64 },

    /// Shift the frame's opacity and diffraction corrections.
    OpacityDiffractionOffset {
        frame: usize,
        opacity: f64,
        diffraction: f64,
    },

    /// Translate the frame's rendering.
    CameraShift { frame: usize, shift: [f64; 2] },
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Perturbation { .. } => ChangeKind::Perturbation,
            Change::Split { .. } => ChangeKind::Split,
            Change::Combination { .. } => ChangeKind::Combination,
            Change::BackgroundOffset { .. } => ChangeKind::BackgroundOffset,
            Change::OpacityDiffractionOffset { .. } => ChangeKind::OpacityDiffractionOffset,
            Change::CameraShift { .. } => ChangeKind::CameraShift,
        }
    }

    /// Index of the frame this edit targets.
    pub fn frame_index(&self) -> usize {
        match *self {
            Change::Perturbation { frame, .. }
            | Change::Split { frame, .. }
            | Change::Combination { frame, .. }
            | Change::BackgroundOffset { frame, .. }
            | Change::OpacityDiffractionOffset { frame, .. }
            | Change::CameraShift { frame, .. } => frame,
        }
    }

    /// Geometric validity against the lineage's image shape.
    pub fn is_valid<M: CellModel>(&self, model: &M, lineage: &Lineage) -> bool {
        let Some(shape) = lineage.image_shape() else {
            return false;
        };
        let Some(frame) = lineage.frames().get(self.frame_index()) else {
            return false;
        };
        let len = frame.nodes.len();

        match self {
            Change::Perturbation { node, cell, .. } => {
                *node < len && model.is_valid_cell(cell, shape)
            }
            Change::Split {
                node, daughters, ..
            } => {
                *node < len
                    && model.is_valid_cell(&daughters.0, shape)
                    && model.is_valid_cell(&daughters.1, shape)
            }
            Change::Combination { nodes, merged, .. } => {
                let (a, b) = *nodes;
                a != b
                    && a < len
                    && b < len
                    && frame.nodes[a].parent.is_some()
                    && frame.nodes[a].parent == frame.nodes[b].parent
                    && model.is_valid_cell(merged, shape)
            }
            Change::BackgroundOffset { delta, .. } => delta.is_finite(),
            Change::OpacityDiffractionOffset {
                opacity,
                diffraction,
                ..
            } => opacity.is_finite() && diffraction.is_finite(),
            Change::CameraShift { shift, .. } => {
                let [dx, dy] = *shift;
                let [sx, sy] = frame.params.camera_shift;
                dx.is_finite()
                    && dy.is_finite()
                    && (sx + dx).abs() < shape.0 as f64
                    && (sy + dy).abs() < shape.1 as f64
            }
        }
    }

    /// Cells and parameters the frame would have after this edit.
    fn preview(&self, frame: &Frame) -> (Vec<Cell>, FrameParams) {
        let mut cells = frame.cells();
        let mut params = frame.params;
        match self {
            Change::Perturbation { node, cell, .. } => {
                cells[*node] = cell.clone();
            }
            Change::Split {
                node, daughters, ..
            } => {
                cells[*node] = daughters.0.clone();
                cells.push(daughters.1.clone());
            }
            Change::Combination { nodes, merged, .. } => {
                let (keep, remove) = ordered(*nodes);
                cells[keep] = merged.clone();
                cells.remove(remove);
            }
            Change::BackgroundOffset { delta, .. } => {
                params.background_offset += delta;
            }
            Change::OpacityDiffractionOffset {
                opacity,
                diffraction,
                ..
            } => {
                params.opacity_offset += opacity;
                params.diffraction_offset += diffraction;
            }
            Change::CameraShift { shift, .. } => {
                params.camera_shift[0] += shift[0];
                params.camera_shift[1] += shift[1];
            }
        }
        (cells, params)
    }

    /// Objective after the edit minus objective now, summed over z-slices.
    ///
    /// Callers normalize by the number of z-slices.
    pub fn cost_delta<M: CellModel>(&self, model: &M, lineage: &Lineage) -> f64 {
        let frame = lineage.frame(self.frame_index());
        let (cells, params) = self.preview(frame);
        lineage
            .z_slices()
            .iter()
            .enumerate()
            .map(|(z_index, &z)| {
                let current = model.objective(frame.stacks.slice(z_index));
                let real = &frame.stacks.real[z_index];
                let rendering = model.render(&cells, &params, real, z);
                model.objective(rendering.view(real)) - current
            })
            .sum()
    }

    /// Commits the edit: updates nodes, links and synthetic stacks.
    pub fn apply<M: CellModel>(self, model: &M, lineage: &mut Lineage) {
        let index = self.frame_index();
        match self {
            Change::Perturbation { node, cell, .. } => {
                lineage.frame_mut(index).nodes[node].cell = cell;
            }
            Change::Split {
                node, daughters, ..
            } => {
                let frame = lineage.frame_mut(index);
                let parent = frame.nodes[node].parent;
                frame.nodes[node].cell = daughters.0;
                frame.nodes.push(Node::new(daughters.1, parent));
                lineage.relink(index);
            }
            Change::Combination { nodes, merged, .. } => {
                let (keep, remove) = ordered(nodes);
                lineage.frame_mut(index).nodes[keep].cell = merged;
                lineage.remove_node(index, remove, keep);
            }
            Change::BackgroundOffset { delta, .. } => {
                lineage.frame_mut(index).params.background_offset += delta;
            }
            Change::OpacityDiffractionOffset {
                opacity,
                diffraction,
                ..
            } => {
                let params = &mut lineage.frame_mut(index).params;
                params.opacity_offset += opacity;
                params.diffraction_offset += diffraction;
            }
            Change::CameraShift { shift, .. } => {
                let params = &mut lineage.frame_mut(index).params;
                params.camera_shift[0] += shift[0];
                params.camera_shift[1] += shift[1];
            }
        }
        lineage.render_frame(model, index);
    }
}

fn ordered((a, b): (usize, usize)) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
