//! Window bounds and run statistics.

use crate::change::ChangeKind;
use crate::error::{AnnealError, Result};
use crate::lineage::Lineage;

/// Half-open range of frames `[start, end)` optimized together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this is the first window of the lineage.
    pub fn is_first(&self) -> bool {
        self.start == 0
    }

    /// Frame range inside a lineage: absolute, or relative to a detached slice.
    pub fn frame_range(&self, offset: bool) -> std::ops::Range<usize> {
        if offset {
            0..self.len()
        } else {
            self.start..self.end
        }
    }

    /// Checks the window against `lineage` (absolute, or a detached slice
    /// when `offset` is set): non-empty, in bounds, every frame populated
    /// and holding one image per z-slice in each stack.
    pub fn check(&self, lineage: &Lineage, offset: bool) -> Result<()> {
        let range = self.frame_range(offset);
        if self.is_empty() || range.end > lineage.len() {
            return Err(AnnealError::InvalidWindow {
                start: self.start,
                end: self.end,
                frames: lineage.len(),
            });
        }
        let z_slices = lineage.z_slices().len();
        for index in range {
            let frame = lineage.frame(index);
            let absolute = if offset { index + self.start } else { index };
            if frame.nodes.is_empty() {
                return Err(AnnealError::EmptyFrame(absolute));
            }
            if !frame.stacks.has_depth(z_slices) {
                return Err(AnnealError::DepthMismatch {
                    frame: absolute,
                    depth: frame.stacks.depth(),
                    z_slices,
                });
            }
        }
        Ok(())
    }
}

/// Per-run counters and accumulated cost.
///
/// Each run owns its statistics; nothing is shared between runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    /// Iterations consumed, including no-op iterations.
    pub iterations: usize,

    /// Iterations that hit a dormant cell.
    pub dormant: usize,

    /// Iterations whose drawn kind failed its eligibility gate.
    pub ineligible: usize,

    /// Edits that failed their validity check.
    pub invalid: usize,

    /// Edits that reached the Metropolis step.
    pub proposed: usize,

    /// Accepted edits.
    pub accepted: usize,

    /// Accepted edits that lowered cost.
    pub improving: usize,

    /// Accepted edits per kind, in [`ChangeKind::ALL`] order.
    pub accepted_by_kind: [usize; 6],

    /// Sum of the normalized cost deltas of accepted edits.
    pub cost_delta: f64,

    /// Temperature at the last iteration.
    pub final_temperature: f64,

    /// Global iteration index the run stopped at.
    pub end_iteration: usize,

    /// Iteration budget at the end of the run, after density updates.
    pub total_iterations: usize,

    /// Whether the run was cancelled before finishing its batch.
    pub cancelled: bool,
}

impl RunStats {
    pub fn accepted_of(&self, kind: ChangeKind) -> usize {
        self.accepted_by_kind[kind.index()]
    }

    /// Folds counters from a later run into this one.
    pub fn merge(&mut self, other: &RunStats) {
        self.iterations += other.iterations;
        self.dormant += other.dormant;
        self.ineligible += other.ineligible;
        self.invalid += other.invalid;
        self.proposed += other.proposed;
        self.accepted += other.accepted;
        self.improving += other.improving;
        for (a, b) in self.accepted_by_kind.iter_mut().zip(other.accepted_by_kind) {
            *a += b;
        }
        self.cost_delta += other.cost_delta;
        self.final_temperature = other.final_temperature;
        self.end_iteration = other.end_iteration;
        self.total_iterations = other.total_iterations;
        self.cancelled |= other.cancelled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::testing::box_lineage;
    use crate::lineage::{Frame, Image};

    #[test]
    fn test_frame_range() {
        let w = Window::new(3, 7);
        assert_eq!(w.len(), 4);
        assert_eq!(w.frame_range(false), 3..7);
        assert_eq!(w.frame_range(true), 0..4);
        assert!(!w.is_first());
    }

    #[test]
    fn test_check_rejects_bad_windows() {
        let lineage = box_lineage(3, 1);
        assert!(Window::new(0, 3).check(&lineage, false).is_ok());
        assert!(matches!(
            Window::new(2, 2).check(&lineage, false),
            Err(AnnealError::InvalidWindow { .. })
        ));
        assert!(Window::new(1, 5).check(&lineage, false).is_err());
    }

    #[test]
    fn test_check_rejects_empty_frame() {
        let mut frames = box_lineage(2, 1).frames().to_vec();
        frames.push(Frame::new(vec![Image::new(24, 12)]));
        let lineage = Lineage::new(frames, vec![0.0]);
        assert_eq!(
            Window::new(0, 3).check(&lineage, false),
            Err(AnnealError::EmptyFrame(2))
        );
    }

    #[test]
    fn test_check_rejects_depth_mismatch() {
        let lineage = Lineage::new(box_lineage(2, 1).frames().to_vec(), vec![0.0, 1.0]);
        assert_eq!(
            Window::new(0, 2).check(&lineage, false),
            Err(AnnealError::DepthMismatch {
                frame: 0,
                depth: 1,
                z_slices: 2,
            })
        );
        assert_eq!(
            Window::new(1, 2).check(&lineage.detach(1, 2), true),
            Err(AnnealError::DepthMismatch {
                frame: 1,
                depth: 1,
                z_slices: 2,
            })
        );
    }

    #[test]
    fn test_merge_stats() {
        let mut a = RunStats {
            iterations: 3,
            accepted: 1,
            ..RunStats::default()
        };
        a.accepted_by_kind[1] = 1;
        let mut b = RunStats {
            iterations: 2,
            accepted: 2,
            end_iteration: 5,
            ..RunStats::default()
        };
        b.accepted_by_kind[1] = 2;
        a.merge(&b);
        assert_eq!(a.iterations, 5);
        assert_eq!(a.accepted_of(ChangeKind::Perturbation), 3);
        assert_eq!(a.end_iteration, 5);
    }
}
