//! Randomized edit proposal.
//!
//! Each iteration draws a frame, a node in that frame, and an edit kind.
//! A kind that fails its eligibility gate produces nothing for that
//! iteration; the proposer never re-draws.

use super::config::{AnnealConfig, EditProbabilities, EnabledKinds};
use super::types::Window;
use crate::change::{Change, ChangeKind};
use crate::error::Result;
use crate::lineage::{CellModel, Lineage};
use rand::Rng;
use std::f64::consts::FRAC_PI_2;

/// Probability that a cell of `length` is admitted for a split.
///
/// Zero at or below `min`, one at or above `max`, and a quarter sine
/// wave in between.
pub fn split_admission(length: f64, min: f64, max: f64) -> f64 {
    if length <= min {
        0.0
    } else if length >= max {
        1.0
    } else {
        (FRAC_PI_2 * (length - min) / (max - min)).sin()
    }
}

/// Result of one proposal attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    /// The drawn node is dormant.
    Dormant { frame: usize },
    /// The drawn kind failed its gate.
    Ineligible { frame: usize, kind: ChangeKind },
    /// An edit ready for validation and scoring.
    Built(Change),
}

impl Proposal {
    /// Frame drawn for this iteration.
    pub fn frame(&self) -> usize {
        match self {
            Proposal::Dormant { frame } | Proposal::Ineligible { frame, .. } => *frame,
            Proposal::Built(change) => change.frame_index(),
        }
    }
}

/// Draws frames, nodes and edit kinds.
#[derive(Debug, Clone)]
pub struct Proposer {
    cumulative: [f64; 6],
    enabled: EnabledKinds,
    min_length: f64,
    max_length: f64,
}

impl Proposer {
    /// Builds a proposer, normalizing the configured probabilities.
    ///
    /// # Errors
    /// Probabilities that cannot be normalized.
    pub fn new(config: &AnnealConfig) -> Result<Self> {
        let (probabilities, _) = config.probabilities.normalized()?;
        Ok(Self {
            cumulative: cumulative(&probabilities),
            enabled: config.enabled,
            min_length: config.min_length,
            max_length: config.max_length,
        })
    }

    /// Categorical draw over [`ChangeKind::ALL`].
    pub fn draw_kind<R: Rng>(&self, rng: &mut R) -> ChangeKind {
        let roll: f64 = rng.random();
        let slot = self
            .cumulative
            .iter()
            .position(|&c| roll < c)
            .unwrap_or_else(|| self.last_reachable());
        ChangeKind::ALL[slot]
    }

    /// Last kind with non-zero mass, for rolls lost to rounding.
    fn last_reachable(&self) -> usize {
        let mut prev = 0.0;
        let mut last = 0;
        for (i, &c) in self.cumulative.iter().enumerate() {
            if c > prev {
                last = i;
            }
            prev = c;
        }
        last
    }

    /// Proposes an edit on `lineage` inside `window`.
    ///
    /// With `offset` set, `lineage` is a detached slice of the window and
    /// frame indices are relative to it.
    ///
    /// # Panics
    /// Panics if the window range is empty or the drawn frame has no
    /// nodes; [`Window::check`] rules both out.
    pub fn propose<M: CellModel, R: Rng>(
        &self,
        lineage: &Lineage,
        model: &M,
        window: Window,
        offset: bool,
        rng: &mut R,
    ) -> Proposal {
        let range = window.frame_range(offset);
        let frame = lineage.choose_random_frame_index(range.start, range.end, rng);
        let nodes = &lineage.frame(frame).nodes;
        let node = rng.random_range(0..nodes.len());
        let cell = &nodes[node].cell;
        if cell.dormant {
            return Proposal::Dormant { frame };
        }

        let kind = self.draw_kind(rng);
        let ineligible = Proposal::Ineligible { frame, kind };
        if !self.enabled.allows(kind) {
            return ineligible;
        }
        let absolute = if offset { frame + window.start } else { frame };
        if kind.needs_history() && window.is_first() && absolute == 0 {
            return ineligible;
        }

        match kind {
            ChangeKind::Split => {
                let admission = split_admission(cell.length, self.min_length, self.max_length);
                if rng.random::<f64>() >= admission {
                    return ineligible;
                }
                match model.split(cell, rng) {
                    Some(daughters) => Proposal::Built(Change::Split {
                        frame,
                        node,
                        daughters,
                    }),
                    None => ineligible,
                }
            }
            ChangeKind::Perturbation => Proposal::Built(Change::Perturbation {
                frame,
                node,
                cell: model.perturb(cell, rng),
            }),
            ChangeKind::Combination => {
                let parent = nodes[node].parent;
                let sibling = nodes
                    .iter()
                    .enumerate()
                    .find(|&(i, n)| i != node && parent.is_some() && n.parent == parent && !n.cell.dormant);
                let Some((other, sibling)) = sibling else {
                    return ineligible;
                };
                match model.combine(cell, &sibling.cell) {
                    Some(merged) => Proposal::Built(Change::Combination {
                        frame,
                        nodes: (node, other),
                        merged,
                    }),
                    None => ineligible,
                }
            }
            ChangeKind::BackgroundOffset => Proposal::Built(Change::BackgroundOffset {
                frame,
                delta: model.background_offset(rng),
            }),
            ChangeKind::OpacityDiffractionOffset => {
                let (opacity, diffraction) = model.opacity_diffraction_offset(rng);
                Proposal::Built(Change::OpacityDiffractionOffset {
                    frame,
                    opacity,
                    diffraction,
                })
            }
            ChangeKind::CameraShift => Proposal::Built(Change::CameraShift {
                frame,
                shift: model.camera_shift(rng),
            }),
        }
    }
}

fn cumulative(p: &EditProbabilities) -> [f64; 6] {
    let mut acc = 0.0;
    p.as_array().map(|x| {
        acc += x;
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::testing::{box_lineage, BoxModel};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn only(kind: ChangeKind) -> AnnealConfig {
        let mut p = EditProbabilities {
            split: 0.0,
            perturbation: 0.0,
            ..EditProbabilities::default()
        };
        p.set(kind, 1.0);
        AnnealConfig::default()
            .with_probabilities(p)
            .with_enabled(EnabledKinds::all())
            .with_length_bounds(1.0, 2.0)
    }

    #[test]
    fn test_split_admission_bounds() {
        assert_eq!(split_admission(5.0, 10.0, 20.0), 0.0);
        assert_eq!(split_admission(10.0, 10.0, 20.0), 0.0);
        assert_eq!(split_admission(25.0, 10.0, 20.0), 1.0);
        assert!((split_admission(15.0, 10.0, 20.0) - (FRAC_PI_2 / 2.0).sin()).abs() < 1e-12);
        let mut prev = 0.0;
        for i in 0..=100 {
            let p = split_admission(10.0 + i as f64 / 10.0, 10.0, 20.0);
            assert!(p >= prev);
            prev = p;
        }
    }

    #[test]
    fn test_draw_kind_follows_distribution() {
        let probabilities = EditProbabilities {
            split: 0.25,
            perturbation: 0.75,
            ..EditProbabilities::default()
        };
        let proposer = Proposer::new(&AnnealConfig::default().with_probabilities(probabilities)).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let n = 20_000;
        let splits = (0..n)
            .filter(|_| proposer.draw_kind(&mut rng) == ChangeKind::Split)
            .count();
        let rate = splits as f64 / n as f64;
        assert!((rate - 0.25).abs() < 0.02, "rate {rate}");
    }

    #[test]
    fn test_unnormalized_probabilities_are_renormalized() {
        let probabilities = EditProbabilities {
            split: 2.0,
            perturbation: 2.0,
            ..EditProbabilities::default()
        };
        let proposer = Proposer::new(&AnnealConfig::default().with_probabilities(probabilities)).unwrap();
        assert!((proposer.cumulative[5] - 1.0).abs() < 1e-12);
        assert!((proposer.cumulative[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_dormant_node_proposes_nothing() {
        let mut lineage = box_lineage(2, 1);
        for f in 0..2 {
            lineage.frame_mut(f).nodes[0].cell.dormant = true;
        }
        let proposer = Proposer::new(&only(ChangeKind::Perturbation)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let p = proposer.propose(&lineage, &BoxModel, Window::new(0, 2), false, &mut rng);
            assert!(matches!(p, Proposal::Dormant { .. }));
        }
    }

    #[test]
    fn test_split_never_in_first_frame_of_first_window() {
        let lineage = box_lineage(1, 2);
        // length 5 is above max 2, so admission is certain
        let proposer = Proposer::new(&only(ChangeKind::Split)).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..100 {
            let p = proposer.propose(&lineage, &BoxModel, Window::new(0, 1), false, &mut rng);
            assert_eq!(
                p,
                Proposal::Ineligible {
                    frame: 0,
                    kind: ChangeKind::Split
                }
            );
        }
    }

    #[test]
    fn test_split_allowed_in_detached_later_window() {
        let lineage = box_lineage(3, 1).detach(1, 3);
        let proposer = Proposer::new(&only(ChangeKind::Split)).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let p = proposer.propose(&lineage, &BoxModel, Window::new(1, 3), true, &mut rng);
        assert!(matches!(p, Proposal::Built(Change::Split { .. })));
    }

    #[test]
    fn test_disabled_kind_is_ineligible() {
        let lineage = box_lineage(2, 1);
        let config = only(ChangeKind::CameraShift).with_enabled(EnabledKinds::default());
        let proposer = Proposer::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let p = proposer.propose(&lineage, &BoxModel, Window::new(1, 2), false, &mut rng);
        assert_eq!(
            p,
            Proposal::Ineligible {
                frame: 1,
                kind: ChangeKind::CameraShift
            }
        );
    }

    #[test]
    fn test_enabled_offsets_are_built() {
        let lineage = box_lineage(2, 1);
        let mut rng = StdRng::seed_from_u64(4);
        for kind in [
            ChangeKind::BackgroundOffset,
            ChangeKind::OpacityDiffractionOffset,
            ChangeKind::CameraShift,
        ] {
            let proposer = Proposer::new(&only(kind)).unwrap();
            let p = proposer.propose(&lineage, &BoxModel, Window::new(1, 2), false, &mut rng);
            match p {
                Proposal::Built(change) => assert_eq!(change.kind(), kind),
                other => panic!("expected {kind} edit, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_combination_needs_sibling() {
        let lineage = box_lineage(2, 2);
        let proposer = Proposer::new(&only(ChangeKind::Combination)).unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        let p = proposer.propose(&lineage, &BoxModel, Window::new(1, 2), false, &mut rng);
        assert!(matches!(p, Proposal::Ineligible { .. }));
    }
}
