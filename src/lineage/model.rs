//! Cell model trait: rendering, scoring and edit geometry.

use super::types::{Cell, FrameParams, Image, Rendering, SliceView};
use rand::Rng;

/// Domain model that renders cells and scores renderings.
///
/// The annealer never looks at pixels itself. It asks the model to
/// render candidate frames, to score them against the real image, and
/// to propose new geometry for each kind of edit.
///
/// # Minimization
///
/// Lower [`objective`](CellModel::objective) is better.
pub trait CellModel: Send + Sync {
    /// Renders `cells` into one z-slice shaped like `real`.
    fn render(&self, cells: &[Cell], params: &FrameParams, real: &Image, z: f64) -> Rendering;

    /// Mismatch between a real slice and its synthetic counterpart.
    ///
    /// Defaults to the sum of squared pixel differences.
    fn objective(&self, slice: SliceView<'_>) -> f64 {
        slice
            .real
            .pixels()
            .iter()
            .zip(slice.synth.pixels())
            .map(|(&r, &s)| {
                let d = f64::from(r) - f64::from(s);
                d * d
            })
            .sum()
    }

    /// Whether a cell fits inside an image of `shape = (width, height)`.
    fn is_valid_cell(&self, cell: &Cell, shape: (usize, usize)) -> bool {
        let [x, y, _] = cell.position;
        cell.length.is_finite()
            && cell.width.is_finite()
            && cell.length > 0.0
            && cell.width > 0.0
            && x >= 0.0
            && y >= 0.0
            && x < shape.0 as f64
            && y < shape.1 as f64
    }

    /// Proposes a small geometric perturbation of `cell`.
    fn perturb<R: Rng>(&self, cell: &Cell, rng: &mut R) -> Cell;

    /// Proposes two daughters for `cell`, or `None` if it cannot divide.
    fn split<R: Rng>(&self, cell: &Cell, rng: &mut R) -> Option<(Cell, Cell)>;

    /// Proposes a single cell replacing two siblings.
    fn combine(&self, _a: &Cell, _b: &Cell) -> Option<Cell> {
        None
    }

    /// Proposes a background luminosity offset delta.
    fn background_offset<R: Rng>(&self, rng: &mut R) -> f64 {
        rng.random_range(-0.05..0.05)
    }

    /// Proposes `(opacity, diffraction)` offset deltas.
    fn opacity_diffraction_offset<R: Rng>(&self, rng: &mut R) -> (f64, f64) {
        (rng.random_range(-0.05..0.05), rng.random_range(-0.05..0.05))
    }

    /// Proposes a camera shift delta in pixels.
    fn camera_shift<R: Rng>(&self, rng: &mut R) -> [f64; 2] {
        [rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)]
    }
}
