//! Small rectangle-painting model shared by unit tests.

use super::{Cell, CellModel, Frame, FrameParams, Image, Lineage, Node, Rendering};
use rand::Rng;

/// Paints every cell as an axis-aligned box of intensity 1.
pub(crate) struct BoxModel;

impl CellModel for BoxModel {
    fn render(&self, cells: &[Cell], params: &FrameParams, real: &Image, _z: f64) -> Rendering {
        let (w, h) = real.shape();
        let background = params.background_offset as f32;
        let mut synth = Image::filled(w, h, background);
        let mut cell_map = Image::new(w, h);
        for cell in cells {
            let [cx, cy, _] = cell.position;
            let cx = cx + params.camera_shift[0];
            let cy = cy + params.camera_shift[1];
            for y in 0..h {
                for x in 0..w {
                    let inside = ((x as f64 + 0.5) - cx).abs() <= cell.length / 2.0
                        && ((y as f64 + 0.5) - cy).abs() <= cell.width / 2.0;
                    if inside {
                        synth.set(x, y, 1.0 + background);
                        cell_map.set(x, y, 1.0);
                    }
                }
            }
        }
        Rendering {
            synth,
            cell_map,
            dist_map: Image::new(w, h),
        }
    }

    fn perturb<R: Rng>(&self, cell: &Cell, rng: &mut R) -> Cell {
        let mut next = cell.clone();
        next.position[0] += rng.random_range(-1.0..1.0);
        next.position[1] += rng.random_range(-1.0..1.0);
        next.length = (next.length + rng.random_range(-1.0..1.0)).max(1.0);
        next
    }

    fn split<R: Rng>(&self, cell: &Cell, _rng: &mut R) -> Option<(Cell, Cell)> {
        let half = cell.length / 2.0;
        let [x, y, z] = cell.position;
        let a = Cell::new(format!("{}0", cell.name), [x - half / 2.0, y, z], half, cell.width);
        let b = Cell::new(format!("{}1", cell.name), [x + half / 2.0, y, z], half, cell.width);
        Some((a, b))
    }

    fn combine(&self, a: &Cell, b: &Cell) -> Option<Cell> {
        let [ax, ay, az] = a.position;
        let [bx, by, bz] = b.position;
        Some(Cell::new(
            a.name.clone(),
            [(ax + bx) / 2.0, (ay + by) / 2.0, (az + bz) / 2.0],
            a.length + b.length,
            a.width.max(b.width),
        ))
    }
}

/// Builds a rendered lineage of `frames` frames, each holding
/// `cells` cells chained to the previous frame, on a 24x12 canvas.
///
/// Real images are rendered from slightly shifted cells so the initial
/// fit is imperfect.
pub(crate) fn box_lineage(frames: usize, cells: usize) -> Lineage {
    let model = BoxModel;
    let truth: Vec<Cell> = (0..cells)
        .map(|i| Cell::new(format!("t{i}"), [4.0 + 8.0 * i as f64, 6.0, 0.0], 6.0, 3.0))
        .collect();
    let canvas = Image::new(24, 12);
    let real = model
        .render(&truth, &FrameParams::default(), &canvas, 0.0)
        .synth;

    let frames = (0..frames)
        .map(|f| {
            let nodes = (0..cells)
                .map(|i| {
                    let cell = Cell::new(
                        format!("c{i}"),
                        [5.0 + 8.0 * i as f64, 6.5, 0.0],
                        5.0,
                        3.0,
                    );
                    Node::new(cell, (f > 0).then_some(i))
                })
                .collect();
            Frame::new(vec![real.clone()]).with_nodes(nodes)
        })
        .collect();

    let mut lineage = Lineage::new(frames, vec![0.0]);
    lineage.render_all(&model);
    lineage
}
