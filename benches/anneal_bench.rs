//! Criterion benchmarks for the annealing engine.
//!
//! Uses a synthetic disc model on small canvases to measure engine
//! overhead (proposal, scoring, acceptance) independent of any real
//! microscopy renderer.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lineage_anneal::anneal::{AnnealConfig, Mode, Window, WindowScheduler};
use lineage_anneal::lineage::{Cell, CellModel, Frame, FrameParams, Image, Lineage, Node, Rendering};
use rand::Rng;

// ===========================================================================
// Disc model: every cell paints a filled disc of diameter `length`
// ===========================================================================

struct DiscModel;

impl CellModel for DiscModel {
    fn render(&self, cells: &[Cell], params: &FrameParams, real: &Image, _z: f64) -> Rendering {
        let (w, h) = real.shape();
        let mut synth = Image::filled(w, h, params.background_offset as f32);
        let mut cell_map = Image::new(w, h);
        for cell in cells {
            let [cx, cy, _] = cell.position;
            let r2 = (cell.length / 2.0).powi(2);
            for y in 0..h {
                for x in 0..w {
                    let dx = x as f64 + 0.5 - cx;
                    let dy = y as f64 + 0.5 - cy;
                    if dx * dx + dy * dy <= r2 {
                        synth.set(x, y, 1.0);
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
        next
    }

    fn split<R: Rng>(&self, _cell: &Cell, _rng: &mut R) -> Option<(Cell, Cell)> {
        None
    }
}

fn disc_lineage(frames: usize, cells: usize) -> Lineage {
    let model = DiscModel;
    let size = 16 * cells.max(1);
    let truth: Vec<Cell> = (0..cells)
        .map(|i| Cell::new(format!("t{i}"), [8.0 + 16.0 * i as f64, 8.0, 0.0], 10.0, 10.0))
        .collect();
    let real = model
        .render(&truth, &FrameParams::default(), &Image::new(size, 16), 0.0)
        .synth;
    let frames = (0..frames)
        .map(|f| {
            let nodes = (0..cells)
                .map(|i| {
                    let cell = Cell::new(format!("c{i}"), [9.5 + 16.0 * i as f64, 9.0, 0.0], 10.0, 10.0);
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

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_anneal_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("anneal_window");
    group.sample_size(10);

    for cells in [1usize, 4, 8] {
        let lineage = disc_lineage(5, cells);
        let config = AnnealConfig::default().with_iterations_per_cell(50).with_seed(42);
        group.bench_with_input(BenchmarkId::from_parameter(cells), &lineage, |b, lineage| {
            let model = DiscModel;
            let scheduler = WindowScheduler::new(&model, &config);
            b.iter(|| {
                let mut lineage = lineage.clone();
                let outcome = scheduler.optimize(&mut lineage, black_box(Window::new(0, 5)), Mode::Anneal);
                black_box(outcome)
            })
        });
    }
    group.finish();
}

fn bench_calibration(c: &mut Criterion) {
    let mut group = c.benchmark_group("calibration");
    group.sample_size(10);

    let lineage = disc_lineage(5, 4);
    let config = AnnealConfig::default().with_iterations_per_cell(50).with_seed(7);
    for temperature in [0.1f64, 1.0, 10.0] {
        group.bench_with_input(
            BenchmarkId::from_parameter(temperature),
            &temperature,
            |b, &temperature| {
                let model = DiscModel;
                let scheduler = WindowScheduler::new(&model, &config);
                b.iter(|| {
                    let mut lineage = lineage.clone();
                    let outcome = scheduler.optimize(&mut lineage, Window::new(0, 5), Mode::Calibrate { temperature });
                    black_box(outcome)
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_anneal_window, bench_calibration);
criterion_main!(benches);
