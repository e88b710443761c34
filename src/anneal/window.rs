//! Window-level scheduling: iteration budget, run mode and calibration.

use super::config::AnnealConfig;
use super::runner::{AnnealRunner, CoreRun};
use super::schedule::TemperatureSchedule;
use super::types::{RunStats, Window};
use crate::error::{AnnealError, Result};
use crate::lineage::{CellModel, Lineage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "parallel")]
use super::batch::{BatchCoordinator, BatchReport};

/// Iteration budget for a window: `density * cells / window_len`,
/// truncated.
pub fn total_iterations(iterations_per_cell: usize, cells: usize, window_len: usize) -> usize {
    if window_len == 0 {
        0
    } else {
        iterations_per_cell * cells / window_len
    }
}

/// Seeded RNG, or one seeded from system randomness.
pub(crate) fn create_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::seed_from_u64(rand::random()),
    }
}

/// How a window is run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    /// Single worker over the full budget on the shared lineage.
    Anneal,
    /// Pinned temperature on a private snapshot; reports pbad.
    Calibrate { temperature: f64 },
    /// Batches of racing workers on detached copies.
    Distributed,
}

/// Result of optimizing a window.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    Annealed(RunStats),
    Calibrated { pbad: Option<f64>, stats: RunStats },
    #[cfg(feature = "parallel")]
    Distributed(BatchReport),
}

/// Runs annealing over windows of a lineage.
///
/// # Examples
///
/// ```
/// use lineage_anneal::anneal::{AnnealConfig, Mode, Window, WindowOutcome, WindowScheduler};
/// use lineage_anneal::lineage::{Cell, CellModel, Frame, FrameParams, Image, Lineage, Node, Rendering};
/// use rand::Rng;
///
/// // Marks the pixel under each cell center.
/// struct Dots;
///
/// impl CellModel for Dots {
///     fn render(&self, cells: &[Cell], _params: &FrameParams, real: &Image, _z: f64) -> Rendering {
///         let (w, h) = real.shape();
///         let mut synth = Image::new(w, h);
///         for cell in cells {
///             let [x, y, _] = cell.position;
///             synth.set((x as usize).min(w - 1), (y as usize).min(h - 1), 1.0);
///         }
///         Rendering { cell_map: synth.clone(), synth, dist_map: Image::new(w, h) }
///     }
///
///     fn perturb<R: Rng>(&self, cell: &Cell, rng: &mut R) -> Cell {
///         let mut next = cell.clone();
///         next.position[0] += rng.random_range(-1.0..1.0);
///         next
///     }
///
///     fn split<R: Rng>(&self, _cell: &Cell, _rng: &mut R) -> Option<(Cell, Cell)> {
///         None
///     }
/// }
///
/// let mut real = Image::new(8, 8);
/// real.set(4, 4, 1.0);
/// let frames = (0..3)
///     .map(|f| {
///         let cell = Cell::new("a", [2.5, 4.5, 0.0], 2.0, 1.0);
///         Frame::new(vec![real.clone()]).with_nodes(vec![Node::new(cell, (f > 0).then_some(0))])
///     })
///     .collect();
/// let mut lineage = Lineage::new(frames, vec![0.0]);
/// lineage.render_all(&Dots);
///
/// let config = AnnealConfig::default().with_iterations_per_cell(10).with_seed(1);
/// let scheduler = WindowScheduler::new(&Dots, &config);
/// let outcome = scheduler.optimize(&mut lineage, Window::new(0, 3), Mode::Anneal)?;
/// match outcome {
///     WindowOutcome::Annealed(stats) => assert_eq!(stats.iterations, 10),
///     _ => unreachable!(),
/// }
/// # Ok::<(), lineage_anneal::AnnealError>(())
/// ```
pub struct WindowScheduler<'a, M: CellModel> {
    model: &'a M,
    config: &'a AnnealConfig,
}

impl<'a, M: CellModel> WindowScheduler<'a, M> {
    pub fn new(model: &'a M, config: &'a AnnealConfig) -> Self {
        Self { model, config }
    }

    /// Budget for `window` at the lineage's current cell density.
    pub fn budget(&self, lineage: &Lineage, window: Window) -> usize {
        total_iterations(
            self.config.iterations_per_cell,
            lineage.count_cells_in(window.start, window.end),
            window.len(),
        )
    }

    /// Optimizes `window` in the given mode with an RNG seeded from the
    /// configuration.
    pub fn optimize(&self, lineage: &mut Lineage, window: Window, mode: Mode) -> Result<WindowOutcome> {
        let mut rng = create_rng(self.config.seed);
        self.optimize_with_rng(lineage, window, mode, &mut rng)
    }

    pub fn optimize_with_rng<R: Rng>(
        &self,
        lineage: &mut Lineage,
        window: Window,
        mode: Mode,
        rng: &mut R,
    ) -> Result<WindowOutcome> {
        match mode {
            Mode::Anneal => self.anneal(lineage, window, rng).map(WindowOutcome::Annealed),
            Mode::Calibrate { temperature } => {
                let (pbad, stats) = self.calibrate(lineage, window, temperature, rng)?;
                Ok(WindowOutcome::Calibrated { pbad, stats })
            }
            Mode::Distributed => self.distributed(lineage, window, rng),
        }
    }

    /// Single-worker run of the full budget on the shared lineage.
    pub fn anneal<R: Rng>(&self, lineage: &mut Lineage, window: Window, rng: &mut R) -> Result<RunStats> {
        self.config.validate()?;
        window.check(lineage, false)?;
        let total = self.budget(lineage, window);
        log::debug!(
            "annealing window [{}, {}): {} cells, {} iterations",
            window.start,
            window.end,
            lineage.count_cells_in(window.start, window.end),
            total
        );

        let schedule = TemperatureSchedule::Annealing {
            start: self.config.start_temperature,
            end: self.config.end_temperature,
        };
        let outcome = AnnealRunner::run_core(
            lineage,
            self.model,
            self.config,
            CoreRun::full(window, total, schedule),
            rng,
        )?;
        log::debug!(
            "window [{}, {}) done: {} accepted of {} proposed, cost delta {:.6}",
            window.start,
            window.end,
            outcome.stats.accepted,
            outcome.stats.proposed,
            outcome.stats.cost_delta
        );
        Ok(outcome.stats)
    }

    /// Runs the window at a pinned temperature and returns the pbad
    /// estimate.
    ///
    /// The run works on a private copy of the window; `lineage` is only
    /// borrowed and stays as it was.
    pub fn calibrate<R: Rng>(
        &self,
        lineage: &Lineage,
        window: Window,
        temperature: f64,
        rng: &mut R,
    ) -> Result<(Option<f64>, RunStats)> {
        self.config.validate()?;
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(AnnealError::InvalidConfig(format!(
                "calibration temperature must be finite and non-negative, got {temperature}"
            )));
        }
        window.check(lineage, false)?;
        let total = self.budget(lineage, window);
        let mut snapshot = lineage.detach(window.start, window.end);
        let run = CoreRun::full(window, total, TemperatureSchedule::Constant(temperature)).with_offset(true);
        let outcome = AnnealRunner::run_core(&mut snapshot, self.model, self.config, run, rng)?;
        log::debug!(
            "calibration of window [{}, {}) at T={temperature}: pbad {:?}",
            window.start,
            window.end,
            outcome.pbad
        );
        Ok((outcome.pbad, outcome.stats))
    }

    /// Bisects (geometrically) for the temperature whose pbad matches
    /// `target_pbad`.
    ///
    /// pbad grows with temperature. A calibration run that sees no uphill
    /// move at all counts as reaching the target.
    pub fn find_start_temperature<R: Rng>(
        &self,
        lineage: &Lineage,
        window: Window,
        target_pbad: f64,
        bounds: (f64, f64),
        steps: usize,
        rng: &mut R,
    ) -> Result<f64> {
        let (mut lo, mut hi) = bounds;
        if !(target_pbad > 0.0 && target_pbad < 1.0) {
            return Err(AnnealError::InvalidConfig(format!(
                "target pbad must be in (0, 1), got {target_pbad}"
            )));
        }
        if !(lo > 0.0 && hi > lo && hi.is_finite()) {
            return Err(AnnealError::InvalidConfig(format!(
                "temperature bounds must satisfy 0 < lo < hi, got ({lo}, {hi})"
            )));
        }
        for _ in 0..steps {
            let mid = (lo * hi).sqrt();
            let (pbad, _) = self.calibrate(lineage, window, mid, rng)?;
            match pbad {
                Some(p) if p < target_pbad => lo = mid,
                _ => hi = mid,
            }
        }
        Ok((lo * hi).sqrt())
    }

    #[cfg(feature = "parallel")]
    fn distributed<R: Rng>(&self, lineage: &mut Lineage, window: Window, rng: &mut R) -> Result<WindowOutcome> {
        BatchCoordinator::new(self.model, self.config)
            .run(lineage, window, rng)
            .map(WindowOutcome::Distributed)
    }

    #[cfg(not(feature = "parallel"))]
    fn distributed<R: Rng>(&self, _lineage: &mut Lineage, _window: Window, _rng: &mut R) -> Result<WindowOutcome> {
        self.config.strategy.validate()?;
        Err(AnnealError::InvalidConfig(
            "distributed runs need the `parallel` feature".into(),
        ))
    }
}
