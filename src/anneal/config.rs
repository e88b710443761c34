//! Annealing configuration, edit probabilities and batch strategies.

use crate::change::ChangeKind;
use crate::error::{AnnealError, Result};
use std::str::FromStr;
use std::time::Duration;

/// Tolerance used when checking that edit probabilities sum to one.
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// Probabilities of drawing each edit kind.
///
/// Keys follow the `prob.*` option names.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EditProbabilities {
    pub split: f64,
    pub perturbation: f64,
    pub combine: f64,
    pub background_offset: f64,
    pub opacity_diffraction_offset: f64,
    pub camera_shift: f64,
}

impl Default for EditProbabilities {
    fn default() -> Self {
        Self {
            split: 0.2,
            perturbation: 0.8,
            combine: 0.0,
            background_offset: 0.0,
            opacity_diffraction_offset: 0.0,
            camera_shift: 0.0,
        }
    }
}

impl EditProbabilities {
    pub fn get(&self, kind: ChangeKind) -> f64 {
        match kind {
            ChangeKind::Split => self.split,
            ChangeKind::Perturbation => self.perturbation,
            ChangeKind::Combination => self.combine,
            ChangeKind::BackgroundOffset => self.background_offset,
            ChangeKind::OpacityDiffractionOffset => self.opacity_diffraction_offset,
            ChangeKind::CameraShift => self.camera_shift,
        }
    }

    pub fn set(&mut self, kind: ChangeKind, value: f64) {
        let slot = match kind {
            ChangeKind::Split => &mut self.split,
            ChangeKind::Perturbation => &mut self.perturbation,
            ChangeKind::Combination => &mut self.combine,
            ChangeKind::BackgroundOffset => &mut self.background_offset,
            ChangeKind::OpacityDiffractionOffset => &mut self.opacity_diffraction_offset,
            ChangeKind::CameraShift => &mut self.camera_shift,
        };
        *slot = value;
    }

    /// Probabilities in [`ChangeKind::ALL`] order.
    pub fn as_array(&self) -> [f64; 6] {
        ChangeKind::ALL.map(|k| self.get(k))
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Returns a copy that sums to one.
    ///
    /// If the sum drifts from one by more than [`PROBABILITY_TOLERANCE`],
    /// every entry is divided by the sum and a warning is logged. The
    /// flag in the result reports whether that happened.
    ///
    /// # Errors
    /// Any negative or non-finite entry, or a sum that is not positive.
    pub fn normalized(&self) -> Result<(Self, bool)> {
        for kind in ChangeKind::ALL {
            let p = self.get(kind);
            if !p.is_finite() || p < 0.0 {
                return Err(AnnealError::InvalidProbabilities(format!(
                    "prob.{kind} = {p}"
                )));
            }
        }
        let sum = self.sum();
        if !sum.is_finite() || sum <= 0.0 {
            return Err(AnnealError::InvalidProbabilities(format!("sum is {sum}")));
        }
        if (sum - 1.0).abs() <= PROBABILITY_TOLERANCE {
            return Ok((*self, false));
        }

        let mut normalized = *self;
        for kind in ChangeKind::ALL {
            normalized.set(kind, self.get(kind) / sum);
        }
        log::warn!(
            "edit probabilities sum to {sum}, not 1; normalized to {:?}",
            normalized
        );
        Ok((normalized, true))
    }
}

/// Switches for the edit kinds beyond split and perturbation.
///
/// Disabled kinds may still be drawn; the draw then produces no edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnabledKinds {
    pub combine: bool,
    pub background_offset: bool,
    pub opacity_diffraction_offset: bool,
    pub camera_shift: bool,
}

impl EnabledKinds {
    /// Every kind enabled.
    pub fn all() -> Self {
        Self {
            combine: true,
            background_offset: true,
            opacity_diffraction_offset: true,
            camera_shift: true,
        }
    }

    pub fn allows(&self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Split | ChangeKind::Perturbation => true,
            ChangeKind::Combination => self.combine,
            ChangeKind::BackgroundOffset => self.background_offset,
            ChangeKind::OpacityDiffractionOffset => self.opacity_diffraction_offset,
            ChangeKind::CameraShift => self.camera_shift,
        }
    }
}

/// Rule for picking one trajectory among the workers of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Strategy {
    /// Lowest cost wins.
    #[default]
    BestWins,
    /// Highest cost wins, except on the final batch where lowest wins.
    WorstWins,
    /// Reserved; rejected by [`Strategy::validate`].
    ExtremeWins,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::BestWins => "best-wins",
            Strategy::WorstWins => "worst-wins",
            Strategy::ExtremeWins => "extreme-wins",
        }
    }

    /// Checks that the strategy has a selection rule.
    pub fn validate(self) -> Result<()> {
        match self {
            Strategy::BestWins | Strategy::WorstWins => Ok(()),
            Strategy::ExtremeWins => Err(AnnealError::UndefinedStrategy(self.name().into())),
        }
    }

    /// Picks the winner among `candidates`.
    ///
    /// Returns `Ok(None)` when there are no candidates.
    pub fn select<T>(
        self,
        candidates: Vec<T>,
        final_batch: bool,
        cost: impl Fn(&T) -> f64,
    ) -> Result<Option<T>> {
        self.validate()?;
        let lowest = matches!(self, Strategy::BestWins) || final_batch;
        let winner = candidates.into_iter().reduce(|a, b| {
            let ord = cost(&a).total_cmp(&cost(&b));
            let keep_a = if lowest { ord.is_le() } else { ord.is_ge() };
            if keep_a {
                a
            } else {
                b
            }
        });
        Ok(winner)
    }
}

impl FromStr for Strategy {
    type Err = AnnealError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "best-wins" => Ok(Strategy::BestWins),
            "worst-wins" => Ok(Strategy::WorstWins),
            "extreme-wins" => Ok(Strategy::ExtremeWins),
            other => Err(AnnealError::UnknownStrategy(other.into())),
        }
    }
}

/// Configuration for annealing a window of a lineage.
///
/// # Examples
///
/// ```
/// use lineage_anneal::anneal::{AnnealConfig, Strategy};
///
/// let config = AnnealConfig::default()
///     .with_temperatures(10.0, 0.01)
///     .with_iterations_per_cell(200)
///     .with_length_bounds(12.0, 40.0)
///     .with_strategy(Strategy::BestWins)
///     .with_seed(42);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnealConfig {
    /// Edit-kind probabilities (`prob.*`).
    pub probabilities: EditProbabilities,

    /// Which reserved edit kinds may produce edits.
    pub enabled: EnabledKinds,

    /// Length at or below which a cell never splits (`bacilli.minLength`).
    pub min_length: f64,

    /// Length at or above which a split draw always admits (`bacilli.maxLength`).
    pub max_length: f64,

    /// Capacity of the calibration buffer (`pbad_max_size`).
    pub pbad_max_size: usize,

    /// Temperature at the hot end of the window envelope.
    pub start_temperature: f64,

    /// Temperature at the cold end of the window envelope.
    pub end_temperature: f64,

    /// Iteration density: iterations per cell per window frame.
    pub iterations_per_cell: usize,

    /// Number of batches the budget is cut into for distributed runs.
    pub batches: usize,

    /// Workers racing in each batch.
    pub jobs: usize,

    /// Winner selection among batch workers.
    pub strategy: Strategy,

    /// Bounded wait for each batch.
    pub batch_timeout: Duration,

    /// Random seed for reproducibility.
    pub seed: Option<u64>,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            probabilities: EditProbabilities::default(),
            enabled: EnabledKinds::default(),
            min_length: 10.0,
            max_length: 40.0,
            pbad_max_size: 2000,
            start_temperature: 10.0,
            end_temperature: 0.01,
            iterations_per_cell: 100,
            batches: 1,
            jobs: 1,
            strategy: Strategy::default(),
            batch_timeout: Duration::from_secs(3600),
            seed: None,
        }
    }
}

impl AnnealConfig {
    pub fn with_probabilities(mut self, probabilities: EditProbabilities) -> Self {
        self.probabilities = probabilities;
        self
    }

    pub fn with_enabled(mut self, enabled: EnabledKinds) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_length_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn with_pbad_max_size(mut self, n: usize) -> Self {
        self.pbad_max_size = n;
        self
    }

    pub fn with_temperatures(mut self, start: f64, end: f64) -> Self {
        self.start_temperature = start;
        self.end_temperature = end;
        self
    }

    pub fn with_iterations_per_cell(mut self, n: usize) -> Self {
        self.iterations_per_cell = n;
        self
    }

    pub fn with_batches(mut self, batches: usize, jobs: usize) -> Self {
        self.batches = batches;
        self.jobs = jobs;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets a named numeric option.
    ///
    /// Recognised names: `prob.split`, `prob.perturbation`,
    /// `prob.combine`, `prob.background_offset`,
    /// `prob.opacity_diffraction_offset`, `prob.camera_shift`,
    /// `bacilli.minLength`, `bacilli.maxLength`, `pbad_max_size`,
    /// `start_temp`, `end_temp`, `iteration_per_cell`, `batches`, `jobs`.
    pub fn set_option(&mut self, name: &str, value: f64) -> Result<()> {
        if let Some(kind) = name
            .strip_prefix("prob.")
            .and_then(|k| ChangeKind::ALL.into_iter().find(|c| c.name() == k))
        {
            self.probabilities.set(kind, value);
            return Ok(());
        }
        match name {
            "bacilli.minLength" => self.min_length = value,
            "bacilli.maxLength" => self.max_length = value,
            "start_temp" => self.start_temperature = value,
            "end_temp" => self.end_temperature = value,
            "pbad_max_size" => self.pbad_max_size = as_count(name, value)?,
            "iteration_per_cell" => self.iterations_per_cell = as_count(name, value)?,
            "batches" => self.batches = as_count(name, value)?,
            "jobs" => self.jobs = as_count(name, value)?,
            _ => return Err(AnnealError::UnknownOption(name.into())),
        }
        Ok(())
    }

    /// Builds a configuration from named options over the defaults.
    pub fn from_options<'a, I>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut config = Self::default();
        for (name, value) in options {
            config.set_option(name, value)?;
        }
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// The batch strategy is checked separately by
    /// [`Strategy::validate`], since only distributed runs use it.
    pub fn validate(&self) -> Result<()> {
        self.probabilities.normalized()?;
        if !(self.min_length.is_finite() && self.max_length.is_finite()) {
            return Err(invalid("length bounds must be finite"));
        }
        if self.min_length < 0.0 || self.min_length >= self.max_length {
            return Err(invalid(format!(
                "bacilli.minLength ({}) must be non-negative and below bacilli.maxLength ({})",
                self.min_length, self.max_length
            )));
        }
        if self.pbad_max_size == 0 {
            return Err(invalid("pbad_max_size must be positive"));
        }
        for (name, t) in [
            ("start_temp", self.start_temperature),
            ("end_temp", self.end_temperature),
        ] {
            if !t.is_finite() || t < 0.0 {
                return Err(invalid(format!("{name} must be finite and non-negative, got {t}")));
            }
        }
        if self.iterations_per_cell == 0 {
            return Err(invalid("iteration_per_cell must be positive"));
        }
        if self.batches == 0 || self.jobs == 0 {
            return Err(invalid("batches and jobs must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> AnnealError {
    AnnealError::InvalidConfig(msg.into())
}

fn as_count(name: &str, value: f64) -> Result<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(invalid(format!("{name} must be a non-negative integer, got {value}")))
    }
}
