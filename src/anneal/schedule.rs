//! Temperature schedule over frame position and iteration progress.
//!
//! The window carries one global envelope `[end, start]`. Each frame
//! gets its own slice of that envelope according to its position in the
//! window: the newest frame anneals from `start`, the oldest settles at
//! `end`. Within a frame the temperature then falls from the top of its
//! slice to the bottom as the run progresses. Adjacent frames meet:
//! a frame ends where the next-newer frame begins.

use super::types::Window;

/// Geometric interpolation between `a` and `b` at fraction `t`.
///
/// `gerp(a, b, 0) == a` and `gerp(a, b, 1) == b`. Falls back to linear
/// interpolation when either endpoint is not positive.
pub fn gerp(a: f64, b: f64, t: f64) -> f64 {
    if a > 0.0 && b > 0.0 {
        a * (b / a).powf(t)
    } else {
        a + (b - a) * t
    }
}

/// How the per-iteration temperature is obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemperatureSchedule {
    /// Two-level interpolation over the window envelope.
    Annealing { start: f64, end: f64 },
    /// Pinned temperature, used for calibration runs.
    Constant(f64),
}

impl TemperatureSchedule {
    /// Temperature for `frame_index` at `progress` (completed fraction
    /// of the whole run's iterations, in `[0, 1]`).
    ///
    /// With `offset` set, `frame_index` is relative to the window start
    /// (detached slice); otherwise it is absolute. Both yield the same
    /// value for the same logical frame.
    pub fn temperature(&self, window: Window, frame_index: usize, offset: bool, progress: f64) -> f64 {
        match *self {
            TemperatureSchedule::Constant(t) => t,
            TemperatureSchedule::Annealing { start, end } => {
                let position = if offset {
                    frame_index
                } else {
                    frame_index - window.start
                } as f64;
                let len = window.len().max(1) as f64;
                let frame_start = gerp(end, start, (position + 1.0) / len);
                let frame_end = gerp(end, start, position / len);
                gerp(frame_start, frame_end, progress)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_gerp_endpoints() {
        assert!((gerp(10.0, 0.1, 0.0) - 10.0).abs() < 1e-12);
        assert!((gerp(10.0, 0.1, 1.0) - 0.1).abs() < 1e-12);
        assert!((gerp(10.0, 0.1, 0.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gerp_linear_fallback() {
        assert!((gerp(0.0, 4.0, 0.25) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_ignores_position() {
        let s = TemperatureSchedule::Constant(2.5);
        let w = Window::new(4, 9);
        assert_eq!(s.temperature(w, 8, false, 0.9), 2.5);
        assert_eq!(s.temperature(w, 0, true, 0.0), 2.5);
    }

    #[test]
    fn test_newest_frame_starts_hot() {
        let s = TemperatureSchedule::Annealing {
            start: 10.0,
            end: 0.1,
        };
        let w = Window::new(0, 5);
        assert!((s.temperature(w, 4, false, 0.0) - 10.0).abs() < 1e-9);
        assert!((s.temperature(w, 0, false, 1.0) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_adjacent_frames_meet() {
        let s = TemperatureSchedule::Annealing {
            start: 8.0,
            end: 0.5,
        };
        let w = Window::new(2, 6);
        for frame in 3..6 {
            let end_of_frame = s.temperature(w, frame, false, 1.0);
            let start_of_older = s.temperature(w, frame - 1, false, 0.0);
            assert!((end_of_frame - start_of_older).abs() < 1e-9);
        }
    }

    proptest! {
        #[test]
        fn prop_non_increasing_in_progress(
            end in 0.0f64..5.0,
            extra in 0.0f64..50.0,
            start_frame in 0usize..20,
            len in 1usize..12,
            pos in 0usize..12,
            p1 in 0.0f64..=1.0,
            p2 in 0.0f64..=1.0,
        ) {
            let pos = pos % len;
            let s = TemperatureSchedule::Annealing { start: end + extra, end };
            let w = Window::new(start_frame, start_frame + len);
            let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
            let early = s.temperature(w, start_frame + pos, false, lo);
            let late = s.temperature(w, start_frame + pos, false, hi);
            prop_assert!(late <= early + 1e-9 * early.abs().max(1.0));
        }

        #[test]
        fn prop_within_envelope(
            end in 0.0f64..5.0,
            extra in 0.0f64..50.0,
            len in 1usize..12,
            pos in 0usize..12,
            progress in 0.0f64..=1.0,
        ) {
            let pos = pos % len;
            let start = end + extra;
            let s = TemperatureSchedule::Annealing { start, end };
            let t = s.temperature(Window::new(0, len), pos, false, progress);
            prop_assert!(t >= end - 1e-9 && t <= start + 1e-9);
        }

        #[test]
        fn prop_offset_matches_absolute(
            start_frame in 0usize..50,
            len in 1usize..12,
            pos in 0usize..12,
            progress in 0.0f64..=1.0,
        ) {
            let pos = pos % len;
            let s = TemperatureSchedule::Annealing { start: 12.0, end: 0.05 };
            let w = Window::new(start_frame, start_frame + len);
            let absolute = s.temperature(w, start_frame + pos, false, progress);
            let relative = s.temperature(w, pos, true, progress);
            prop_assert_eq!(absolute, relative);
        }
    }
}
