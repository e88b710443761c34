//! Edit kinds.

use std::fmt;

/// The closed set of structural edits the annealer can propose.
///
/// [`ChangeKind::ALL`] fixes the order of the categorical draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChangeKind {
    Split,
    Perturbation,
    Combination,
    BackgroundOffset,
    OpacityDiffractionOffset,
    CameraShift,
}

impl ChangeKind {
    /// All kinds, in draw order.
    pub const ALL: [ChangeKind; 6] = [
        ChangeKind::Split,
        ChangeKind::Perturbation,
        ChangeKind::Combination,
        ChangeKind::BackgroundOffset,
        ChangeKind::OpacityDiffractionOffset,
        ChangeKind::CameraShift,
    ];

    /// Short name used in option keys and logs.
    pub fn name(self) -> &'static str {
        match self {
            ChangeKind::Split => "split",
            ChangeKind::Perturbation => "perturbation",
            ChangeKind::Combination => "combine",
            ChangeKind::BackgroundOffset => "background_offset",
            ChangeKind::OpacityDiffractionOffset => "opacity_diffraction_offset",
            ChangeKind::CameraShift => "camera_shift",
        }
    }

    /// Position in [`ChangeKind::ALL`].
    pub fn index(self) -> usize {
        match self {
            ChangeKind::Split => 0,
            ChangeKind::Perturbation => 1,
            ChangeKind::Combination => 2,
            ChangeKind::BackgroundOffset => 3,
            ChangeKind::OpacityDiffractionOffset => 4,
            ChangeKind::CameraShift => 5,
        }
    }

    /// Whether the edit needs history (a previous frame) to be meaningful.
    pub fn needs_history(self) -> bool {
        !matches!(self, ChangeKind::Perturbation)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_all_order() {
        for (i, kind) in ChangeKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(ChangeKind::Combination.to_string(), "combine");
        assert_eq!(ChangeKind::CameraShift.name(), "camera_shift");
    }
}
