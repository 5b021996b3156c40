//! EXIF orientation codes and the geometry transform each one implies.

use serde::{Deserialize, Serialize};

/// How stored pixels map onto the upright display.
///
/// Transforms are applied in display space: swap the axes first, then mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationTransform {
    /// Width and height trade places (90° or 270° rotation, transpose).
    pub swap_axes: bool,
    /// Horizontal coordinates are flipped after the swap.
    pub mirror_x: bool,
    /// Vertical coordinates are flipped after the swap.
    pub mirror_y: bool,
}

const fn transform(swap_axes: bool, mirror_x: bool, mirror_y: bool) -> OrientationTransform {
    OrientationTransform {
        swap_axes,
        mirror_x,
        mirror_y,
    }
}

/// Indexed by `code - 1`.
const TRANSFORMS: [OrientationTransform; 8] = [
    transform(false, false, false), // 1: upright
    transform(false, true, false),  // 2: mirrored horizontally
    transform(false, true, true),   // 3: rotated 180°
    transform(false, false, true),  // 4: mirrored vertically
    transform(true, false, false),  // 5: transposed
    transform(true, true, false),   // 6: rotated 90° clockwise
    transform(true, true, true),    // 7: transversed
    transform(true, false, true),   // 8: rotated 90° counter-clockwise
];

/// An EXIF orientation code in `1..=8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Orientation(u8);

impl Orientation {
    /// The identity orientation.
    pub const UPRIGHT: Orientation = Orientation(1);

    /// Create from a raw code, rejecting anything outside `1..=8`.
    pub fn from_code(code: u8) -> Option<Self> {
        (1..=8).contains(&code).then_some(Self(code))
    }

    /// Raw EXIF code.
    pub fn code(self) -> u8 {
        self.0
    }

    /// Geometry transform for this code.
    pub fn transform(self) -> OrientationTransform {
        TRANSFORMS[usize::from(self.0 - 1)]
    }

    /// Whether displayed width and height are swapped relative to storage.
    pub fn swaps_axes(self) -> bool {
        self.transform().swap_axes
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::UPRIGHT
    }
}

impl TryFrom<u8> for Orientation {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("invalid orientation code {code}"))
    }
}

impl From<Orientation> for u8 {
    fn from(orientation: Orientation) -> Self {
        orientation.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_out_of_range_codes() {
        assert!(Orientation::from_code(0).is_none());
        assert!(Orientation::from_code(9).is_none());
        assert_eq!(Orientation::from_code(6).map(Orientation::code), Some(6));
    }

    #[test]
    fn test_codes_five_to_eight_swap_axes() {
        for code in 1..=8u8 {
            let orientation = Orientation::from_code(code).unwrap();
            assert_eq!(orientation.swaps_axes(), code >= 5, "code {code}");
        }
    }

    #[test]
    fn test_rotation_transforms() {
        let cw = Orientation::from_code(6).unwrap().transform();
        assert!(cw.swap_axes && cw.mirror_x && !cw.mirror_y);

        let half_turn = Orientation::from_code(3).unwrap().transform();
        assert!(!half_turn.swap_axes && half_turn.mirror_x && half_turn.mirror_y);
    }
}
