//! Highlight colors: a fixed palette cycled by fragment index, and the
//! red → orange → green gradient used for completeness scores.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque 24-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// CSS hex form, e.g. `#ffa500`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Fragment highlight colors, light enough to sit behind dark text.
pub const PALETTE: &[Rgb] = &[
    Rgb::new(0xfe, 0xf0, 0xc3), // yellow
    Rgb::new(0xd2, 0xe3, 0xfc), // blue
    Rgb::new(0xc8, 0xe6, 0xc9), // green
    Rgb::new(0xf9, 0xde, 0xdc), // red
    Rgb::new(0xea, 0xdd, 0xff), // purple
    Rgb::new(0xff, 0xdd, 0xbe), // orange
    Rgb::new(0xc4, 0xe9, 0xe4), // teal
    Rgb::new(0xfc, 0xe4, 0xec), // pink
];

pub const LOW_SCORE: Rgb = Rgb::new(255, 0, 0);
pub const MID_SCORE: Rgb = Rgb::new(255, 165, 0);
pub const HIGH_SCORE: Rgb = Rgb::new(0, 128, 0);

/// `PALETTE[index mod len]`.
pub fn color_for_index(index: usize) -> Rgb {
    PALETTE[index % PALETTE.len()]
}

/// Map a score in `[0, 1]` onto the red → orange → green gradient.
///
/// Out-of-range input is clamped; NaN is treated as 0.
pub fn color_for_score(score: f64) -> Rgb {
    let s = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
    if s <= 0.5 {
        lerp(LOW_SCORE, MID_SCORE, s / 0.5)
    } else {
        lerp(MID_SCORE, HIGH_SCORE, (s - 0.5) / 0.5)
    }
}

fn lerp(from: Rgb, to: Rgb, t: f64) -> Rgb {
    let channel = |a: u8, b: u8| -> u8 {
        let v = a as f64 + (b as f64 - a as f64) * t;
        v.floor().clamp(0.0, 255.0) as u8
    };
    Rgb::new(
        channel(from.r, to.r),
        channel(from.g, to.g),
        channel(from.b, to.b),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_for_index_cycles() {
        for i in 0..32 {
            assert_eq!(color_for_index(i), color_for_index(i + PALETTE.len()));
        }
    }

    #[test]
    fn test_color_for_index_first_entries_distinct() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..PALETTE.len() {
            assert!(seen.insert(color_for_index(i)));
        }
    }

    #[test]
    fn test_color_for_score_endpoints_exact() {
        assert_eq!(color_for_score(0.0), LOW_SCORE);
        assert_eq!(color_for_score(0.5), MID_SCORE);
        assert_eq!(color_for_score(1.0), HIGH_SCORE);
    }

    #[test]
    fn test_color_for_score_quarter_is_floored() {
        // 0 + 165 * 0.5 = 82.5
        assert_eq!(color_for_score(0.25), Rgb::new(255, 82, 0));
    }

    #[test]
    fn test_color_for_score_three_quarters() {
        // r: 255 - 255 * 0.5 = 127.5, g: 165 - 37 * 0.5 = 146.5
        assert_eq!(color_for_score(0.75), Rgb::new(127, 146, 0));
    }

    #[test]
    fn test_color_for_score_clamps() {
        assert_eq!(color_for_score(-3.0), LOW_SCORE);
        assert_eq!(color_for_score(7.0), HIGH_SCORE);
        assert_eq!(color_for_score(f64::NAN), LOW_SCORE);
    }

    #[test]
    fn test_rgb_formats() {
        assert_eq!(MID_SCORE.to_hex(), "#ffa500");
        assert_eq!(MID_SCORE.to_string(), "rgb(255, 165, 0)");
    }
}
