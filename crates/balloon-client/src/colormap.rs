// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Viridis sequential color scale.
//!
//! Shared by the wind-vector projector and the altitude legend so both always
//! agree on which color a given altitude maps to.

/// 8-bit sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS-style hex string, e.g. `#440154`.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

// Viridis sampled at i/9 for i in 0..=9
const VIRIDIS_STOPS: [Rgb; 10] = [
    Rgb::new(68, 1, 84),
    Rgb::new(72, 40, 120),
    Rgb::new(62, 73, 137),
    Rgb::new(49, 104, 142),
    Rgb::new(38, 130, 142),
    Rgb::new(31, 158, 137),
    Rgb::new(53, 183, 121),
    Rgb::new(110, 206, 88),
    Rgb::new(181, 222, 43),
    Rgb::new(253, 231, 37),
];

/// Sample the Viridis scale at `t`.
///
/// `t` is clamped to [0, 1]; NaN maps to the low end.
#[must_use]
pub fn viridis(t: f64) -> Rgb {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

    let segments = (VIRIDIS_STOPS.len() - 1) as f64;
    let x = t * segments;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "x is within [0, segments]")]
    let i = x.floor() as usize;
    if i >= VIRIDIS_STOPS.len() - 1 {
        return VIRIDIS_STOPS[VIRIDIS_STOPS.len() - 1];
    }

    let f = x - i as f64;
    let lo = VIRIDIS_STOPS[i];
    let hi = VIRIDIS_STOPS[i + 1];
    Rgb::new(lerp(lo.r, hi.r, f), lerp(lo.g, hi.g, f), lerp(lo.b, hi.b, f))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "result lies between two u8 values")]
fn lerp(a: u8, b: u8, f: f64) -> u8 {
    (f64::from(a) + (f64::from(b) - f64::from(a)) * f).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        assert_eq!(viridis(0.0), Rgb::new(68, 1, 84));
        assert_eq!(viridis(1.0), Rgb::new(253, 231, 37));
    }

    #[test]
    fn test_stops_are_exact() {
        for (i, stop) in VIRIDIS_STOPS.iter().enumerate() {
            assert_eq!(viridis(i as f64 / 9.0), *stop);
        }
    }

    #[test]
    fn test_midpoint_is_teal() {
        let mid = viridis(0.5);
        // Between the fifth and sixth stops
        assert_eq!(mid, Rgb::new(35, 144, 140));
        assert!(mid.g > mid.r && mid.b > mid.r);
    }

    #[test]
    fn test_out_of_range_clamps() {
        assert_eq!(viridis(-0.5), viridis(0.0));
        assert_eq!(viridis(1.7), viridis(1.0));
        assert_eq!(viridis(f64::NAN), viridis(0.0));
    }

    #[test]
    fn test_hex() {
        assert_eq!(Rgb::new(68, 1, 84).to_hex(), "#440154");
        assert_eq!(viridis(1.0).to_hex(), "#fde725");
    }
}
