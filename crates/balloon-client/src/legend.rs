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

//! Altitude color legend.

use crate::colormap::{viridis, Rgb};

/// Number of swatches in the legend gradient.
pub const LEGEND_STEPS: usize = 10;

/// Stateless description of the altitude legend.
///
/// Samples the same Viridis scale the projector uses at evenly spaced points
/// in [0, 1], so swatch `0` matches a 0 km balloon and the last swatch matches
/// one at the top of the range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AltitudeLegend {
    pub title: &'static str,
    pub min_label: &'static str,
    pub max_label: &'static str,
    pub swatches: [Rgb; LEGEND_STEPS],
}

impl Default for AltitudeLegend {
    fn default() -> Self {
        Self::new()
    }
}

impl AltitudeLegend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            title: "Altitude Scale (km)",
            min_label: "0 km",
            max_label: "40 km",
            swatches: std::array::from_fn(|i| viridis(i as f64 / (LEGEND_STEPS - 1) as f64)),
        }
    }
}
