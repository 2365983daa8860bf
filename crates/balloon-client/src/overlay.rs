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

//! Wind-arrow overlay lifecycle.
//!
//! The overlay owns one [`ArrowGlyph`] per balloon record: a colored line from
//! the balloon position along the downwind bearing and a triangular arrowhead
//! at the tip. Both parts share a popup describing the observation.
//!
//! Whenever the input records change the whole set is discarded and rebuilt.
//! There is no incremental diffing.

use log::debug;

use crate::colormap::Rgb;
use crate::model::BalloonRecord;
use crate::projector::{GeoPoint, GeoVectorProjector, VectorGlyph};

/// Stroke width of the line part, in pixels.
pub const LINE_WIDTH_PX: f32 = 5.0;

/// Stroke opacity of the line part.
pub const LINE_OPACITY: f32 = 1.0;

/// Edge length of the arrowhead marker, in pixels.
pub const ARROWHEAD_SIZE_PX: f32 = 16.0;

/// Triangular marker drawn at the end of a wind vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrowhead {
    pub tip: GeoPoint,
    /// Clockwise rotation from north, matching the vector's bearing.
    pub rotation_deg: f64,
    pub color: Rgb,
    pub size_px: f32,
}

/// Which clickable part of a glyph was activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphPart {
    Line,
    Arrowhead,
}

/// Line plus arrowhead rendered for one balloon record.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrowGlyph {
    pub line: VectorGlyph,
    pub arrowhead: Arrowhead,
    pub popup: String,
}

impl ArrowGlyph {
    fn from_vector(line: VectorGlyph) -> Self {
        let arrowhead = Arrowhead {
            tip: line.end,
            rotation_deg: line.bearing_deg,
            color: line.color,
            size_px: ARROWHEAD_SIZE_PX,
        };
        let popup = popup_text(&line.record);
        Self {
            line,
            arrowhead,
            popup,
        }
    }
}

/// Popup body shown when a glyph is clicked.
#[must_use]
pub fn popup_text(record: &BalloonRecord) -> String {
    format!(
        "Latitude: {:.4}°\nLongitude: {:.4}°\nWind Speed: {:.2} km/h\nAltitude: {} km",
        record.latitude, record.longitude, record.wind_speed, record.altitude
    )
}

/// Identifies the dataset the current glyphs were built from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceKey {
    hour: String,
    generation: u64,
}

/// Owns the wind-arrow glyphs drawn over the map.
#[derive(Debug, Default)]
pub struct ArrowOverlayManager {
    projector: GeoVectorProjector,
    glyphs: Vec<ArrowGlyph>,
    source: Option<SourceKey>,
    open_popup: Option<(usize, GlyphPart)>,
}

impl ArrowOverlayManager {
    #[must_use]
    pub fn new(projector: GeoVectorProjector) -> Self {
        Self {
            projector,
            glyphs: Vec::new(),
            source: None,
            open_popup: None,
        }
    }

    /// Discard every existing glyph and build a fresh one per record.
    pub fn rebuild(&mut self, records: &[BalloonRecord]) {
        let previous = self.glyphs.len();
        self.open_popup = None;
        self.glyphs = records
            .iter()
            .map(|record| ArrowGlyph::from_vector(self.projector.project(record)))
            .collect();
        debug!(
            "Rebuilt wind overlay: removed {previous} glyphs, added {}",
            self.glyphs.len()
        );
    }

    /// Rebuild only if `hour` or `generation` differs from the last build.
    ///
    /// Returns `true` when a rebuild happened.
    pub fn sync(&mut self, hour: &str, generation: u64, records: &[BalloonRecord]) -> bool {
        let key = SourceKey {
            hour: hour.to_string(),
            generation,
        };
        if self.source.as_ref() == Some(&key) {
            return false;
        }
        self.rebuild(records);
        self.source = Some(key);
        true
    }

    /// Remove every glyph from the overlay.
    pub fn clear(&mut self) {
        if !self.glyphs.is_empty() {
            debug!("Clearing wind overlay ({} glyphs)", self.glyphs.len());
        }
        self.glyphs.clear();
        self.source = None;
        self.open_popup = None;
    }

    /// Swap the projector and rebuild from the glyphs' source records.
    pub fn set_projector(&mut self, projector: GeoVectorProjector) {
        self.projector = projector;
        let records: Vec<BalloonRecord> = self.glyphs.iter().map(|g| g.line.record).collect();
        self.rebuild(&records);
    }

    #[must_use]
    pub fn glyphs(&self) -> &[ArrowGlyph] {
        &self.glyphs
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.glyphs.len()
    }

    #[must_use]
    pub fn arrowhead_count(&self) -> usize {
        self.glyphs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Open the popup attached to one part of a glyph.
    ///
    /// Out-of-range indices are ignored.
    pub fn open_popup(&mut self, index: usize, part: GlyphPart) {
        if index < self.glyphs.len() {
            self.open_popup = Some((index, part));
        }
    }

    pub fn close_popup(&mut self) {
        self.open_popup = None;
    }

    /// Currently opened popup, with the glyph and the part that was clicked.
    #[must_use]
    pub fn open_popup_glyph(&self) -> Option<(&ArrowGlyph, GlyphPart)> {
        self.open_popup
            .and_then(|(index, part)| self.glyphs.get(index).map(|glyph| (glyph, part)))
    }
}

impl Drop for ArrowOverlayManager {
    fn drop(&mut self) {
        if !self.glyphs.is_empty() {
            debug!("Tearing down wind overlay ({} glyphs)", self.glyphs.len());
        }
    }
}
