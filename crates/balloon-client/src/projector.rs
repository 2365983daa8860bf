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

//! Wind-vector geometry.
//!
//! Converts a balloon observation into a short line segment on the map that
//! points the way the air is moving, colored by altitude. Displacements use a
//! local flat-Earth approximation: one degree of latitude is a fixed number of
//! meters and longitude degrees shrink with the cosine of latitude. This is a
//! visualization aid, not a geodesic calculation.

use log::debug;

use crate::colormap::{viridis, Rgb};
use crate::model::BalloonRecord;

/// Default visualization scale from km/h to meters of drawn displacement.
pub const DEFAULT_SCALE_FACTOR: f64 = 25_000.0;

/// Meters per degree of latitude.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Altitude mapped to the top of the color scale, in km.
pub const MAX_ALTITUDE_KM: f64 = 40.0;

// Floor for |cos(lat)| so the longitude step stays finite at the poles
const MIN_COS_LATITUDE: f64 = 1e-6;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Line segment derived from one balloon record.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorGlyph {
    pub start: GeoPoint,
    pub end: GeoPoint,
    /// Direction the wind blows toward, clockwise from north, in [0, 360).
    pub bearing_deg: f64,
    pub color: Rgb,
    pub record: BalloonRecord,
}

/// Tunable constants for the projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectorConfig {
    /// Meters of drawn displacement per km/h of wind.
    pub scale_factor: f64,
    pub meters_per_degree: f64,
    /// Altitude (km) that maps to the top of the color scale.
    pub max_altitude_km: f64,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            meters_per_degree: METERS_PER_DEGREE,
            max_altitude_km: MAX_ALTITUDE_KM,
        }
    }
}

/// Projects balloon records into map-space vector glyphs.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoVectorProjector {
    config: ProjectorConfig,
}

impl GeoVectorProjector {
    #[must_use]
    pub const fn new(config: ProjectorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Convert a meteorological "from" direction into the "to" bearing used for drawing.
    #[must_use]
    pub fn downwind_bearing(wind_direction: f64) -> f64 {
        (wind_direction + 180.0).rem_euclid(360.0)
    }

    /// Length of the drawn vector in meters.
    #[must_use]
    pub fn vector_length_m(&self, wind_speed: f64) -> f64 {
        wind_speed * self.config.scale_factor
    }

    /// Endpoint reached by moving `length_m` meters from `start` along `bearing_deg`.
    #[must_use]
    pub fn displace(&self, start: GeoPoint, length_m: f64, bearing_deg: f64) -> GeoPoint {
        let rad = bearing_deg.to_radians();
        let meters_per_degree = self.config.meters_per_degree;

        let mut cos_lat = start.lat.to_radians().cos();
        if cos_lat.abs() < MIN_COS_LATITUDE {
            cos_lat = MIN_COS_LATITUDE.copysign(cos_lat);
        }

        GeoPoint {
            lat: start.lat + (length_m / meters_per_degree) * rad.cos(),
            lon: start.lon + (length_m / (meters_per_degree * cos_lat)) * rad.sin(),
        }
    }

    /// Color for an altitude in km.
    ///
    /// Altitudes outside [0, max] are clamped onto the ends of the scale.
    #[must_use]
    pub fn altitude_color(&self, altitude_km: f64) -> Rgb {
        let t = altitude_km / self.config.max_altitude_km;
        if !(0.0..=1.0).contains(&t) {
            debug!(
                "Altitude {altitude_km} km outside 0-{} km color range, clamping",
                self.config.max_altitude_km
            );
        }
        viridis(t)
    }

    /// Project a single record.
    #[must_use]
    pub fn project(&self, record: &BalloonRecord) -> VectorGlyph {
        let start = GeoPoint::new(record.latitude, record.longitude);
        let bearing_deg = Self::downwind_bearing(record.wind_direction);
        let end = self.displace(start, self.vector_length_m(record.wind_speed), bearing_deg);

        VectorGlyph {
            start,
            end,
            bearing_deg,
            color: self.altitude_color(record.altitude),
            record: *record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(lat: f64, lon: f64, speed: f64, dir: f64, alt: f64) -> BalloonRecord {
        BalloonRecord {
            latitude: lat,
            longitude: lon,
            wind_speed: speed,
            wind_direction: dir,
            altitude: alt,
        }
    }

    #[test]
    fn test_reference_projection() {
        let glyph = GeoVectorProjector::default().project(&record(10.0, 20.0, 0.01, 0.0, 20.0));

        assert!((glyph.bearing_deg - 180.0).abs() < 1e-12);
        assert!((glyph.end.lat - (10.0 - 250.0 / 111_320.0)).abs() < 1e-9);
        assert!((glyph.end.lat - 9.9978).abs() < 1e-4);
        assert!((glyph.end.lon - 20.0).abs() < 1e-9);
        assert_eq!(glyph.color, viridis(0.5));
        assert_eq!(glyph.start, GeoPoint::new(10.0, 20.0));
    }

    #[test]
    fn test_west_wind_points_east() {
        // Wind from 270 blows toward 90
        let glyph = GeoVectorProjector::default().project(&record(0.0, 0.0, 1.0, 270.0, 10.0));
        assert!((glyph.bearing_deg - 90.0).abs() < 1e-12);
        assert!(glyph.end.lon > 0.0);
        assert!(glyph.end.lat.abs() < 1e-9);
        assert!((glyph.end.lon - 25_000.0 / 111_320.0).abs() < 1e-9);
    }

    #[test]
    fn test_longitude_scaled_by_latitude() {
        let projector = GeoVectorProjector::default();
        let equator = projector.project(&record(0.0, 0.0, 1.0, 270.0, 0.0));
        let sixty = projector.project(&record(60.0, 0.0, 1.0, 270.0, 0.0));
        // cos(60) = 0.5 doubles the longitude step
        assert!((sixty.end.lon - 2.0 * equator.end.lon).abs() < 1e-9);
    }

    #[test]
    fn test_full_turn_is_equivalent() {
        let projector = GeoVectorProjector::default();
        for dir in [0.0, 33.3, 90.0, 181.5, 359.9] {
            let a = projector.project(&record(45.0, -120.0, 7.5, dir, 12.0));
            let b = projector.project(&record(45.0, -120.0, 7.5, dir + 360.0, 12.0));
            assert!((a.end.lat - b.end.lat).abs() < 1e-9);
            assert!((a.end.lon - b.end.lon).abs() < 1e-9);
        }
    }

    #[test]
    fn test_endpoints_finite_away_from_poles() {
        let projector = GeoVectorProjector::default();
        let mut lat = -88.9;
        while lat < 89.0 {
            for dir in [0.0, 45.0, 135.0, 225.0, 315.0] {
                let glyph = projector.project(&record(lat, 179.0, 250.0, dir, 30.0));
                assert!(glyph.end.is_finite(), "non-finite endpoint at lat {lat}, dir {dir}");
            }
            lat += 0.7;
        }
    }

    #[test]
    fn test_poles_do_not_blow_up() {
        let projector = GeoVectorProjector::default();
        for lat in [90.0, -90.0] {
            let glyph = projector.project(&record(lat, 0.0, 10.0, 270.0, 5.0));
            assert!(glyph.end.is_finite());
        }
    }

    #[test]
    fn test_altitude_color_extremes() {
        let projector = GeoVectorProjector::default();
        assert_eq!(projector.altitude_color(0.0), viridis(0.0));
        assert_eq!(projector.altitude_color(40.0), viridis(1.0));
        assert_eq!(projector.altitude_color(55.0), viridis(1.0));
        assert_eq!(projector.altitude_color(-3.0), viridis(0.0));
    }

    #[test]
    fn test_altitude_color_follows_fraction_of_max() {
        let projector = GeoVectorProjector::default();
        for i in 0..=80 {
            let altitude = f64::from(i) * 0.5;
            assert_eq!(
                projector.altitude_color(altitude),
                viridis(altitude / 40.0),
                "altitude {altitude} km"
            );
        }
        // Increasing altitude walks the ramp away from the low end
        assert_ne!(projector.altitude_color(10.0), projector.altitude_color(30.0));
    }

    #[test]
    fn test_same_altitude_same_color() {
        let projector = GeoVectorProjector::default();
        let a = projector.project(&record(1.0, 2.0, 3.0, 4.0, 17.25));
        let b = projector.project(&record(-50.0, 100.0, 60.0, 300.0, 17.25));
        assert_eq!(a.color, b.color);
    }

    #[test]
    fn test_custom_scale_factor() {
        let projector = GeoVectorProjector::new(ProjectorConfig {
            scale_factor: 1000.0,
            ..ProjectorConfig::default()
        });
        assert!((projector.vector_length_m(2.5) - 2500.0).abs() < 1e-9);
    }

    #[test]
    fn test_downwind_bearing_wraps() {
        assert!((GeoVectorProjector::downwind_bearing(0.0) - 180.0).abs() < 1e-12);
        assert!((GeoVectorProjector::downwind_bearing(270.0) - 90.0).abs() < 1e-12);
        assert!((GeoVectorProjector::downwind_bearing(540.0) - 0.0).abs() < 1e-12);
    }
}
