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

//! Balloon observation data model.
//!
//! The upstream feed is a JSON object keyed by hour offset ("0" through "23").
//! Each value is either an array of balloon observations or a string sentinel
//! describing why that hour's data is unavailable. An hour whose value has
//! neither shape is kept as [`HourSlice::Unavailable`] so the remaining hours
//! stay usable.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

/// One sounding balloon's position, wind, and altitude for a given hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalloonRecord {
    /// Latitude in degrees, -90 to 90.
    #[serde(rename = "lat", alias = "latitude")]
    pub latitude: f64,
    /// Longitude in degrees, -180 to 180.
    #[serde(rename = "lon", alias = "longitude")]
    pub longitude: f64,
    /// Wind speed in km/h.
    pub wind_speed: f64,
    /// Meteorological wind direction in degrees (the bearing the wind blows *from*).
    pub wind_direction: f64,
    /// Altitude in km.
    pub altitude: f64,
}

/// Contents of a single hour in the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HourSlice {
    /// Observations for every balloon reported in that hour.
    Records(Vec<BalloonRecord>),
    /// Upstream marked the hour as missing or corrupted.
    Unavailable(String),
}

impl HourSlice {
    /// Records for this hour, or `None` when upstream sent an error sentinel.
    #[must_use]
    pub fn records(&self) -> Option<&[BalloonRecord]> {
        match self {
            Self::Records(records) => Some(records),
            Self::Unavailable(_) => None,
        }
    }

    /// Decode one hour's raw value, downgrading anything malformed to `Unavailable`.
    fn from_value(hour: &str, value: serde_json::Value) -> Self {
        match serde_json::from_value(value) {
            Ok(slice) => slice,
            Err(e) => {
                warn!("Hour {hour} has malformed data: {e}");
                Self::Unavailable(format!("malformed data: {e}"))
            }
        }
    }
}

/// Full snapshot of the feed, keyed by hour offset.
///
/// The dataset is replaced wholesale on every successful poll and never
/// mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HourlyDataset {
    hours: HashMap<String, HourSlice>,
}

impl HourlyDataset {
    /// Build a dataset from hour key / slice pairs.
    pub fn from_slices<K, I>(slices: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, HourSlice)>,
    {
        Self {
            hours: slices.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Parse a dataset from the raw JSON body returned by the feed.
    ///
    /// Only a body that is not a JSON object fails. Malformed hours are kept
    /// as unavailable.
    pub fn from_json(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// Look up one hour by its key.
    #[must_use]
    pub fn slice(&self, hour: &str) -> Option<&HourSlice> {
        self.hours.get(hour)
    }

    /// Renderable records for an hour. Absent keys and error sentinels both yield `None`.
    #[must_use]
    pub fn records(&self, hour: &str) -> Option<&[BalloonRecord]> {
        self.slice(hour).and_then(HourSlice::records)
    }

    /// Hour keys present in the snapshot, in numeric order.
    ///
    /// Keys that are not numbers sort after the numeric ones.
    #[must_use]
    pub fn hours(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.hours.keys().map(String::as_str).collect();
        keys.sort_by_key(|k| (k.parse::<u32>().unwrap_or(u32::MAX), *k));
        keys
    }

    /// Total number of renderable records across every hour.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.hours
            .values()
            .filter_map(HourSlice::records)
            .map(<[BalloonRecord]>::len)
            .sum()
    }

    /// Number of hours that carry an error sentinel.
    #[must_use]
    pub fn unavailable_count(&self) -> usize {
        self.hours
            .values()
            .filter(|slice| matches!(slice, HourSlice::Unavailable(_)))
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }
}

impl<'de> Deserialize<'de> for HourlyDataset {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = HashMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let hours = raw
            .into_iter()
            .map(|(hour, value)| {
                let slice = HourSlice::from_value(&hour, value);
                (hour, slice)
            })
            .collect();
        Ok(Self { hours })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "0": [
            {"lat": 10.0, "lon": 20.0, "wind_speed": 12.5, "wind_direction": 270.0, "altitude": 18.2},
            {"latitude": -33.5, "longitude": 151.2, "wind_speed": 3.0, "wind_direction": 45.0, "altitude": 5.0}
        ],
        "5": "corrupted",
        "12": []
    }"#;

    #[test]
    fn test_parse_mixed_dataset() {
        let dataset = HourlyDataset::from_json(SAMPLE.as_bytes()).unwrap();

        let records = dataset.records("0").unwrap();
        assert_eq!(records.len(), 2);
        assert!((records[0].latitude - 10.0).abs() < f64::EPSILON);
        assert!((records[1].longitude - 151.2).abs() < f64::EPSILON);

        assert_eq!(
            dataset.slice("5"),
            Some(&HourSlice::Unavailable("corrupted".to_string()))
        );
        assert!(dataset.records("5").is_none());
        assert!(dataset.records("7").is_none());
        assert_eq!(dataset.records("12").map(<[BalloonRecord]>::len), Some(0));
    }

    #[test]
    fn test_hours_numeric_order() {
        let dataset = HourlyDataset::from_json(SAMPLE.as_bytes()).unwrap();
        assert_eq!(dataset.hours(), vec!["0", "5", "12"]);
    }

    #[test]
    fn test_counts() {
        let dataset = HourlyDataset::from_json(SAMPLE.as_bytes()).unwrap();
        assert_eq!(dataset.record_count(), 2);
        assert_eq!(dataset.unavailable_count(), 1);
        assert!(!dataset.is_empty());
    }

    #[test]
    fn test_unexpected_hour_shape_is_unavailable() {
        let body = br#"{"0": 42, "1": {"lat": 1.0}, "2": []}"#;
        let dataset = HourlyDataset::from_json(body).unwrap();
        assert!(matches!(dataset.slice("0"), Some(HourSlice::Unavailable(_))));
        assert!(matches!(dataset.slice("1"), Some(HourSlice::Unavailable(_))));
        assert_eq!(dataset.records("2").map(<[BalloonRecord]>::len), Some(0));
        assert_eq!(dataset.unavailable_count(), 2);
    }

    #[test]
    fn test_incomplete_record_only_affects_its_hour() {
        let body = br#"{
            "0": [{"lat": 1.0, "lon": 2.0, "wind_speed": 3.0, "wind_direction": 4.0, "altitude": 5.0}],
            "1": [{"lat": 1.0, "lon": 2.0, "wind_speed": null, "wind_direction": 4.0, "altitude": 5.0}],
            "2": [{"lat": 1.0, "lon": 2.0}]
        }"#;
        let dataset = HourlyDataset::from_json(body).unwrap();
        assert_eq!(dataset.records("0").map(<[BalloonRecord]>::len), Some(1));
        assert!(dataset.records("1").is_none());
        assert!(dataset.records("2").is_none());
        assert_eq!(dataset.record_count(), 1);
    }

    #[test]
    fn test_reject_non_object_body() {
        assert!(HourlyDataset::from_json(br#"[1, 2, 3]"#).is_err());
        assert!(HourlyDataset::from_json(b"not json").is_err());
    }
}
