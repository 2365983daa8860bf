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

//! Page routing for hourly snapshots.
//!
//! Two pages exist: the home page with instructions and `/hour/{hour}` showing
//! the map for one hour. The hour segment is not validated; it is matched
//! directly against the dataset's keys.

use std::fmt;

use crate::model::{BalloonRecord, HourlyDataset};

/// Hours offered in the navigation dropdown.
pub const HOUR_CHOICES: std::ops::Range<u32> = 0..24;

const HOUR_PREFIX: &str = "/hour/";

/// A parsed navigation path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Home,
    Hour(String),
    NotFound(String),
}

impl Route {
    /// Parse a path such as `/` or `/hour/5`.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let trimmed = if path.len() > 1 {
            path.strip_suffix('/').unwrap_or(path)
        } else {
            path
        };

        if trimmed == "/" || trimmed.is_empty() {
            return Self::Home;
        }

        match trimmed.strip_prefix(HOUR_PREFIX) {
            Some(hour) if !hour.is_empty() && !hour.contains('/') => Self::Hour(hour.to_string()),
            _ => Self::NotFound(path.to_string()),
        }
    }

    #[must_use]
    pub fn hour(hour: u32) -> Self {
        Self::Hour(hour.to_string())
    }

    /// Render the route back into a path.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            Self::Hour(hour) => format!("{HOUR_PREFIX}{hour}"),
            Self::NotFound(path) => path.clone(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// What the application should show for a route.
#[derive(Debug, Clone, PartialEq)]
pub enum View<'a> {
    /// Static instructions on the home page.
    Instructions,
    /// Map of one hour's balloons.
    Map {
        hour: &'a str,
        records: &'a [BalloonRecord],
    },
    /// The hour is absent or upstream flagged it as corrupted.
    HourError { hour: &'a str },
    NotFound,
}

/// Resolves routes against the current dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct HourRouter;

impl HourRouter {
    #[must_use]
    pub fn resolve<'a>(dataset: &'a HourlyDataset, route: &'a Route) -> View<'a> {
        match route {
            Route::Home => View::Instructions,
            Route::Hour(hour) => match dataset.records(hour) {
                Some(records) => View::Map { hour, records },
                None => View::HourError { hour },
            },
            Route::NotFound(_) => View::NotFound,
        }
    }
}
