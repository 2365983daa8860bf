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

//! Balloon wind-vector client library.
//!
//! Everything the balloon wind map needs apart from the window itself:
//!
//! - **Data layer**: the hourly snapshot model ([`HourlyDataset`]) and a
//!   background [`DataPoller`] that refreshes it on a randomized interval
//! - **Geometry layer**: [`GeoVectorProjector`] turns one observation into a
//!   colored line segment pointing downwind
//! - **Overlay layer**: [`ArrowOverlayManager`] owns the glyphs for the hour
//!   on screen and rebuilds them when the data changes, with
//!   [`AltitudeLegend`] describing the shared color scale
//! - **Routing**: [`Route`] and [`HourRouter`] pick which hour to show
//!
//! # Example
//!
//! ```
//! use balloon_client::{ArrowOverlayManager, HourRouter, HourlyDataset, Route, View};
//!
//! let body = br#"{"0": [{"lat": 10.0, "lon": 20.0, "wind_speed": 0.01,
//!                        "wind_direction": 0.0, "altitude": 20.0}],
//!                 "1": "corrupted"}"#;
//! let dataset = HourlyDataset::from_json(body).unwrap();
//!
//! let route = Route::parse("/hour/0");
//! let mut overlay = ArrowOverlayManager::default();
//! if let View::Map { hour, records } = HourRouter::resolve(&dataset, &route) {
//!     overlay.sync(hour, 1, records);
//! }
//! assert_eq!(overlay.line_count(), 1);
//! ```

pub mod colormap;
pub mod legend;
pub mod model;
pub mod overlay;
pub mod poller;
pub mod projector;
pub mod router;

pub use colormap::{viridis, Rgb};
pub use legend::{AltitudeLegend, LEGEND_STEPS};
pub use model::{BalloonRecord, HourSlice, HourlyDataset};
pub use overlay::{ArrowGlyph, ArrowOverlayManager, Arrowhead, GlyphPart};
pub use poller::{
    ChangeNotifier, DataPoller, FetchError, PollState, PollStatus, PollerConfig, SharedPollState,
    DEFAULT_DATA_URL,
};
pub use projector::{GeoPoint, GeoVectorProjector, ProjectorConfig, VectorGlyph};
pub use router::{HourRouter, Route, View, HOUR_CHOICES};
