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

//! Application configuration management.
//!
//! Settings are persisted as TOML through `confy`. The data endpoint can be
//! overridden per run from the command line or the `BALLOON_DATA_URL`
//! environment variable without touching the stored file.

use std::time::Duration;

use balloon_client::projector::DEFAULT_SCALE_FACTOR;
use balloon_client::{PollerConfig, ProjectorConfig, DEFAULT_DATA_URL};
use log::warn;
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "balloon-winds";
const CONFIG_NAME: &str = "config";

/// Environment variable that overrides the configured data URL
pub const DATA_URL_ENV: &str = "BALLOON_DATA_URL";

/// Default OpenStreetMap raster tile template
pub const DEFAULT_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Where the effective data URL came from, for display in the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSource {
    CommandLine,
    Environment,
    ConfigFile,
}

impl UrlSource {
    pub fn label(self) -> &'static str {
        match self {
            UrlSource::CommandLine => "command line",
            UrlSource::Environment => "environment variable",
            UrlSource::ConfigFile => "config file",
        }
    }
}

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    /// Endpoint returning the hourly balloon dataset
    #[serde(default = "default_data_url")]
    pub data_url: String,

    /// Shortest delay between polls, in minutes
    #[serde(default = "default_poll_min_minutes")]
    pub poll_min_minutes: u64,

    /// Longest delay between polls, in minutes
    #[serde(default = "default_poll_max_minutes")]
    pub poll_max_minutes: u64,

    /// Initial map zoom level (1.0 - 10.0)
    #[serde(default = "default_zoom")]
    pub default_zoom: f32,

    /// Meters of drawn arrow per km/h of wind
    #[serde(default = "default_arrow_scale")]
    pub arrow_scale: f64,

    /// Raster tile URL template with {z}, {x} and {y} placeholders
    #[serde(default = "default_tile_url")]
    pub tile_url: String,

    /// Show the altitude legend
    #[serde(default = "default_true")]
    pub show_legend: bool,

    /// Hour viewed when the app was last closed
    #[serde(default)]
    pub last_hour: Option<String>,
}

// Default value functions for serde
fn default_data_url() -> String {
    DEFAULT_DATA_URL.to_string()
}

/// Shortest accepted poll interval, in minutes.
const MIN_POLL_MINUTES: u64 = 1;

fn default_poll_min_minutes() -> u64 {
    8
}

fn default_poll_max_minutes() -> u64 {
    13
}

fn default_zoom() -> f32 {
    2.0
}

fn default_arrow_scale() -> f64 {
    DEFAULT_SCALE_FACTOR
}

fn default_tile_url() -> String {
    DEFAULT_TILE_URL.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_url: default_data_url(),
            poll_min_minutes: default_poll_min_minutes(),
            poll_max_minutes: default_poll_max_minutes(),
            default_zoom: default_zoom(),
            arrow_scale: default_arrow_scale(),
            tile_url: default_tile_url(),
            show_legend: true,
            last_hour: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from disk
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    /// Resolve the data URL: command line first, then environment, then config
    pub fn resolve_data_url(&self, cli_url: Option<&str>) -> (String, UrlSource) {
        let env_url = std::env::var(DATA_URL_ENV).ok();
        self.resolve_data_url_from(cli_url, env_url.as_deref())
    }

    fn resolve_data_url_from(&self, cli_url: Option<&str>, env_url: Option<&str>) -> (String, UrlSource) {
        if let Some(url) = cli_url.filter(|u| !u.is_empty()) {
            return (url.to_string(), UrlSource::CommandLine);
        }
        if let Some(url) = env_url.filter(|u| !u.is_empty()) {
            return (url.to_string(), UrlSource::Environment);
        }
        (self.data_url.clone(), UrlSource::ConfigFile)
    }

    /// Poller settings for the given endpoint
    pub fn poller_config(&self, url: String) -> PollerConfig {
        PollerConfig {
            url,
            min_interval: poll_interval("poll_min_minutes", self.poll_min_minutes),
            max_interval: poll_interval("poll_max_minutes", self.poll_max_minutes),
            ..PollerConfig::default()
        }
    }

    /// Projection settings, with the configured arrow scale
    pub fn projector_config(&self) -> ProjectorConfig {
        ProjectorConfig {
            scale_factor: self.arrow_scale,
            ..ProjectorConfig::default()
        }
    }
}

/// Minutes to a poll interval, never shorter than one minute
fn poll_interval(name: &str, minutes: u64) -> Duration {
    if minutes < MIN_POLL_MINUTES {
        warn!("{name} = {minutes} is below {MIN_POLL_MINUTES} minute, using {MIN_POLL_MINUTES}");
    }
    Duration::from_secs(minutes.max(MIN_POLL_MINUTES).saturating_mul(60))
}
