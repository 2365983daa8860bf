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

mod config;
mod map_view;
mod nav_bar;
mod tiles;

use std::sync::Arc;
use std::time::Duration;

use balloon_client::{
    DataPoller, GeoVectorProjector, HourRouter, HourlyDataset, PollState, PollStatus, Route, View,
};
use clap::Parser;
use config::{AppConfig, UrlSource};
use eframe::egui;
use egui::{Color32, RichText};
use log::{info, warn};
use map_view::MapView;
use nav_bar::{hour_label, NavAction, NavBar};
use tiles::TileManager;

/// Desktop map of weather-balloon wind vectors
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Dataset endpoint (overrides BALLOON_DATA_URL and the config file)
    #[arg(long)]
    url: Option<String>,

    /// Hour to open on startup (0-23)
    #[arg(long)]
    hour: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the configuration file location and exit
    #[arg(long)]
    config_path: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn main() -> Result<(), eframe::Error> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.config_path {
        match AppConfig::get_config_path() {
            Ok(path) => println!("{}", path.display()),
            Err(e) => eprintln!("Could not determine config path: {e}"),
        }
        return Ok(());
    }

    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });

    info!("Starting Balloon Winds...");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("Balloon Winds"),
        ..Default::default()
    };

    eframe::run_native(
        "Balloon Winds",
        options,
        Box::new(move |cc| Ok(Box::new(BalloonApp::new(cc.egui_ctx.clone(), config, &args)))),
    )
}

fn initial_route(cli_hour: Option<&str>, last_hour: Option<&str>) -> Route {
    cli_hour
        .or(last_hour)
        .map_or(Route::Home, |hour| Route::Hour(hour.to_string()))
}

struct BalloonApp {
    config: AppConfig,
    url_source: UrlSource,
    poller: DataPoller,
    route: Route,
    map_view: MapView,
}

impl std::fmt::Debug for BalloonApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalloonApp")
            .field("route", &self.route)
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}

impl BalloonApp {
    fn new(ctx: egui::Context, config: AppConfig, args: &Args) -> Self {
        let (url, url_source) = config.resolve_data_url(args.url.as_deref());
        info!("Using data URL {url} (from {})", url_source.label());

        let repaint_ctx = ctx.clone();
        let poller = DataPoller::spawn(
            config.poller_config(url),
            Arc::new(move || repaint_ctx.request_repaint()),
        );

        let map_view = MapView::new(
            TileManager::new(config.tile_url.clone()),
            GeoVectorProjector::new(config.projector_config()),
            config.default_zoom,
            config.show_legend,
        );

        let route = initial_route(args.hour.as_deref(), config.last_hour.as_deref());
        info!("Opening {route}");

        Self {
            config,
            url_source,
            poller,
            route,
            map_view,
        }
    }

    fn navigate(&mut self, route: Route) {
        if route != self.route {
            info!("Navigating to {route}");
            self.route = route;
        }
    }

    fn draw_page(&mut self, ui: &mut egui::Ui, poll: &PollState) {
        let Some(dataset) = poll.dataset.clone() else {
            self.map_view.clear_overlay();
            match poll.fatal_error() {
                Some(message) => Self::draw_message(ui, &format!("Error: {message}"), Color32::from_rgb(220, 50, 50)),
                None => Self::draw_message(ui, "Loading...", Color32::GRAY),
            }
            return;
        };

        match HourRouter::resolve(&dataset, &self.route) {
            View::Instructions => {
                self.map_view.clear_overlay();
                self.draw_instructions(ui, &dataset);
            }
            View::Map { hour, records } => {
                ui.vertical_centered(|ui| {
                    ui.heading(hour_label(hour));
                });
                if let Some(message) = poll.stale_error() {
                    ui.vertical_centered(|ui| {
                        ui.label(
                            RichText::new(format!("Showing older data, latest fetch failed: {message}"))
                                .color(Color32::from_rgb(220, 120, 30)),
                        );
                    });
                }
                self.map_view.show(ui, hour, poll.generation, records);
            }
            View::HourError { hour } => {
                self.map_view.clear_overlay();
                ui.vertical_centered(|ui| {
                    ui.heading(hour_label(hour));
                });
                Self::draw_message(
                    ui,
                    "Data for this hour is missing or corrupted.",
                    Color32::from_rgb(220, 50, 50),
                );
            }
            View::NotFound => {
                self.map_view.clear_overlay();
                Self::draw_message(ui, "Page not found.", Color32::GRAY);
            }
        }
    }

    fn draw_instructions(&self, ui: &mut egui::Ui, dataset: &HourlyDataset) {
        ui.vertical_centered(|ui| {
            ui.add_space(40.0);
            ui.heading("Wind Arrows on World Map");
            ui.add_space(12.0);
            ui.label("Pick an hour from the dropdown above to see where each balloon was and which way the wind carried it.");
            ui.label("Arrows point downwind, their length follows wind speed and their color follows altitude.");
            ui.label("Click an arrow or its head for the exact position, wind speed and altitude.");
            ui.add_space(12.0);
            ui.label(
                RichText::new(format!(
                    "{} hours loaded, {} balloon observations, {} hours unavailable",
                    dataset.hours().len(),
                    dataset.record_count(),
                    dataset.unavailable_count()
                ))
                .color(Color32::GRAY),
            );
            ui.label(
                RichText::new(format!(
                    "Source: {} ({})",
                    self.poller.url(),
                    self.url_source.label()
                ))
                .color(Color32::GRAY)
                .small(),
            );
        });
    }

    fn draw_message(ui: &mut egui::Ui, message: &str, color: Color32) {
        ui.vertical_centered(|ui| {
            ui.add_space(40.0);
            ui.label(RichText::new(message).color(color).size(16.0));
        });
    }
}

impl eframe::App for BalloonApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Keeps the "updated N minutes ago" text current
        ctx.request_repaint_after(Duration::from_secs(30));

        let poll = self.poller.snapshot();

        egui::TopBottomPanel::top("nav_bar").show(ctx, |ui| {
            let action = NavBar::show(ui, &self.route, &poll, &mut self.map_view.show_legend);
            match action {
                Some(NavAction::Navigate(route)) => self.navigate(route),
                Some(NavAction::Refresh) => {
                    self.poller.refresh_now();
                    self.map_view.retry_failed_tiles();
                }
                None => {}
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_page(ui, &poll);
        });

        if matches!(poll.status, PollStatus::Loading) {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}

impl Drop for BalloonApp {
    fn drop(&mut self) {
        self.poller.stop();
        self.map_view.clear_overlay();

        self.config.show_legend = self.map_view.show_legend;
        self.config.last_hour = match &self.route {
            Route::Hour(hour) => Some(hour.clone()),
            _ => None,
        };
        if let Err(e) = self.config.save() {
            warn!("Failed to save config: {e}");
        }
    }
}
