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

//! Top navigation bar: hour dropdown, home button, and feed status.

use balloon_client::{PollState, PollStatus, Route, HOUR_CHOICES};
use chrono::{DateTime, Utc};
use egui::{Color32, RichText};

/// Actions requested from the navigation bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavAction {
    Navigate(Route),
    Refresh,
}

/// Label for an hour entry in the dropdown
pub fn hour_label(hour: &str) -> String {
    format!("{hour} hours ago")
}

/// Human-readable age of the last successful fetch
pub fn format_age(last: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - last).num_minutes().max(0);
    match minutes {
        0 => "updated just now".to_string(),
        1 => "updated 1 minute ago".to_string(),
        m if m < 60 => format!("updated {m} minutes ago"),
        m => format!("updated {}h {}m ago", m / 60, m % 60),
    }
}

#[derive(Debug, Default)]
pub struct NavBar;

impl NavBar {
    pub fn show(
        ui: &mut egui::Ui,
        route: &Route,
        poll: &PollState,
        show_legend: &mut bool,
    ) -> Option<NavAction> {
        let mut action = None;

        ui.horizontal(|ui| {
            ui.label(RichText::new("Balloon Winds").strong().size(15.0));
            ui.separator();

            if ui.selectable_label(*route == Route::Home, "Home").clicked() {
                action = Some(NavAction::Navigate(Route::Home));
            }

            let selected_text = match route {
                Route::Hour(hour) => hour_label(hour),
                _ => "Select hour".to_string(),
            };
            egui::ComboBox::from_id_salt("hour_select")
                .selected_text(selected_text)
                .height(400.0)
                .show_ui(ui, |ui| {
                    for hour in HOUR_CHOICES {
                        let target = Route::hour(hour);
                        if ui
                            .selectable_label(*route == target, hour_label(&hour.to_string()))
                            .clicked()
                        {
                            action = Some(NavAction::Navigate(target));
                        }
                    }
                });

            ui.checkbox(show_legend, "Legend");

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("⟳ Refresh").clicked() {
                    action = Some(NavAction::Refresh);
                }

                match &poll.status {
                    PollStatus::Loading => {
                        ui.spinner();
                        ui.label(RichText::new("Loading...").color(Color32::GRAY));
                    }
                    PollStatus::Ready => {
                        if let Some(last) = poll.last_success {
                            ui.label(RichText::new(format_age(last, Utc::now())).color(Color32::GRAY));
                        }
                    }
                    PollStatus::Failed(message) => {
                        ui.label(RichText::new(format!("Error: {message}")).color(Color32::from_rgb(220, 50, 50)))
                            .on_hover_text(message);
                    }
                }

                ui.label(RichText::new(route.path()).monospace().color(Color32::GRAY));
            });
        });

        action
    }
}
