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

//! Map view: base tiles, wind-arrow overlay, popups, and the altitude legend.
//!
//! The overlay manager owns the glyph set; this module only projects it to
//! the screen each frame and routes clicks back to the manager.

use balloon_client::{
    AltitudeLegend, ArrowGlyph, ArrowOverlayManager, BalloonRecord, GeoPoint, GeoVectorProjector,
    GlyphPart, Rgb,
};
use egui::{Align2, Color32, FontId, Pos2, Rect, Sense, Shape, Stroke, Vec2};

use crate::tiles::{TileManager, WebMercator, MAX_MERCATOR_LAT};

const MIN_ZOOM: f64 = 1.0;
const MAX_ZOOM: f64 = 10.0;

// Extra pixels of slack around thin shapes when hit testing
const CLICK_TOLERANCE_PX: f32 = 3.0;

const OSM_COPYRIGHT_URL: &str = "https://www.openstreetmap.org/copyright";

fn to_color32(color: Rgb) -> Color32 {
    Color32::from_rgb(color.r, color.g, color.b)
}

/// Unit vector on screen for a bearing measured clockwise from north
fn bearing_direction(bearing_deg: f64) -> Vec2 {
    let rad = bearing_deg.to_radians();
    Vec2::new(rad.sin() as f32, -rad.cos() as f32)
}

/// Triangle for an arrowhead centered on `center`, apex pointing along the bearing
pub fn arrowhead_points(center: Pos2, bearing_deg: f64, size: f32) -> [Pos2; 3] {
    let dir = bearing_direction(bearing_deg);
    let perp = Vec2::new(-dir.y, dir.x);
    let half = size / 2.0;
    [
        center + dir * half,
        center - dir * half + perp * half,
        center - dir * half - perp * half,
    ]
}

/// Shortest distance from `p` to the segment `a`-`b`
pub fn distance_to_segment(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

pub fn point_in_triangle(p: Pos2, tri: [Pos2; 3]) -> bool {
    let cross = |a: Pos2, b: Pos2, c: Pos2| (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    let d1 = cross(tri[0], tri[1], p);
    let d2 = cross(tri[1], tri[2], p);
    let d3 = cross(tri[2], tri[0], p);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Viewport state used to place geographic points on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: f64,
    pub screen_center: Pos2,
}

impl Viewport {
    pub fn to_screen(&self, point: GeoPoint) -> Pos2 {
        let dx = WebMercator::lon_to_x(point.lon, self.zoom) - WebMercator::lon_to_x(self.center_lon, self.zoom);
        let dy = WebMercator::lat_to_y(point.lat, self.zoom) - WebMercator::lat_to_y(self.center_lat, self.zoom);
        self.screen_center + Vec2::new(dx as f32, dy as f32)
    }

    /// Move the center by a screen-space drag
    pub fn pan_by(&mut self, delta: Vec2) {
        let x = WebMercator::lon_to_x(self.center_lon, self.zoom) - f64::from(delta.x);
        let y = WebMercator::lat_to_y(self.center_lat, self.zoom) - f64::from(delta.y);
        let world = WebMercator::world_size(self.zoom);

        self.center_lon = WebMercator::x_to_lon(x.rem_euclid(world), self.zoom);
        self.center_lat = WebMercator::y_to_lat(y.clamp(0.0, world), self.zoom)
            .clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    }
}

/// Screen-space geometry for one glyph, recomputed every frame
struct ScreenGlyph {
    start: Pos2,
    end: Pos2,
    head: [Pos2; 3],
}

impl ScreenGlyph {
    fn new(glyph: &ArrowGlyph, viewport: &Viewport) -> Self {
        let start = viewport.to_screen(glyph.line.start);
        let end = viewport.to_screen(glyph.line.end);
        let head = arrowhead_points(end, glyph.arrowhead.rotation_deg, glyph.arrowhead.size_px);
        Self { start, end, head }
    }

    fn hit(&self, p: Pos2, line_width: f32) -> Option<GlyphPart> {
        if point_in_triangle(p, self.head) {
            Some(GlyphPart::Arrowhead)
        } else if distance_to_segment(p, self.start, self.end) <= line_width / 2.0 + CLICK_TOLERANCE_PX {
            Some(GlyphPart::Line)
        } else {
            None
        }
    }
}

/// Base tile map with the wind-arrow overlay and altitude legend
#[derive(Debug)]
pub struct MapView {
    viewport: Viewport,
    tile_manager: TileManager,
    overlay: ArrowOverlayManager,
    legend: AltitudeLegend,
    pub show_legend: bool,
    tile_status: Option<String>,
}

impl MapView {
    pub fn new(tile_manager: TileManager, projector: GeoVectorProjector, zoom: f32, show_legend: bool) -> Self {
        Self {
            viewport: Viewport {
                center_lat: 0.0,
                center_lon: 0.0,
                zoom: f64::from(zoom).clamp(MIN_ZOOM, MAX_ZOOM),
                screen_center: Pos2::ZERO,
            },
            tile_manager,
            overlay: ArrowOverlayManager::new(projector),
            legend: AltitudeLegend::new(),
            show_legend,
            tile_status: None,
        }
    }

    /// Drop every glyph, e.g. when leaving the map page
    pub fn clear_overlay(&mut self) {
        self.overlay.clear();
    }

    pub fn glyph_count(&self) -> usize {
        self.overlay.line_count()
    }

    pub fn retry_failed_tiles(&self) {
        self.tile_manager.retry_failed();
    }

    /// Draw the map for one hour's records
    pub fn show(&mut self, ui: &mut egui::Ui, hour: &str, generation: u64, records: &[BalloonRecord]) {
        self.overlay.sync(hour, generation, records);

        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let rect = response.rect;
        self.viewport.screen_center = rect.center();

        painter.rect_filled(rect, 0.0, Color32::from_rgb(170, 211, 223));

        self.handle_zoom(ui, &response);
        if response.dragged() {
            self.viewport.pan_by(response.drag_delta());
        }

        self.draw_tiles(ui.ctx(), &painter, rect);

        let screen_glyphs: Vec<ScreenGlyph> = self
            .overlay
            .glyphs()
            .iter()
            .map(|glyph| ScreenGlyph::new(glyph, &self.viewport))
            .collect();

        for (glyph, screen) in self.overlay.glyphs().iter().zip(&screen_glyphs) {
            let color = to_color32(glyph.line.color)
                .gamma_multiply(balloon_client::overlay::LINE_OPACITY);
            painter.line_segment(
                [screen.start, screen.end],
                Stroke::new(balloon_client::overlay::LINE_WIDTH_PX, color),
            );
            painter.add(Shape::convex_polygon(
                screen.head.to_vec(),
                to_color32(glyph.arrowhead.color),
                Stroke::NONE,
            ));
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.handle_click(pos, rect, &screen_glyphs);
            }
        }

        if response.hovered() {
            if let Some(pos) = response.hover_pos() {
                let over_glyph = screen_glyphs
                    .iter()
                    .any(|g| g.hit(pos, balloon_client::overlay::LINE_WIDTH_PX).is_some());
                if over_glyph {
                    ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
                }
            }
        }

        self.draw_attribution(&painter, rect);
        self.draw_tile_status(&painter, rect);
        if self.show_legend {
            self.draw_legend(&painter, rect);
        }

        self.show_popup(ui.ctx(), rect);
    }

    fn handle_zoom(&mut self, ui: &egui::Ui, response: &egui::Response) {
        if !response.hovered() {
            return;
        }
        let (scroll, pinch) = ui.ctx().input(|i| (i.smooth_scroll_delta.y, i.zoom_delta()));
        let mut change = f64::from(scroll) / 200.0;
        if (pinch - 1.0).abs() > 0.001 {
            change += f64::from(pinch.log2());
        }
        if change.abs() > f64::EPSILON {
            self.viewport.zoom = (self.viewport.zoom + change).clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    fn draw_tiles(&mut self, ctx: &egui::Context, painter: &egui::Painter, rect: Rect) {
        let visible = TileManager::get_visible_tiles(
            self.viewport.center_lat,
            self.viewport.center_lon,
            self.viewport.zoom,
            rect.width(),
            rect.height(),
        );

        let mut rendered = 0;
        for tile in visible {
            if let Some(texture) = self.tile_manager.get_tile(tile.coord, ctx) {
                let tile_rect = Rect::from_min_size(
                    rect.center() + Vec2::new(tile.offset_x, tile.offset_y),
                    Vec2::splat(tile.size),
                );
                painter.image(
                    texture.id(),
                    tile_rect,
                    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                    Color32::WHITE,
                );
                rendered += 1;
            }
        }

        let errors = self.tile_manager.get_error_count();
        if errors > 0 {
            self.tile_status = Some(format!("Failed to load {errors} tiles"));
        } else if self.tile_manager.has_loading_tiles() {
            self.tile_status = Some("Loading map tiles...".to_string());
        } else if rendered > 0 {
            self.tile_status = None;
        }
    }

    fn handle_click(&mut self, pos: Pos2, rect: Rect, screen_glyphs: &[ScreenGlyph]) {
        if attribution_rect(rect).contains(pos) {
            if let Err(e) = webbrowser::open(OSM_COPYRIGHT_URL) {
                log::warn!("Failed to open browser: {e}");
            }
            return;
        }

        // Topmost (last drawn) glyph wins
        let hit = screen_glyphs
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, g)| g.hit(pos, balloon_client::overlay::LINE_WIDTH_PX).map(|part| (i, part)));

        match hit {
            Some((index, part)) => self.overlay.open_popup(index, part),
            None => self.overlay.close_popup(),
        }
    }

    fn show_popup(&mut self, ctx: &egui::Context, rect: Rect) {
        let Some((glyph, part)) = self.overlay.open_popup_glyph() else {
            return;
        };

        let anchor_geo = match part {
            GlyphPart::Line => GeoPoint::new(
                (glyph.line.start.lat + glyph.line.end.lat) / 2.0,
                (glyph.line.start.lon + glyph.line.end.lon) / 2.0,
            ),
            GlyphPart::Arrowhead => glyph.arrowhead.tip,
        };
        let anchor = self.viewport.to_screen(anchor_geo);
        if !rect.contains(anchor) {
            return;
        }

        let popup = glyph.popup.clone();
        let mut close = false;

        egui::Area::new(egui::Id::new("glyph_popup"))
            .order(egui::Order::Foreground)
            .fixed_pos(anchor + Vec2::new(8.0, -8.0))
            .pivot(Align2::LEFT_BOTTOM)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                            if ui.small_button("✕").clicked() {
                                close = true;
                            }
                        });
                    });
                    for line in popup.lines() {
                        ui.horizontal(|ui| match line.split_once(": ") {
                            Some((label, value)) => {
                                ui.label(egui::RichText::new(format!("{label}:")).strong());
                                ui.label(value);
                            }
                            None => {
                                ui.label(line);
                            }
                        });
                    }
                });
            });

        if close {
            self.overlay.close_popup();
        }
    }

    fn draw_legend(&self, painter: &egui::Painter, rect: Rect) {
        let swatch = Vec2::new(20.0, 10.0);
        let padding = 10.0;
        let width = swatch.x * self.legend.swatches.len() as f32 + padding * 2.0;
        let height = 62.0;

        let legend_rect = Rect::from_min_size(
            rect.right_bottom() - Vec2::new(width + 10.0, height + 10.0),
            Vec2::new(width, height),
        );

        painter.rect_filled(legend_rect, 5.0, Color32::WHITE);
        painter.rect_stroke(
            legend_rect,
            5.0,
            Stroke::new(1.0, Color32::from_black_alpha(77)),
            egui::StrokeKind::Outside,
        );

        let mut cursor = legend_rect.left_top() + Vec2::splat(padding);
        painter.text(
            cursor,
            Align2::LEFT_TOP,
            self.legend.title,
            FontId::proportional(12.0),
            Color32::BLACK,
        );
        cursor.y += 18.0;

        for (i, color) in self.legend.swatches.iter().enumerate() {
            let min = cursor + Vec2::new(swatch.x * i as f32, 0.0);
            painter.rect_filled(Rect::from_min_size(min, swatch), 0.0, to_color32(*color));
        }
        cursor.y += swatch.y + 4.0;

        painter.text(
            cursor,
            Align2::LEFT_TOP,
            self.legend.min_label,
            FontId::proportional(11.0),
            Color32::DARK_GRAY,
        );
        painter.text(
            Pos2::new(legend_rect.right() - padding, cursor.y),
            Align2::RIGHT_TOP,
            self.legend.max_label,
            FontId::proportional(11.0),
            Color32::DARK_GRAY,
        );
    }

    fn draw_attribution(&self, painter: &egui::Painter, rect: Rect) {
        let area = attribution_rect(rect);
        painter.rect_filled(area, 2.0, Color32::from_white_alpha(200));
        painter.text(
            area.left_center() + Vec2::new(4.0, 0.0),
            Align2::LEFT_CENTER,
            "© OpenStreetMap contributors",
            FontId::proportional(10.0),
            Color32::from_rgb(0, 80, 160),
        );
    }

    fn draw_tile_status(&self, painter: &egui::Painter, rect: Rect) {
        let Some(ref message) = self.tile_status else {
            return;
        };
        let is_error = message.starts_with("Failed");
        let bg_color = if is_error {
            Color32::from_rgb(220, 50, 50)
        } else {
            Color32::from_rgb(255, 200, 100)
        };

        let pos = rect.center_top() + Vec2::new(0.0, 20.0);
        let galley = painter.layout_no_wrap(message.clone(), FontId::proportional(12.0), Color32::WHITE);
        let bubble = Rect::from_center_size(pos, galley.size() + Vec2::new(24.0, 12.0));
        painter.rect_filled(bubble, 5.0, bg_color);
        painter.text(pos, Align2::CENTER_CENTER, message, FontId::proportional(12.0), Color32::WHITE);
    }
}

fn attribution_rect(map_rect: Rect) -> Rect {
    Rect::from_min_size(
        map_rect.left_bottom() + Vec2::new(4.0, -20.0),
        Vec2::new(160.0, 16.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport {
            center_lat: 0.0,
            center_lon: 0.0,
            zoom: 2.0,
            screen_center: Pos2::new(400.0, 300.0),
        }
    }

    #[test]
    fn test_center_projects_to_screen_center() {
        let vp = viewport();
        assert_eq!(vp.to_screen(GeoPoint::new(0.0, 0.0)), Pos2::new(400.0, 300.0));
    }

    #[test]
    fn test_east_is_right_north_is_up() {
        let vp = viewport();
        let east = vp.to_screen(GeoPoint::new(0.0, 10.0));
        let north = vp.to_screen(GeoPoint::new(10.0, 0.0));
        assert!(east.x > 400.0);
        assert!(north.y < 300.0);
    }

    #[test]
    fn test_pan_moves_center() {
        let mut vp = viewport();
        // Dragging the map left reveals terrain to the east
        vp.pan_by(Vec2::new(-100.0, 0.0));
        assert!(vp.center_lon > 0.0);
        assert!(vp.center_lat.abs() < 1e-9);

        vp.pan_by(Vec2::new(0.0, 100.0));
        assert!(vp.center_lat > 0.0);
    }

    #[test]
    fn test_pan_wraps_longitude() {
        let mut vp = viewport();
        vp.pan_by(Vec2::new(-600.0, 0.0));
        assert!(vp.center_lon >= -180.0 && vp.center_lon <= 180.0);
    }

    #[test]
    fn test_arrowhead_points_north() {
        let tri = arrowhead_points(Pos2::new(0.0, 0.0), 0.0, 16.0);
        // Apex is above the center on screen
        assert!((tri[0].x).abs() < 1e-4);
        assert!((tri[0].y + 8.0).abs() < 1e-4);
        assert!(tri[1].y > 0.0 && tri[2].y > 0.0);
    }

    #[test]
    fn test_arrowhead_points_east() {
        let tri = arrowhead_points(Pos2::new(0.0, 0.0), 90.0, 16.0);
        assert!((tri[0].x - 8.0).abs() < 1e-4);
        assert!(tri[0].y.abs() < 1e-4);
    }

    #[test]
    fn test_distance_to_segment() {
        let a = Pos2::new(0.0, 0.0);
        let b = Pos2::new(10.0, 0.0);
        assert!((distance_to_segment(Pos2::new(5.0, 3.0), a, b) - 3.0).abs() < 1e-5);
        assert!((distance_to_segment(Pos2::new(-4.0, 3.0), a, b) - 5.0).abs() < 1e-5);
        assert!((distance_to_segment(Pos2::new(2.0, 2.0), a, a) - 8_f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_point_in_triangle() {
        let tri = arrowhead_points(Pos2::new(50.0, 50.0), 45.0, 16.0);
        assert!(point_in_triangle(Pos2::new(50.0, 50.0), tri));
        assert!(!point_in_triangle(Pos2::new(80.0, 80.0), tri));
    }

    #[test]
    fn test_screen_glyph_hit_parts() {
        let record = BalloonRecord {
            latitude: 0.0,
            longitude: 0.0,
            wind_speed: 20.0,
            wind_direction: 270.0,
            altitude: 10.0,
        };
        let mut overlay = ArrowOverlayManager::default();
        overlay.rebuild(&[record]);
        let vp = viewport();
        let screen = ScreenGlyph::new(&overlay.glyphs()[0], &vp);

        assert_eq!(screen.hit(screen.end, 5.0), Some(GlyphPart::Arrowhead));
        let mid = screen.start + (screen.end - screen.start) * 0.25;
        assert_eq!(screen.hit(mid, 5.0), Some(GlyphPart::Line));
        assert_eq!(screen.hit(screen.start + Vec2::new(0.0, 40.0), 5.0), None);
    }
}
