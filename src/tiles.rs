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

//! Base map tile layer.
//!
//! Raster tiles are downloaded on worker threads, cached on disk under the
//! user cache directory (keyed by the SHA-256 of the tile URL), and uploaded
//! as egui textures. Cached files older than a week are removed at startup.

use egui::{ColorImage, TextureHandle};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

pub const TILE_SIZE: f64 = 256.0;
const CACHE_DURATION_DAYS: u64 = 7;
const MAX_TILE_ZOOM: u8 = 19;
const USER_AGENT: &str = concat!("balloon-winds/", env!("CARGO_PKG_VERSION"));

/// Latitude limit of the square Web Mercator world
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Web Mercator projection utilities
#[derive(Debug)]
pub struct WebMercator;

impl WebMercator {
    /// Width of the whole world in pixels at a (possibly fractional) zoom
    pub fn world_size(zoom: f64) -> f64 {
        TILE_SIZE * 2_f64.powf(zoom)
    }

    /// Convert latitude to Web Mercator Y in world pixels
    pub fn lat_to_y(lat: f64, zoom: f64) -> f64 {
        let lat_rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0;
        y * Self::world_size(zoom)
    }

    /// Convert longitude to Web Mercator X in world pixels
    pub fn lon_to_x(lon: f64, zoom: f64) -> f64 {
        ((lon + 180.0) / 360.0) * Self::world_size(zoom)
    }

    /// Convert world pixel Y back to latitude
    pub fn y_to_lat(y: f64, zoom: f64) -> f64 {
        let n = y / Self::world_size(zoom);
        let lat_rad = (std::f64::consts::PI * (1.0 - 2.0 * n)).sinh().atan();
        lat_rad.to_degrees()
    }

    /// Convert world pixel X back to longitude
    pub fn x_to_lon(x: f64, zoom: f64) -> f64 {
        x / Self::world_size(zoom) * 360.0 - 180.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Fill the {z}/{x}/{y} placeholders of a URL template
    pub fn url(&self, template: &str) -> String {
        template
            .replace("{z}", &self.zoom.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }
}

/// One tile placed relative to the viewport center, in screen pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedTile {
    pub coord: TileCoord,
    pub offset_x: f32,
    pub offset_y: f32,
    pub size: f32,
}

pub enum TileState {
    Loading,
    Loaded(TextureHandle),
    Failed,
}

type TileMap = Arc<Mutex<HashMap<TileCoord, TileState>>>;

pub struct TileManager {
    url_template: String,
    cache_dir: PathBuf,
    client: reqwest::blocking::Client,
    tiles: TileMap,
    download_queue: Arc<Mutex<HashSet<TileCoord>>>,
}

impl std::fmt::Debug for TileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileManager")
            .field("url_template", &self.url_template)
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl TileManager {
    pub fn new(url_template: String) -> Self {
        let cache_dir = Self::get_cache_dir();

        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!("Failed to create tile cache directory: {e}");
        }

        Self::cleanup_old_tiles(&cache_dir);

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default tile HTTP client: {e}");
                reqwest::blocking::Client::new()
            });

        Self {
            url_template,
            cache_dir,
            client,
            tiles: Arc::new(Mutex::new(HashMap::new())),
            download_queue: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn get_cache_dir() -> PathBuf {
        let mut path = dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache"));
        path.push("balloon-winds");
        path.push("tiles");
        path
    }

    fn cache_path(&self, coord: TileCoord) -> PathBuf {
        cache_path_for(&self.cache_dir, &coord.url(&self.url_template))
    }

    fn cleanup_old_tiles(cache_dir: &Path) {
        let now = SystemTime::now();
        let max_age = Duration::from_secs(CACHE_DURATION_DAYS * 24 * 60 * 60);
        let mut removed = 0usize;

        if let Ok(entries) = fs::read_dir(cache_dir) {
            for entry in entries.flatten() {
                let expired = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok())
                    .is_some_and(|age| age > max_age);
                if expired && fs::remove_file(entry.path()).is_ok() {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            info!("Removed {removed} expired map tiles from cache");
        }
    }

    /// Get tile from memory or disk cache, or queue it for download
    pub fn get_tile(&self, coord: TileCoord, ctx: &egui::Context) -> Option<TextureHandle> {
        let Ok(mut tiles) = self.tiles.lock() else {
            return None;
        };

        match tiles.get(&coord) {
            Some(TileState::Loaded(texture)) => Some(texture.clone()),
            Some(TileState::Loading | TileState::Failed) => None,
            None => {
                let cache_path = self.cache_path(coord);
                if cache_path.exists() {
                    match fs::read(&cache_path)
                        .map_err(|e| e.to_string())
                        .and_then(|bytes| decode_tile(&bytes, coord, ctx))
                    {
                        Ok(texture) => {
                            tiles.insert(coord, TileState::Loaded(texture.clone()));
                            return Some(texture);
                        }
                        Err(e) => warn!("Failed to load cached tile {coord:?}: {e}"),
                    }
                }

                tiles.insert(coord, TileState::Loading);
                drop(tiles);
                self.queue_download(coord, ctx.clone());
                None
            }
        }
    }

    fn queue_download(&self, coord: TileCoord, ctx: egui::Context) {
        let Ok(mut queue) = self.download_queue.lock() else {
            return;
        };
        if !queue.insert(coord) {
            return;
        }

        let url = coord.url(&self.url_template);
        let cache_path = self.cache_path(coord);
        let client = self.client.clone();
        let tiles = Arc::clone(&self.tiles);
        let queue = Arc::clone(&self.download_queue);

        std::thread::spawn(move || {
            let state = match download_tile(&client, &url, &cache_path, coord, &ctx) {
                Ok(texture) => TileState::Loaded(texture),
                Err(e) => {
                    warn!("Failed to fetch tile {url}: {e}");
                    TileState::Failed
                }
            };
            if let Ok(mut tiles) = tiles.lock() {
                tiles.insert(coord, state);
            }
            if let Ok(mut queue) = queue.lock() {
                queue.remove(&coord);
            }
            ctx.request_repaint();
        });
    }

    /// Forget failed tiles so they are requested again on the next frame
    pub fn retry_failed(&self) {
        if let Ok(mut tiles) = self.tiles.lock() {
            tiles.retain(|_, state| !matches!(state, TileState::Failed));
        }
    }

    /// All tiles needed to cover a viewport centered on the given point
    pub fn get_visible_tiles(
        center_lat: f64,
        center_lon: f64,
        zoom: f64,
        viewport_width: f32,
        viewport_height: f32,
    ) -> Vec<PlacedTile> {
        let tile_zoom = tile_zoom_for(zoom);
        let scale = 2_f64.powf(zoom - f64::from(tile_zoom));
        let tile_px = TILE_SIZE * scale;

        // Center in tile units at the tile zoom
        let center_tile_x = WebMercator::lon_to_x(center_lon, f64::from(tile_zoom)) / TILE_SIZE;
        let center_tile_y = WebMercator::lat_to_y(center_lat, f64::from(tile_zoom)) / TILE_SIZE;

        let tiles_wide = (f64::from(viewport_width) / tile_px).ceil() as i64 + 2;
        let tiles_high = (f64::from(viewport_height) / tile_px).ceil() as i64 + 2;

        let start_x = center_tile_x.floor() as i64 - tiles_wide / 2;
        let start_y = center_tile_y.floor() as i64 - tiles_high / 2;

        let max_tile = 1_i64 << tile_zoom;
        let mut placed = Vec::new();

        for dy in 0..tiles_high {
            for dx in 0..tiles_wide {
                let tile_x = start_x + dx;
                let tile_y = start_y + dy;

                // Latitude doesn't wrap
                if tile_y < 0 || tile_y >= max_tile {
                    continue;
                }

                // Longitude wraps around
                let wrapped_x = tile_x.rem_euclid(max_tile);

                placed.push(PlacedTile {
                    coord: TileCoord::new(wrapped_x as u32, tile_y as u32, tile_zoom),
                    offset_x: ((tile_x as f64 - center_tile_x) * tile_px) as f32,
                    offset_y: ((tile_y as f64 - center_tile_y) * tile_px) as f32,
                    size: tile_px as f32,
                });
            }
        }

        placed
    }

    pub fn has_loading_tiles(&self) -> bool {
        self.tiles
            .lock()
            .map(|tiles| tiles.values().any(|state| matches!(state, TileState::Loading)))
            .unwrap_or(false)
    }

    pub fn get_error_count(&self) -> usize {
        self.tiles
            .lock()
            .map(|tiles| tiles.values().filter(|state| matches!(state, TileState::Failed)).count())
            .unwrap_or(0)
    }
}

/// Integer zoom used for fetching tiles at a fractional view zoom
pub fn tile_zoom_for(zoom: f64) -> u8 {
    zoom.round().clamp(0.0, f64::from(MAX_TILE_ZOOM)) as u8
}

fn cache_path_for(cache_dir: &Path, url: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    cache_dir.join(format!("{:x}.png", hasher.finalize()))
}

fn download_tile(
    client: &reqwest::blocking::Client,
    url: &str,
    cache_path: &Path,
    coord: TileCoord,
    ctx: &egui::Context,
) -> Result<TextureHandle, String> {
    debug!("Downloading tile: {url}");

    let response = client.get(url).send().map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }
    let bytes = response.bytes().map_err(|e| e.to_string())?;

    if let Err(e) = fs::write(cache_path, &bytes) {
        warn!("Failed to save tile to cache: {e}");
    }

    decode_tile(&bytes, coord, ctx)
}

fn decode_tile(bytes: &[u8], coord: TileCoord, ctx: &egui::Context) -> Result<TextureHandle, String> {
    let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    let rgba = img.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let color_image = ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());

    Ok(ctx.load_texture(
        format!("tile_{}_{}/{}", coord.zoom, coord.x, coord.y),
        color_image,
        egui::TextureOptions::LINEAR,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mercator_round_trip() {
        for (lat, lon) in [(0.0, 0.0), (37.77, -122.42), (-33.87, 151.21), (60.0, 179.0)] {
            let x = WebMercator::lon_to_x(lon, 3.5);
            let y = WebMercator::lat_to_y(lat, 3.5);
            assert!((WebMercator::x_to_lon(x, 3.5) - lon).abs() < 1e-9);
            assert!((WebMercator::y_to_lat(y, 3.5) - lat).abs() < 1e-9);
        }
    }

    #[test]
    fn test_mercator_origin_is_world_center() {
        let size = WebMercator::world_size(2.0);
        assert!((size - 1024.0).abs() < 1e-9);
        assert!((WebMercator::lon_to_x(0.0, 2.0) - 512.0).abs() < 1e-9);
        assert!((WebMercator::lat_to_y(0.0, 2.0) - 512.0).abs() < 1e-9);
    }

    #[test]
    fn test_poles_clamped() {
        let y = WebMercator::lat_to_y(90.0, 2.0);
        assert!(y.is_finite());
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn test_tile_url_template() {
        let coord = TileCoord::new(3, 5, 4);
        assert_eq!(
            coord.url("https://tile.openstreetmap.org/{z}/{x}/{y}.png"),
            "https://tile.openstreetmap.org/4/3/5.png"
        );
    }

    #[test]
    fn test_visible_tiles_cover_world_at_zoom_two() {
        let tiles = TileManager::get_visible_tiles(0.0, 0.0, 2.0, 1024.0, 1024.0);
        let unique: HashSet<(u32, u32)> = tiles.iter().map(|t| (t.coord.x, t.coord.y)).collect();
        assert_eq!(unique.len(), 16);
        assert!(tiles.iter().all(|t| t.coord.zoom == 2 && t.coord.y < 4));
        assert!(tiles.iter().all(|t| (t.size - 256.0).abs() < f32::EPSILON));
    }

    #[test]
    fn test_fractional_zoom_scales_tiles() {
        let tiles = TileManager::get_visible_tiles(0.0, 0.0, 2.4, 800.0, 600.0);
        let expected = (256.0 * 2_f64.powf(0.4)) as f32;
        assert!(tiles.iter().all(|t| (t.size - expected).abs() < 1e-3));
    }

    #[test]
    fn test_cache_path_is_stable() {
        let dir = Path::new("/tmp/cache");
        let a = cache_path_for(dir, "https://example/1/2/3.png");
        let b = cache_path_for(dir, "https://example/1/2/3.png");
        let c = cache_path_for(dir, "https://example/1/2/4.png");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
