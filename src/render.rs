use crate::color::hex_to_rgb;
use crate::config::MapConfig;
use crate::district::SELECTED_PADDING;
use crate::session::MapSession;
use crate::types::Viewport;
use anyhow::{anyhow, Context, Result};
use image::{ImageBuffer, RgbaImage};
use rayon::prelude::*;
use std::path::Path;
use tracing::info;

const MAX_HEIGHT: u32 = 8192;
const MAX_LAT: f64 = 85.051_128;
const TILE_SIZE: f64 = 256.0;

#[derive(Clone, Copy)]
struct Fill {
    rgb: [u8; 3],
    opacity: f64,
}

impl Fill {
    fn new(hex: &str, opacity: f64) -> Self {
        Self { rgb: hex_to_rgb(hex), opacity }
    }
}

fn blend(base: [u8; 3], fill: Fill) -> [u8; 3] {
    let mix = |b: u8, f: u8| (f as f64 * fill.opacity + b as f64 * (1.0 - fill.opacity)).round() as u8;
    [mix(base[0], fill.rgb[0]), mix(base[1], fill.rgb[1]), mix(base[2], fill.rgb[2])]
}

// Web Mercator, in radians of projected y
fn mercator_y(lat: f64) -> f64 {
    let lat_rad = lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    (lat_rad.tan() + (1.0 / lat_rad.cos())).ln()
}

fn inverse_mercator_y(y: f64) -> f64 {
    y.sinh().atan().to_degrees()
}

/// Pixel grid over a viewport; the height follows the projected aspect ratio.
struct Projection {
    west: f64,
    lon_span: f64,
    top: f64,
    y_span: f64,
    width: u32,
    height: u32,
}

impl Projection {
    fn new(viewport: &Viewport, width: u32) -> Self {
        let lon_span = (viewport.east - viewport.west).max(f64::EPSILON);
        let top = mercator_y(viewport.north);
        let y_span = (top - mercator_y(viewport.south)).max(f64::EPSILON);
        let x_span = lon_span.to_radians();
        let height = ((width as f64) * y_span / x_span).round().clamp(1.0, MAX_HEIGHT as f64) as u32;
        Self { west: viewport.west, lon_span, top, y_span, width, height }
    }

    /// Geographic coordinate at the centre of a pixel.
    fn lon_lat(&self, px: u32, py: u32) -> (f64, f64) {
        let lon = self.west + (px as f64 + 0.5) / self.width as f64 * self.lon_span;
        let y = self.top - (py as f64 + 0.5) / self.height as f64 * self.y_span;
        (lon, inverse_mercator_y(y))
    }
}

/// What a slippy map shows at the configured centre and zoom, `width` pixels wide
/// with a 4:3 frame.
pub fn initial_viewport(map: &MapConfig, width: u32) -> Viewport {
    let [lat, lon] = map.center;
    let lon_span = (360.0 * width.max(1) as f64 / (TILE_SIZE * 2f64.powi(map.zoom.into()))).min(360.0);
    let half_y = lon_span.to_radians() * 0.375;
    let centre_y = mercator_y(lat);
    let (west, east) = if lon_span >= 360.0 {
        (-180.0, 180.0)
    } else {
        ((lon - lon_span / 2.0).max(-180.0), (lon + lon_span / 2.0).min(180.0))
    };
    Viewport {
        south: inverse_mercator_y(centre_y - half_y).max(-MAX_LAT),
        west,
        north: inverse_mercator_y(centre_y + half_y).min(MAX_LAT),
        east,
    }
}

/// Rasterises the session's applied layers. The view follows the selected district
/// when there is one, then the country layer's fitted bounds, then the initial map view.
pub fn render_snapshot(session: &MapSession, map: &MapConfig, width: u32, background: &str) -> Result<RgbaImage> {
    let selected_bounds = session.selected()
        .and_then(|id| session.districts()?.bounds(id))
        .map(|b| b.pad(SELECTED_PADDING));
    let viewport = selected_bounds
        .or(session.country_layer().viewport)
        .unwrap_or_else(|| initial_viewport(map, width));

    let projection = Projection::new(&viewport, width.max(1));
    info!(width = projection.width, height = projection.height, ?viewport, "Rendering snapshot");

    let country_fills: Vec<Fill> = session.country_view().features.iter()
        .map(|c| Fill::new(c.style.fill_color, c.style.fill_opacity))
        .collect();
    let district_fills: Vec<Fill> = session.district_view().iter()
        .map(|d| Fill::new(d.style.fill_color, d.style.fill_opacity))
        .collect();

    let countries = &session.country_layer().index;
    let districts = session.districts();
    let bg = hex_to_rgb(background);
    let row_len = projection.width as usize * 4;

    let mut pixels = vec![0u8; row_len * projection.height as usize];
    pixels.par_chunks_mut(row_len).enumerate().for_each(|(py, row)| {
        for px in 0..projection.width {
            let (lon, lat) = projection.lon_lat(px, py as u32);
            let mut rgb = bg;
            if let Some(i) = countries.locate(lon, lat) {
                rgb = blend(rgb, country_fills[i]);
            }
            if let Some(i) = districts.and_then(|d| d.index_at(lon, lat)) {
                rgb = blend(rgb, district_fills[i]);
            }
            let offset = px as usize * 4;
            row[offset..offset + 3].copy_from_slice(&rgb);
            row[offset + 3] = 255;
        }
    });

    ImageBuffer::from_raw(projection.width, projection.height, pixels)
        .ok_or_else(|| anyhow!("Pixel buffer does not match image size"))
}

pub fn write_snapshot(session: &MapSession, map: &MapConfig, width: u32, background: &str, out: &Path) -> Result<()> {
    let img = render_snapshot(session, map, width, background)?;
    img.save(out).with_context(|| format!("Failed to save snapshot: {:?}", out))?;
    info!(?out, "Snapshot written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::square;
    use crate::types::{Scope, StageUpdate};
    use geojson::FeatureCollection;
    use serde_json::json;

    fn session() -> MapSession {
        MapSession::new(FeatureCollection {
            bbox: None,
            features: vec![square(json!({ "name": "Kenya", "risk_level": "Very High" }), 34.0, -4.0, 8.0)],
            foreign_members: None,
        })
    }

    #[test]
    fn blend_respects_opacity() {
        let fill = Fill::new("#000000", 0.75);
        assert_eq!(blend([255, 255, 255], fill), [64, 64, 64]);
        assert_eq!(blend([10, 20, 30], Fill::new("#ffffff", 0.0)), [10, 20, 30]);
    }

    #[test]
    fn mercator_round_trip() {
        for lat in [-60.0, -4.0, 0.0, 12.5, 37.0] {
            assert!((inverse_mercator_y(mercator_y(lat)) - lat).abs() < 1e-9);
        }
        assert_eq!(mercator_y(0.0), 0.0);
    }

    #[test]
    fn snapshot_paints_polygons_over_background() {
        let img = render_snapshot(&session(), &MapConfig::default(), 64, "#ffffff").unwrap();
        assert_eq!(img.width(), 64);
        // bounds padding leaves a background border
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);
        let centre = img.get_pixel(32, img.height() / 2).0;
        let expected = blend([255, 255, 255], Fill::new("#d73027", 0.75));
        assert_eq!(&centre[..3], &expected);
    }

    #[test]
    fn initial_view_is_centred_on_the_configured_point() {
        let map = MapConfig::default();
        let vp = initial_viewport(&map, 1024);
        // 1024 px at zoom 3 spans half the world
        assert!((vp.west - (21.0 - 90.0)).abs() < 1e-9);
        assert!((vp.east - (21.0 + 90.0)).abs() < 1e-9);
        let mid = inverse_mercator_y((mercator_y(vp.north) + mercator_y(vp.south)) / 2.0);
        assert!((mid - 7.5).abs() < 1e-9);

        let zoomed_out = initial_viewport(&MapConfig { zoom: 0, ..MapConfig::default() }, 4096);
        assert_eq!((zoomed_out.west, zoomed_out.east), (-180.0, 180.0));
        assert!(zoomed_out.north <= MAX_LAT && zoomed_out.south >= -MAX_LAT);
    }

    #[test]
    fn unmatched_filters_render_the_initial_view() {
        let mut s = session();
        s.stage(StageUpdate { country: Some(Scope::from("Atlantis")), ..StageUpdate::default() });
        s.refresh();
        let img = render_snapshot(&s, &MapConfig::default(), 32, "#ffffff").unwrap();
        assert_eq!(img.width(), 32);
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }
}
