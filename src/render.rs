use crate::session::{MapSession, Visual};
use crate::style::hex_to_rgba;
use anyhow::{Context, Result};
use image::{imageops, ImageBuffer, RgbaImage};
use std::fs;
use std::path::Path;

/// Rasterize the current frame of a session: background, then every visual centred on
/// its pixel. Returns `None` while the session has no size.
pub fn render_snapshot(session: &mut MapSession, background: &str) -> Option<RgbaImage> {
    let (width, height) = (session.viewport().width, session.viewport().height);
    if width == 0 || height == 0 {
        return None;
    }
    let bg = hex_to_rgba(background, 1.0);
    let mut canvas: RgbaImage = ImageBuffer::from_pixel(width, height, bg);

    for visual in session.visuals() {
        draw_visual(&mut canvas, &visual);
    }
    Some(canvas)
}

fn draw_visual(canvas: &mut RgbaImage, visual: &Visual) {
    let icon = &visual.style.icon;
    let x = (visual.pixel.x - icon.width() as f64 / 2.0).round() as i64;
    let y = (visual.pixel.y - icon.height() as f64 / 2.0).round() as i64;
    // overlay clips icons hanging off the canvas
    imageops::overlay(canvas, icon, x, y);
}

pub fn save_snapshot(session: &mut MapSession, background: &str, path: &Path) -> Result<()> {
    let image = render_snapshot(session, background)
        .context("Map has no size yet, nothing to render")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create snapshot directory")?;
    }
    image
        .save(path)
        .with_context(|| format!("Failed to save snapshot {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::types::GeoRecord;
    use image::Rgba;
    use serde_json::json;

    #[test]
    fn draws_markers_over_background() {
        let config = MapConfig::default();
        let mut session = MapSession::new(config.clone());
        assert!(render_snapshot(&mut session, "#000000").is_none());

        session.resize(200, 100);
        let record: GeoRecord = serde_json::from_value(json!({
            "id": 1, "latitude": config.center_lat, "longitude": config.center_lon,
            "propertyType": "studio"
        }))
        .unwrap();
        session.set_records(vec![record]);

        let image = render_snapshot(&mut session, "#000000").unwrap();
        assert_eq!(image.dimensions(), (200, 100));
        assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*image.get_pixel(100, 50), hex_to_rgba("#20c997", 1.0));
    }
}
