use std::fs;
use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use image::ImageFormat;

use crate::atlas::AtlasGeneration;

/// Save the atlas surface as PNG
pub fn save_atlas_image(generation: &AtlasGeneration, path: &Path) -> Result<()> {
    let mut png_data = Cursor::new(Vec::new());
    generation
        .image
        .write_to(&mut png_data, ImageFormat::Png)
        .with_context(|| format!("failed to encode atlas image: {}", path.display()))?;

    fs::write(path, png_data.into_inner())
        .with_context(|| format!("failed to write atlas image: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packing::Rect;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_png_round_trip() {
        let dir = std::env::temp_dir().join(format!("dynatlas-png-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("atlas.png");

        let mut generation = AtlasGeneration::new(8, 4);
        generation.image = RgbaImage::from_pixel(8, 4, Rgba([1, 2, 3, 4]));
        generation
            .regions
            .insert("all".to_string(), Rect::new(0, 0, 8, 4));
        save_atlas_image(&generation, &path).unwrap();

        let loaded = image::open(&path).unwrap().into_rgba8();
        assert_eq!(loaded.dimensions(), (8, 4));
        assert_eq!(loaded.get_pixel(7, 3).0, [1, 2, 3, 4]);

        fs::remove_dir_all(&dir).ok();
    }
}
