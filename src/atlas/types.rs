use std::collections::HashMap;

use image::{RgbaImage, imageops};

use crate::packing::Rect;

/// One immutable, fully composited version of an atlas surface
#[derive(Debug)]
pub struct AtlasGeneration {
    /// Surface width
    pub width: u32,
    /// Surface height
    pub height: u32,
    /// Composited pixels
    pub image: RgbaImage,
    /// Placed content rectangle of every packed item
    pub regions: HashMap<String, Rect>,
}

impl AtlasGeneration {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            image: RgbaImage::new(width, height),
            regions: HashMap::new(),
        }
    }

    pub fn region(&self, name: &str) -> Option<Rect> {
        self.regions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.regions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Copy the pixels under `rect` out of the surface.
    pub fn crop(&self, rect: Rect) -> RgbaImage {
        imageops::crop_imm(&self.image, rect.x, rect.y, rect.width, rect.height).to_image()
    }

    /// Region names in a stable order
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.regions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Fraction of the surface covered by packed regions
    pub fn occupancy(&self) -> f64 {
        let total = u64::from(self.width) * u64::from(self.height);
        if total == 0 {
            return 0.0;
        }
        let used: u64 = self.regions.values().map(Rect::area).sum();
        used as f64 / total as f64
    }
}
