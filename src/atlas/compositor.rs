use image::imageops;

use super::AtlasGeneration;
use crate::packing::Rect;
use crate::sprite::PendingItem;

/// Final position of one item in the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub item_index: usize,
    pub rect: Rect,
}

/// Copy every placed item into a fresh zeroed surface.
///
/// Pixels are replaced, not blended, so a crop of the region reproduces the
/// source exactly. Items are consumed and their buffers dropped here.
pub fn composite(
    width: u32,
    height: u32,
    items: Vec<PendingItem>,
    placements: &[Placement],
) -> AtlasGeneration {
    let mut generation = AtlasGeneration::new(width, height);
    let mut items: Vec<Option<PendingItem>> = items.into_iter().map(Some).collect();

    for placement in placements {
        let Some(item) = items.get_mut(placement.item_index).and_then(Option::take) else {
            continue;
        };

        imageops::replace(
            &mut generation.image,
            &item.image,
            i64::from(placement.rect.x),
            i64::from(placement.rect.y),
        );
        generation.regions.insert(item.name, placement.rect);
    }

    generation
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(name: &str, w: u32, h: u32, color: [u8; 4]) -> PendingItem {
        PendingItem::new(name, RgbaImage::from_pixel(w, h, Rgba(color))).unwrap()
    }

    #[test]
    fn test_blit_without_blending() {
        // Half-transparent source must land as-is over the zeroed surface
        let items = vec![solid("glass", 2, 2, [200, 100, 50, 128])];
        let placements = [Placement {
            item_index: 0,
            rect: Rect::new(1, 1, 2, 2),
        }];

        let generation = composite(4, 4, items, &placements);

        assert_eq!(generation.image.get_pixel(1, 1).0, [200, 100, 50, 128]);
        assert_eq!(generation.image.get_pixel(2, 2).0, [200, 100, 50, 128]);
        assert_eq!(generation.image.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(generation.image.get_pixel(3, 3).0, [0, 0, 0, 0]);
        assert_eq!(generation.region("glass"), Some(Rect::new(1, 1, 2, 2)));
    }

    #[test]
    fn test_unplaced_items_get_no_region() {
        let items = vec![solid("a", 1, 1, [1, 1, 1, 1]), solid("b", 1, 1, [2, 2, 2, 2])];
        let placements = [Placement {
            item_index: 1,
            rect: Rect::new(0, 0, 1, 1),
        }];

        let generation = composite(2, 2, items, &placements);

        assert_eq!(generation.len(), 1);
        assert!(generation.contains("b"));
        assert!(!generation.contains("a"));
    }
}
