use image::{DynamicImage, RgbaImage};

use crate::error::AtlasError;

/// Anything that can hand over a CPU-side RGBA8 pixel buffer.
///
/// This is the only capability the atlas core needs from an image type;
/// platform read-back of GPU-only textures belongs in the implementor.
pub trait PixelSource {
    fn materialize(self) -> Result<RgbaImage, String>;
}

impl PixelSource for RgbaImage {
    fn materialize(self) -> Result<RgbaImage, String> {
        Ok(self)
    }
}

impl PixelSource for &RgbaImage {
    fn materialize(self) -> Result<RgbaImage, String> {
        Ok(self.clone())
    }
}

impl PixelSource for DynamicImage {
    fn materialize(self) -> Result<RgbaImage, String> {
        Ok(self.into_rgba8())
    }
}

/// A raw width/height/RGBA8 triple.
#[derive(Debug, Clone)]
pub struct RawPixels {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8, `width * height * 4` bytes
    pub data: Vec<u8>,
}

impl PixelSource for RawPixels {
    fn materialize(self) -> Result<RgbaImage, String> {
        let expected = u64::from(self.width) * u64::from(self.height) * 4;
        let actual = self.data.len() as u64;
        RgbaImage::from_raw(self.width, self.height, self.data).ok_or_else(|| {
            format!(
                "expected {} bytes for {}x{} RGBA8, got {}",
                expected, self.width, self.height, actual
            )
        })
    }
}

/// An image waiting for the next build pass of its atlas
#[derive(Debug, Clone)]
pub struct PendingItem {
    /// Name the region will be published under
    pub name: String,
    /// Pixels to composite; dropped once the pass has copied them
    pub image: RgbaImage,
}

impl PendingItem {
    pub fn new(name: impl Into<String>, source: impl PixelSource) -> Result<Self, AtlasError> {
        let name = name.into();
        let image = source
            .materialize()
            .map_err(|reason| AtlasError::InvalidPixels {
                name: name.clone(),
                reason,
            })?;

        if image.width() == 0 || image.height() == 0 {
            return Err(AtlasError::InvalidPixels {
                name,
                reason: "image has zero width or height".to_string(),
            });
        }

        Ok(Self { name, image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_pixels_length_is_checked() {
        let raw = RawPixels {
            width: 2,
            height: 2,
            data: vec![0; 15],
        };
        let err = PendingItem::new("short", raw).unwrap_err();
        assert!(matches!(err, AtlasError::InvalidPixels { ref name, .. } if name == "short"));
    }

    #[test]
    fn test_raw_pixels_materialize() {
        let raw = RawPixels {
            width: 1,
            height: 2,
            data: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        let item = PendingItem::new("tall", raw).unwrap();
        assert_eq!((item.width(), item.height()), (1, 2));
        assert_eq!(item.image.get_pixel(0, 1).0, [5, 6, 7, 8]);
    }

    #[test]
    fn test_zero_sized_image_rejected() {
        let err = PendingItem::new("empty", RgbaImage::new(0, 4)).unwrap_err();
        assert!(matches!(err, AtlasError::InvalidPixels { .. }));
    }
}
