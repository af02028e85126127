use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Weak};

use image::RgbaImage;

use crate::atlas::AtlasGeneration;
use crate::error::AtlasError;
use crate::packing::Rect;

/// A named region of one atlas generation.
///
/// The handle does not keep the surface alive. Once the atlas version moves
/// past [`version`](Handle::version) the holder should resolve the name
/// again instead of reusing the region.
#[derive(Debug, Clone)]
pub struct Handle {
    atlas: String,
    name: String,
    region: Rect,
    version: u64,
    surface: (u32, u32),
    generation: Weak<AtlasGeneration>,
}

impl Handle {
    pub(crate) fn new(
        atlas: &str,
        name: &str,
        version: u64,
        generation: &Arc<AtlasGeneration>,
    ) -> Option<Self> {
        let region = generation.region(name)?;
        Some(Self {
            atlas: atlas.to_string(),
            name: name.to_string(),
            region,
            version,
            surface: (generation.width, generation.height),
            generation: Arc::downgrade(generation),
        })
    }

    pub fn atlas(&self) -> &str {
        &self.atlas
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> Rect {
        self.region
    }

    /// Atlas version the region was resolved against
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Size of the surface the region lives in
    pub fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    /// Normalized `[u0, v0, u1, v1]` texture coordinates, origin top-left
    pub fn uv(&self) -> [f32; 4] {
        let (w, h) = (self.surface.0 as f32, self.surface.1 as f32);
        [
            self.region.x as f32 / w,
            self.region.y as f32 / h,
            self.region.right() as f32 / w,
            self.region.bottom() as f32 / h,
        ]
    }

    /// The generation, if it is still alive
    pub fn generation(&self) -> Option<Arc<AtlasGeneration>> {
        self.generation.upgrade()
    }

    /// Pixels of the region, if the generation is still alive
    pub fn crop(&self) -> Option<RgbaImage> {
        self.generation().map(|g| g.crop(self.region))
    }
}

/// Single-shot completion of one insert.
#[derive(Debug)]
pub struct Ticket {
    pub(crate) atlas: String,
    pub(crate) name: String,
    pub(crate) receiver: Receiver<Result<Handle, AtlasError>>,
}

impl Ticket {
    pub fn atlas(&self) -> &str {
        &self.atlas
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-blocking check for the result.
    ///
    /// A sender dropped without reporting (the callback was discarded) shows
    /// up as `Released`.
    pub fn try_take(&self) -> Option<Result<Handle, AtlasError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(AtlasError::Released {
                atlas: self.atlas.clone(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_is_weak() {
        let mut generation = AtlasGeneration::new(64, 32);
        generation
            .regions
            .insert("dot".to_string(), Rect::new(16, 8, 16, 8));
        let generation = Arc::new(generation);

        let handle = Handle::new("ui", "dot", 3, &generation).unwrap();
        assert_eq!(handle.uv(), [0.25, 0.25, 0.5, 0.5]);
        assert_eq!(handle.crop().map(|c| c.dimensions()), Some((16, 8)));
        assert!(Handle::new("ui", "missing", 3, &generation).is_none());

        drop(generation);
        assert!(handle.generation().is_none());
        assert!(handle.crop().is_none());
    }
}
