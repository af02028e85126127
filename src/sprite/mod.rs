mod loader;
mod sprite;

pub use loader::load_images;
pub use sprite::{PendingItem, PixelSource, RawPixels};
