pub mod atlas;
pub mod cli;
pub mod config;
pub mod error;
pub mod manager;
pub mod output;
pub mod packing;
pub mod sprite;

pub use atlas::{AtlasBuilder, AtlasGeneration};
pub use cli::{CliArgs, Command, PackingHeuristic, SizeMode};
pub use config::{AtlasConfig, BuildMode};
pub use error::AtlasError;
pub use manager::{AtlasManager, Handle, InsertOutcome, SubscriptionId, Ticket};
pub use packing::{Rect, RectanglePacker};
pub use sprite::{PixelSource, RawPixels};
