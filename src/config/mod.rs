mod load;
mod save;
mod types;

pub use load::LoadedConfig;
pub use save::save_config;
pub use types::{AtlasConfig, BuildMode, MAX_ATLAS_SIZE_LIMIT, PackConfig};
