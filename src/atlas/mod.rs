mod builder;
mod compositor;
mod size;
mod types;

pub use builder::{AtlasBuilder, BuildJob, default_packer};
pub use compositor::{Placement, composite};
pub use size::SizeSolver;
pub use types::AtlasGeneration;
