use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtlasError {
    #[error("Item '{name}' is already pending in atlas '{atlas}'")]
    DuplicateNameIgnored { atlas: String, name: String },

    #[error(
        "Atlas '{atlas}' could not fit its batch: packed {packed} of {requested} items (max {max}x{max})"
    )]
    PackingCapacityExceeded {
        atlas: String,
        requested: usize,
        packed: usize,
        max: u32,
    },

    #[error(
        "Item '{name}' ({width}x{height}) in atlas '{atlas}' exceeds maximum atlas size ({max}x{max}) with padding"
    )]
    ItemTooLarge {
        atlas: String,
        name: String,
        width: u32,
        height: u32,
        max: u32,
    },

    #[error("Timed out after {waited_ms}ms waiting for '{name}' in atlas '{atlas}'")]
    ResolutionTimeout {
        atlas: String,
        name: String,
        waited_ms: u128,
    },

    #[error("Unknown atlas: {0}")]
    UnknownAtlas(String),

    #[error("Atlas '{atlas}' was released before the request completed")]
    Released { atlas: String },

    #[error("Invalid pixel data for '{name}': {reason}")]
    InvalidPixels { name: String, reason: String },

    #[error("Invalid atlas configuration: {0}")]
    InvalidConfig(String),
}

impl AtlasError {
    /// True for failures that came from a build pass rather than from the caller.
    pub fn is_build_failure(&self) -> bool {
        matches!(
            self,
            AtlasError::PackingCapacityExceeded { .. } | AtlasError::ItemTooLarge { .. }
        )
    }
}
