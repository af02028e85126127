use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::{PackingHeuristic, SizeMode};
use crate::error::AtlasError;

/// Largest `max_atlas_size` accepted by [`AtlasConfig::validate`]
pub const MAX_ATLAS_SIZE_LIMIT: u32 = 16384;

/// Where a build pass runs once its batch window fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
    /// Run the pass synchronously inside `poll()`
    Inline,
    /// Run the pass on the rayon pool and collect it on a later `poll()`
    #[default]
    Background,
}

/// Per-manager atlas settings, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Largest allowed atlas edge in pixels
    pub max_atlas_size: u32,
    /// Smallest atlas edge produced by the size solver
    pub min_atlas_size: u32,
    /// Padding around each packed image in pixels
    pub padding: u32,
    /// Quiet period before a batch is built, in milliseconds
    pub batch_delay_ms: u64,
    /// Solve a fitting size instead of always using the maximum
    pub auto_resize_atlas: bool,
    /// Power-of-two rounding mode for solved sizes
    pub size_mode: SizeMode,
    /// Heuristic for the default MaxRects oracle
    pub heuristic: PackingHeuristic,
    /// Inline or background build passes
    pub build_mode: BuildMode,
    /// Sleep between polls while a caller waits on a result, in milliseconds
    pub poll_interval_ms: u64,
    /// How long a waiting caller polls before giving up, in milliseconds
    pub resolve_timeout_ms: u64,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            max_atlas_size: 2048,
            min_atlas_size: 64,
            padding: 0,
            batch_delay_ms: 100,
            auto_resize_atlas: true,
            size_mode: SizeMode::Rectangle,
            heuristic: PackingHeuristic::BestShortSideFit,
            build_mode: BuildMode::Background,
            poll_interval_ms: 100,
            resolve_timeout_ms: 10_000,
        }
    }
}

impl AtlasConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    /// Reject settings the size solver and scheduler cannot work with.
    pub fn validate(&self) -> Result<(), AtlasError> {
        if self.max_atlas_size == 0 || self.min_atlas_size == 0 {
            return Err(AtlasError::InvalidConfig(
                "atlas sizes must be non-zero".to_string(),
            ));
        }
        if self.max_atlas_size > MAX_ATLAS_SIZE_LIMIT {
            return Err(AtlasError::InvalidConfig(format!(
                "max_atlas_size {} is above the limit of {}",
                self.max_atlas_size, MAX_ATLAS_SIZE_LIMIT
            )));
        }
        if self.min_atlas_size > self.max_atlas_size {
            return Err(AtlasError::InvalidConfig(format!(
                "min_atlas_size {} is larger than max_atlas_size {}",
                self.min_atlas_size, self.max_atlas_size
            )));
        }
        if u64::from(self.padding) * 2 >= u64::from(self.max_atlas_size) {
            return Err(AtlasError::InvalidConfig(format!(
                "padding {} leaves no room in a {}px atlas",
                self.padding, self.max_atlas_size
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(AtlasError::InvalidConfig(
                "poll_interval_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Config file for the `pack` command.
///
/// All paths in the config are relative to the config file location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Config file version (currently 1)
    pub version: u32,
    /// Input file paths or glob patterns
    pub input: Vec<String>,
    /// Output directory for atlas files
    pub output_dir: String,
    /// Atlas name and base name for output files
    pub name: String,
    /// Atlas manager settings
    pub atlas: AtlasConfig,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            version: 1,
            input: Vec::new(),
            output_dir: ".".to_string(),
            name: "atlas".to_string(),
            atlas: AtlasConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AtlasConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_delay(), Duration::from_millis(100));
        assert_eq!(config.resolve_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_inverted_limits() {
        let config = AtlasConfig {
            min_atlas_size: 4096,
            max_atlas_size: 1024,
            ..AtlasConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AtlasError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_caps_max_size() {
        let at_limit = AtlasConfig {
            max_atlas_size: MAX_ATLAS_SIZE_LIMIT,
            ..AtlasConfig::default()
        };
        assert!(at_limit.validate().is_ok());

        let huge = AtlasConfig {
            max_atlas_size: 1 << 20,
            auto_resize_atlas: false,
            ..AtlasConfig::default()
        };
        assert!(matches!(huge.validate(), Err(AtlasError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AtlasConfig =
            serde_json::from_str(r#"{"padding": 2, "size_mode": "square"}"#).unwrap();
        assert_eq!(config.padding, 2);
        assert_eq!(config.size_mode, SizeMode::Square);
        assert_eq!(config.max_atlas_size, 2048);
        assert_eq!(config.build_mode, BuildMode::Background);
    }
}
