use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::types::PackConfig;

/// A loaded configuration file with its associated directory.
///
/// Paths in the config are relative to the config file location,
/// so we need to track where the config was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The parsed configuration
    pub config: PackConfig,
    /// The directory containing the config file
    pub config_dir: PathBuf,
}

impl LoadedConfig {
    /// Load a config file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let config: PackConfig = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;

        config
            .atlas
            .validate()
            .with_context(|| format!("invalid settings in config file: {}", path.display()))?;

        let config_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self { config, config_dir })
    }

    /// Resolve input patterns to actual file paths.
    ///
    /// Glob patterns are expanded, and all paths are resolved relative
    /// to the config file directory.
    pub fn resolve_inputs(&self) -> Result<Vec<PathBuf>> {
        let mut results = Vec::new();

        for pattern in &self.config.input {
            if is_glob_pattern(pattern) {
                let full_pattern = self.config_dir.join(pattern);
                let pattern_str = full_pattern.to_string_lossy();

                let paths = glob::glob(&pattern_str)
                    .with_context(|| format!("invalid glob pattern: {}", pattern))?;

                for entry in paths {
                    let path =
                        entry.with_context(|| format!("failed to read glob entry: {}", pattern))?;
                    results.push(path);
                }
            } else {
                results.push(self.config_dir.join(pattern));
            }
        }

        Ok(results)
    }

    /// Resolve the output directory relative to the config file directory.
    pub fn resolve_output_dir(&self) -> PathBuf {
        self.config_dir.join(&self.config.output_dir)
    }
}

/// Check if a pattern contains glob characters.
fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?') || pattern.contains('[')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_glob_pattern() {
        assert!(is_glob_pattern("*.png"));
        assert!(is_glob_pattern("icons/**/*.png"));
        assert!(is_glob_pattern("icon?.png"));
        assert!(!is_glob_pattern("icons/close.png"));
    }

    #[test]
    fn test_load_resolves_relative_to_config_dir() {
        let dir = std::env::temp_dir().join(format!("dynatlas-load-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ui.json");
        std::fs::write(
            &path,
            r#"{"name": "ui", "input": ["icons/close.png"], "output_dir": "out", "atlas": {"padding": 1}}"#,
        )
        .unwrap();

        let loaded = LoadedConfig::load(&path).unwrap();
        assert_eq!(loaded.config.name, "ui");
        assert_eq!(loaded.config.atlas.padding, 1);
        assert_eq!(loaded.resolve_output_dir(), dir.join("out"));
        assert_eq!(
            loaded.resolve_inputs().unwrap(),
            vec![dir.join("icons/close.png")]
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_rejects_invalid_atlas_settings() {
        let dir = std::env::temp_dir().join(format!("dynatlas-invalid-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, r#"{"atlas": {"min_atlas_size": 512, "max_atlas_size": 128}}"#)
            .unwrap();

        assert!(LoadedConfig::load(&path).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
