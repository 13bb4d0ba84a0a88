use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// Every field is optional; command-line flags take precedence.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// File name of the table written inside the source directory.
    pub output_name: String,
    /// Abort a build at the first file that fails to decode or transform.
    pub fail_fast: bool,
    /// Draw a progress bar during builds.
    pub progress: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_name: crate::DEFAULT_OUTPUT_NAME.to_string(),
            fail_fast: false,
            progress: true,
        }
    }
}

impl AppConfig {
    /// Load config from `explicit` if given, else `~/.config/timbre-table/config.toml`.
    /// Returns default config if the file doesn't exist.
    /// Logs a warning if the file exists but can't be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Self {
        let config_path = explicit.map(Path::to_path_buf).or_else(Self::config_path);
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::from_toml(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Some(path) if explicit.is_some() => {
                log::warn!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Output path for a build of `directory`: `override_path` if given,
    /// else `output_name` inside the directory.
    pub fn output_for(&self, directory: &Path, override_path: Option<PathBuf>) -> PathBuf {
        override_path.unwrap_or_else(|| directory.join(&self.output_name))
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.output_name, "Result.csv");
        assert!(config.progress);
        assert!(!config.fail_fast);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::from_toml("fail_fast = true\n").unwrap();
        assert!(config.fail_fast);
        assert_eq!(config.output_name, "Result.csv");
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(AppConfig::from_toml("fail_fast = \"maybe\"").is_err());
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "output_name = \"features.csv\"\nprogress = false\n").unwrap();

        let config = AppConfig::load(Some(&path));
        assert_eq!(config.output_name, "features.csv");
        assert!(!config.progress);
    }

    #[test]
    fn load_unparsable_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();
        assert_eq!(AppConfig::load(Some(&path)), AppConfig::default());
    }

    #[test]
    fn load_missing_explicit_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(Some(&dir.path().join("absent.toml")));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn output_resolution() {
        let config = AppConfig::default();
        let dir = Path::new("/music/set");
        assert_eq!(config.output_for(dir, None), PathBuf::from("/music/set/Result.csv"));
        assert_eq!(
            config.output_for(dir, Some(PathBuf::from("/tmp/out.csv"))),
            PathBuf::from("/tmp/out.csv")
        );
    }
}
