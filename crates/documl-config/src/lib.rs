//! Configuration management for documl.
//!
//! Parses `documl.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! The configuration is split into three sections:
//!
//! - `[output]` - where rendered images (and the batch cache) live
//! - `[renderer]` - how the `PlantUML` renderer is invoked
//! - `[conversion]` - the optional EPS to PDF post-pass

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "documl.toml";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output configuration.
    pub output: OutputConfig,
    /// Renderer invocation configuration.
    pub renderer: RendererConfig,
    /// EPS to PDF conversion configuration.
    pub conversion: ConversionConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Output configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for rendered images and the batch cache file.
    pub dir: PathBuf,
    /// Whether to delete combined source files after successful rendering.
    pub cleanup: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            cleanup: false,
        }
    }
}

/// Renderer invocation configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Java executable used to launch the renderer.
    pub java: PathBuf,
    /// Path to `plantuml.jar`. Required for rendering.
    pub jar: PathBuf,
    /// Optional `PlantUML` config file passed via `-config`.
    pub config_file: Option<PathBuf>,
    /// Optional `dot` executable passed via `-graphvizdot`.
    pub graphviz_dot: Option<PathBuf>,
    /// Directories searched for `!include` files, passed via
    /// `-Dplantuml.include.path`.
    pub include_dirs: Vec<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            java: PathBuf::from("java"),
            jar: PathBuf::new(),
            config_file: None,
            graphviz_dot: None,
            include_dirs: Vec::new(),
        }
    }
}

/// EPS to PDF conversion configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Whether the EPS to PDF post-pass is enabled.
    pub eps_to_pdf: bool,
    /// Conversion executable.
    pub epstopdf: PathBuf,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            eps_to_pdf: false,
            epstopdf: PathBuf::from("epstopdf"),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}

impl Config {
    /// Load configuration from an explicit file path.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the file does not exist,
    /// `ConfigError::Parse` if it is not valid TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.config_path = Some(path.to_path_buf());
        config.validate()?;
        Ok(config)
    }

    /// Discover and load a config file, walking up from `start_dir`.
    ///
    /// Returns the default configuration when no `documl.toml` exists in
    /// `start_dir` or any of its ancestors.
    ///
    /// # Errors
    ///
    /// Returns an error only for a config file that exists but fails to
    /// load; absence is not an error.
    pub fn discover(start_dir: &Path) -> Result<Self, ConfigError> {
        for dir in start_dir.ancestors() {
            let candidate = dir.join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Self::load(&candidate);
            }
        }
        Ok(Self::default())
    }

    /// Validate the loaded configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.renderer.java.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "renderer.java cannot be empty".to_owned(),
            ));
        }
        if self.conversion.eps_to_pdf && self.conversion.epstopdf.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "conversion.epstopdf cannot be empty when eps_to_pdf is enabled".to_owned(),
            ));
        }
        Ok(())
    }
}
