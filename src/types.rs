//! Service configuration, loaded from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::orientation::OrientationThresholds;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub scaling: ScalingConfig,
    pub orientation: OrientationThresholds,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        if engine.languages.is_empty() {
            return Err(ConfigError::Invalid("engine.languages is empty".into()));
        }
        if !engine.languages.contains(&engine.default_language) {
            return Err(ConfigError::Invalid(format!(
                "engine.default_language {:?} is not in engine.languages",
                engine.default_language
            )));
        }
        if engine.tiers.is_empty() {
            return Err(ConfigError::Invalid("engine.tiers is empty".into()));
        }
        if self.scaling.min_side_len == 0 || self.scaling.max_side_len < self.scaling.min_side_len {
            return Err(ConfigError::Invalid(
                "scaling needs 0 < min_side_len <= max_side_len".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Parent of the per-request scratch directories; system temp when unset.
    pub upload_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
    /// Build every language's engine at startup instead of on first use.
    pub eager_init: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8501,
            upload_dir: None,
            max_upload_bytes: 32 * 1024 * 1024,
            eager_init: true,
        }
    }
}

/// One configuration variant of the engine, tried in priority order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineTier {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl EngineTier {
    pub fn new(name: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// External OCR program; must print the recognition result as JSON.
    pub program: String,
    /// Arguments after the tier arguments. `{image}` and `{lang}` are substituted.
    pub args: Vec<String>,
    pub tiers: Vec<EngineTier>,
    pub languages: Vec<String>,
    pub default_language: String,
    pub timeout_secs: u64,
    /// Detections scoring below this are dropped; 0 keeps everything.
    pub text_score: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "paddleocr-bridge".to_string(),
            args: ["--lang", "{lang}", "--image", "{image}"]
                .iter()
                .map(|a| a.to_string())
                .collect(),
            tiers: vec![
                EngineTier::new("angle-cls", &["--use-angle-cls"]),
                EngineTier::new("basic", &[]),
            ],
            languages: vec!["es".to_string(), "en".to_string()],
            default_language: "es".to_string(),
            timeout_secs: 120,
            text_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub enabled: bool,
    pub min_side_len: u32,
    pub max_side_len: u32,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_side_len: 30,
            max_side_len: 2000,
        }
    }
}
