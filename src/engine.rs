use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::preprocess::write_probe_image;
use crate::types::{EngineConfig, EngineTier};

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} did not finish within {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("engine output is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unrecognized engine output: {0}")]
    UnrecognizedOutput(String),

    #[error("Image processing error: {0}")]
    Image(String),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("no engine tier could be initialized for {language}")]
    NoTierAvailable { language: String },
}

/// A recognizer that turns one image file into the engine's raw JSON result.
///
/// The raw shape differs between engines and engine versions; see
/// [`crate::postprocess::normalize`].
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<Value, EngineError>;
}

/// Builds an engine for one language in one configuration tier.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn build(
        &self,
        language: &str,
        tier: &EngineTier,
    ) -> Result<Arc<dyn OcrEngine>, EngineError>;
}

/// Engine backed by an external program that prints its result as JSON.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    language: String,
    timeout: Duration,
}

impl CommandEngine {
    pub fn new(cfg: &EngineConfig, language: &str, tier: &EngineTier) -> Self {
        let args = tier.args.iter().chain(cfg.args.iter()).cloned().collect();
        Self {
            program: cfg.program.clone(),
            args,
            language: language.to_string(),
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }

    /// Arguments for one run with the placeholders filled in.
    pub fn command_args(&self, image: &Path) -> Vec<String> {
        let image = image.to_string_lossy();
        self.args
            .iter()
            .map(|a| a.replace("{image}", &image).replace("{lang}", &self.language))
            .collect()
    }
}

#[async_trait]
impl OcrEngine for CommandEngine {
    async fn recognize(&self, image: &Path) -> Result<Value, EngineError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.command_args(image)).kill_on_drop(true);

        let run = cmd.output();
        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(res) => res.map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?,
            Err(_) => {
                return Err(EngineError::Timeout {
                    program: self.program.clone(),
                    secs: self.timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            return Err(EngineError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// Runs `engine` once on a blank page. Any error means the engine is unusable.
pub async fn probe(engine: &dyn OcrEngine) -> Result<(), EngineError> {
    let dir = tempfile::Builder::new().prefix("ocrs-probe").tempdir()?;
    let image: PathBuf = write_probe_image(dir.path())?;
    engine.recognize(&image).await?;
    Ok(())
}

/// Factory for [`CommandEngine`]s; each tier is accepted only if its probe succeeds.
pub struct CommandEngineFactory {
    cfg: EngineConfig,
}

impl CommandEngineFactory {
    pub fn new(cfg: EngineConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait]
impl EngineFactory for CommandEngineFactory {
    async fn build(
        &self,
        language: &str,
        tier: &EngineTier,
    ) -> Result<Arc<dyn OcrEngine>, EngineError> {
        let engine = CommandEngine::new(&self.cfg, language, tier);
        probe(&engine).await?;
        Ok(Arc::new(engine))
    }
}
