use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::engine::{EngineError, EngineFactory, OcrEngine};
use crate::types::{EngineConfig, EngineTier};

/// A tier that could not be brought up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierAttempt {
    pub tier: String,
    pub error: String,
}

/// Initialized engine for one language.
#[derive(Clone)]
pub struct ActiveEngine {
    pub engine: Arc<dyn OcrEngine>,
    pub language: String,
    pub tier: String,
}

impl fmt::Debug for ActiveEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveEngine")
            .field("language", &self.language)
            .field("tier", &self.tier)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum EngineState {
    Pending,
    Ready {
        tier: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        rejected: Vec<TierAttempt>,
    },
    Failed {
        attempts: Vec<TierAttempt>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageStatus {
    pub language: String,
    #[serde(flatten)]
    pub state: EngineState,
}

#[derive(Default)]
struct Slot {
    cell: OnceCell<ActiveEngine>,
    attempts: RwLock<Vec<TierAttempt>>,
}

/// Engines per language, each built once on first use (or by [`warm_up`])
/// from the first configuration tier that works.
///
/// [`warm_up`]: EngineRegistry::warm_up
pub struct EngineRegistry {
    languages: Vec<String>,
    default_language: String,
    tiers: Vec<EngineTier>,
    factory: Arc<dyn EngineFactory>,
    slots: HashMap<String, Slot>,
}

impl EngineRegistry {
    pub fn new(cfg: &EngineConfig, factory: Arc<dyn EngineFactory>) -> Self {
        let slots = cfg
            .languages
            .iter()
            .map(|lang| (lang.clone(), Slot::default()))
            .collect();
        Self {
            languages: cfg.languages.clone(),
            default_language: cfg.default_language.clone(),
            tiers: cfg.tiers.clone(),
            factory,
            slots,
        }
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Maps an optional request language onto a configured one.
    pub fn resolve_language<'a>(&'a self, requested: Option<&'a str>) -> Result<&'a str, EngineError> {
        match requested.map(str::trim).filter(|l| !l.is_empty()) {
            None => Ok(&self.default_language),
            Some(lang) if self.slots.contains_key(lang) => Ok(lang),
            Some(lang) => Err(EngineError::UnsupportedLanguage(lang.to_string())),
        }
    }

    /// Engine for `language`, initializing it if needed.
    pub async fn engine(&self, language: &str) -> Result<&ActiveEngine, EngineError> {
        let slot = self
            .slots
            .get(language)
            .ok_or_else(|| EngineError::UnsupportedLanguage(language.to_string()))?;
        slot.cell
            .get_or_try_init(|| self.initialize(language, slot))
            .await
    }

    async fn initialize(&self, language: &str, slot: &Slot) -> Result<ActiveEngine, EngineError> {
        let mut attempts = Vec::new();
        for tier in &self.tiers {
            match self.factory.build(language, tier).await {
                Ok(engine) => {
                    tracing::info!(language, tier = %tier.name, "OCR engine ready");
                    *slot.attempts.write() = attempts;
                    return Ok(ActiveEngine {
                        engine,
                        language: language.to_string(),
                        tier: tier.name.clone(),
                    });
                }
                Err(err) => {
                    tracing::warn!(language, tier = %tier.name, %err, "engine tier rejected");
                    attempts.push(TierAttempt {
                        tier: tier.name.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        *slot.attempts.write() = attempts;
        Err(EngineError::NoTierAvailable {
            language: language.to_string(),
        })
    }

    /// Initializes every language. Returns how many are ready.
    pub async fn warm_up(&self) -> usize {
        let mut ready = 0;
        for lang in &self.languages {
            match self.engine(lang).await {
                Ok(_) => ready += 1,
                Err(err) => tracing::error!(language = %lang, %err, "engine unavailable"),
            }
        }
        ready
    }

    pub fn status(&self) -> Vec<LanguageStatus> {
        self.languages
            .iter()
            .filter_map(|lang| {
                let slot = self.slots.get(lang)?;
                let attempts = slot.attempts.read().clone();
                let state = match slot.cell.get() {
                    Some(active) => EngineState::Ready {
                        tier: active.tier.clone(),
                        rejected: attempts,
                    },
                    None if attempts.is_empty() => EngineState::Pending,
                    None => EngineState::Failed { attempts },
                };
                Some(LanguageStatus {
                    language: lang.clone(),
                    state,
                })
            })
            .collect()
    }
}
