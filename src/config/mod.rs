//! Application configuration

pub mod persona;
pub mod settings;

use std::env;

use serde::{Deserialize, Serialize};

pub use persona::PersonaContract;
pub use settings::Settings;

/// Process-level configuration read from the environment.
///
/// The provider token is optional here on purpose: a missing token is a
/// per-exchange configuration failure with a fixed message, not a startup
/// panic, so the service still comes up and the transcript explains itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub hf_token: Option<String>,
    pub provider_base_url: String,
    pub model: String,
    pub settings_path: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            hf_token: env::var("HF_TOKEN").ok(),
            provider_base_url: env::var("HF_BASE_URL")
                .unwrap_or_else(|_| "https://router.huggingface.co/v1".into()),
            model: env::var("HF_MODEL_ID")
                .unwrap_or_else(|_| "HuggingFaceTB/SmolLM3-3B:hf-inference".into()),
            settings_path: env::var("WOLFGANG_SETTINGS").ok(),
        })
    }
}
