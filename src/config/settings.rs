//! Deployment settings loaded from a TOML file
//!
//! Profile metadata feeds the persona contract and the greeting; the avatar
//! section feeds the playback synchronizer. The pipeline only ever reads
//! these values, it never writes them back.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root settings document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub profile: ProfileSettings,

    #[serde(default)]
    pub avatar: AvatarSettings,
}

/// Company and persona identity shown to the user and interpolated into
/// the persona contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSettings {
    #[serde(default = "default_company_name")]
    pub company_name: String,

    #[serde(default = "default_ai_name")]
    pub ai_name: String,

    #[serde(default = "default_ai_subtitle")]
    pub ai_subtitle: String,

    #[serde(default = "default_city")]
    pub city: String,
}

/// Audio/visual feedback switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarSettings {
    /// Master switch: disabled means no speech and no reaction pulses.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Mutes speech only; reaction pulses still fire.
    #[serde(default)]
    pub muted: bool,
}

fn default_company_name() -> String {
    "Grunewald GmbH".to_string()
}

fn default_ai_name() -> String {
    "Wolfgang".to_string()
}

fn default_ai_subtitle() -> String {
    "Dein digitaler Ausbilder".to_string()
}

fn default_city() -> String {
    "Bocholt".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            company_name: default_company_name(),
            ai_name: default_ai_name(),
            ai_subtitle: default_ai_subtitle(),
            city: default_city(),
        }
    }
}

impl Default for AvatarSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            muted: false,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profile: ProfileSettings::default(),
            avatar: AvatarSettings::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load from `path` when given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&str>) -> Self {
        match path {
            Some(p) => match Self::from_file(Path::new(p)) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!("could not load settings from {p}: {e}, using defaults");
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    /// The synthetic welcome message seeded into a fresh transcript.
    pub fn greeting(&self) -> String {
        format!(
            "Herzlich willkommen! 👋 Ich bin dein digitaler Ausbilder bei der {}. \
             Stell mir Fragen rund um Mathe, Technik und Zerspanung! 🧠 \
             Du kannst auch Bilder hochladen! 📸 Wie kann ich dir heute helfen?",
            self.profile.company_name
        )
    }
}
