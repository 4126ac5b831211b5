//! Playback synchronization: speech and avatar reaction pulses
//!
//! Reacts to each newly appended assistant turn. Speech goes through the
//! [`SpeechEngine`] capability trait so the pipeline never touches a real
//! audio backend directly; tests substitute a recording stub. Playback
//! failures degrade to the visual-only path and never fail an exchange.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::settings::AvatarSettings;
use crate::conversation::Turn;

/// Fixed synthesis parameters for the trainer voice.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    pub lang: &'static str,
    pub rate: f32,
    pub pitch: f32,
}

impl Utterance {
    fn trainer_voice(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lang: "de-DE",
            rate: 0.9,
            pitch: 1.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("voice not available: {0}")]
    VoiceUnavailable(String),

    #[error("speech engine failed: {0}")]
    Engine(String),
}

/// Capability interface to a speech backend.
///
/// Only one utterance plays at a time; `speak` resolves when playback ends
/// or fails, `cancel` interrupts whatever is currently playing.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn speak(&self, utterance: Utterance) -> Result<(), SpeechError>;

    fn cancel(&self);
}

/// Speech engine for headless deployments: plays nothing, never fails.
pub struct NullSpeechEngine;

#[async_trait]
impl SpeechEngine for NullSpeechEngine {
    async fn speak(&self, _utterance: Utterance) -> Result<(), SpeechError> {
        Ok(())
    }

    fn cancel(&self) {}
}

/// Reaction animations the presentation shell can play on a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Thinking,
    Happy,
    Wave,
    Thumbsup,
}

impl Reaction {
    fn random() -> Self {
        match rand::thread_rng().gen_range(0..4) {
            0 => Reaction::Thinking,
            1 => Reaction::Happy,
            2 => Reaction::Wave,
            _ => Reaction::Thumbsup,
        }
    }
}

/// How long a reaction pulse stays raised.
const PULSE_DURATION: Duration = Duration::from_millis(100);

/// Drives speech and reaction pulses for assistant turns.
pub struct PlaybackSynchronizer {
    engine: Arc<dyn SpeechEngine>,
    avatar: AvatarSettings,
    speaking_tx: watch::Sender<bool>,
    reaction_tx: watch::Sender<Option<Reaction>>,
    last_turn: Mutex<Option<Uuid>>,
    /// Turn whose utterance currently owns the speaking signal. A finished
    /// task only clears the signal while it is still the owner, so a
    /// cancelled utterance cannot clear it mid-playback of its successor.
    speaking_turn: Arc<Mutex<Option<Uuid>>>,
}

impl PlaybackSynchronizer {
    pub fn new(engine: Arc<dyn SpeechEngine>, avatar: AvatarSettings) -> Self {
        let (speaking_tx, _) = watch::channel(false);
        let (reaction_tx, _) = watch::channel(None);
        Self {
            engine,
            avatar,
            speaking_tx,
            reaction_tx,
            last_turn: Mutex::new(None),
            speaking_turn: Arc::new(Mutex::new(None)),
        }
    }

    /// Transient "speaking" signal, true while an utterance plays.
    pub fn speaking(&self) -> watch::Receiver<bool> {
        self.speaking_tx.subscribe()
    }

    /// Reaction pulse channel; `Some(reaction)` for ~100ms per pulse.
    pub fn reaction(&self) -> watch::Receiver<Option<Reaction>> {
        self.reaction_tx.subscribe()
    }

    /// React to a newly appended assistant turn.
    ///
    /// Fire-and-forget: the pulse and the utterance run on their own tasks,
    /// the exchange state machine never waits for playback.
    pub fn on_assistant_turn(&self, turn: &Turn) {
        if !self.avatar.enabled {
            return;
        }

        // Side effects fire once per turn.
        {
            let mut last = self.last_turn.lock().expect("last_turn lock");
            if *last == Some(turn.id) {
                return;
            }
            *last = Some(turn.id);
        }

        self.raise_pulse();

        if self.avatar.muted {
            return;
        }

        // Last turn wins on the shared audio device.
        self.engine.cancel();

        let engine = Arc::clone(&self.engine);
        let speaking_tx = self.speaking_tx.clone();
        let speaking_turn = Arc::clone(&self.speaking_turn);
        let utterance = Utterance::trainer_voice(&turn.content);
        let turn_id = turn.id;

        *speaking_turn.lock().expect("speaking_turn lock") = Some(turn_id);
        speaking_tx.send_replace(true);
        tokio::spawn(async move {
            if let Err(e) = engine.speak(utterance).await {
                tracing::warn!("speech playback failed, continuing without audio: {e}");
            }
            let mut current = speaking_turn.lock().expect("speaking_turn lock");
            if *current == Some(turn_id) {
                *current = None;
                speaking_tx.send_replace(false);
            }
        });
    }

    fn raise_pulse(&self) {
        let reaction = Reaction::random();
        self.reaction_tx.send_replace(Some(reaction));

        let reaction_tx = self.reaction_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(PULSE_DURATION).await;
            reaction_tx.send_replace(None);
        });
    }
}
