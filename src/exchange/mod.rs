//! Exchange coordinator: one request/response cycle per user send
//!
//! Owns the only concurrency state in the pipeline: the in-flight flag.
//! A send while another exchange is outstanding is rejected, not queued;
//! the flag is enforced here in the coordinator so programmatic callers
//! cannot bypass it the way a disabled UI button could be.
//!
//! Every failure below a missing credential is absorbed into the transcript
//! as a visibly marked assistant turn. The presentation shell only ever
//! sees turns plus the in-flight flag; silence is treated as a defect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::watch;

use crate::config::PersonaContract;
use crate::conversation::{Attachment, History, Role, Turn};
use crate::playback::{PlaybackSynchronizer, Reaction};
use crate::provider::{compose, CompletionBackend, GenerationConfig};
use crate::sanitizer::sanitize;

/// Prefix marking a failed exchange in the transcript.
const ERROR_PREFIX: &str = "❌ Fehler";

/// Reply when the projected history carries no text to answer (e.g. an
/// attachment-only send at the start of the conversation). No provider
/// call is made in that case.
const EMPTY_HISTORY_REPLY: &str = "Bitte sende eine Nachricht";

/// Rejections at the send boundary. Everything else lands in the transcript.
#[derive(Debug, Error)]
pub enum SendError {
    /// Blank content and no attachment; no turn is created.
    #[error("empty input")]
    EmptyInput,

    /// An exchange is already in flight; the caller must wait for it.
    #[error("exchange already in flight")]
    Busy,
}

/// Resets the in-flight flag however the exchange resolves.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Orchestrates the conversation pipeline:
/// history -> composer -> provider -> sanitizer -> history -> playback.
pub struct ExchangeCoordinator {
    history: Mutex<History>,
    persona: PersonaContract,
    generation: GenerationConfig,
    model: String,
    backend: Arc<dyn CompletionBackend>,
    playback: PlaybackSynchronizer,
    in_flight: AtomicBool,
}

impl ExchangeCoordinator {
    pub fn new(
        persona: PersonaContract,
        generation: GenerationConfig,
        model: impl Into<String>,
        backend: Arc<dyn CompletionBackend>,
        playback: PlaybackSynchronizer,
    ) -> Self {
        Self {
            history: Mutex::new(History::new()),
            persona,
            generation,
            model: model.into(),
            backend,
            playback,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Seed the synthetic welcome turn into a fresh transcript.
    pub fn seed_greeting(&self, text: impl Into<String>) {
        let mut history = self.history.lock().expect("history lock");
        if history.is_empty() {
            history.seed_greeting(text);
        }
    }

    /// Run one full exchange for a user send.
    ///
    /// Returns the assistant turn that answered (which may be an error
    /// turn). The network call is the sole suspension point; the history
    /// lock is never held across it.
    pub async fn send(
        &self,
        content: &str,
        attachment: Option<Attachment>,
    ) -> Result<Turn, SendError> {
        if content.trim().is_empty() && attachment.is_none() {
            return Err(SendError::EmptyInput);
        }

        // At most one exchange in flight.
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SendError::Busy);
        }
        let _guard = FlightGuard(&self.in_flight);

        let request = {
            let mut history = self.history.lock().expect("history lock");
            history
                .append(Role::User, content, attachment)
                .map_err(|_| SendError::EmptyInput)?;
            let payload = history.to_provider_payload();
            // Nothing textual to answer (attachment-only conversation so
            // far): reply with the fixed prompt instead of sending the
            // provider a system-only request.
            if payload.is_empty() {
                None
            } else {
                Some(compose(&payload, &self.persona, self.generation, &self.model))
            }
        };

        let reply = match request {
            None => EMPTY_HISTORY_REPLY.to_string(),
            Some(request) => match self.backend.complete(request).await {
                Ok(raw) => sanitize(&raw),
                Err(e) => {
                    tracing::error!("exchange failed: {e}");
                    format!("{ERROR_PREFIX}: {e}")
                }
            },
        };

        let turn = {
            let mut history = self.history.lock().expect("history lock");
            history
                .append(Role::Assistant, reply, None)
                .expect("sanitized reply is never blank")
                .clone()
        };

        self.playback.on_assistant_turn(&turn);

        Ok(turn)
    }

    /// Snapshot of the displayed transcript.
    pub fn turns(&self) -> Vec<Turn> {
        self.history.lock().expect("history lock").turns().to_vec()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn speaking(&self) -> watch::Receiver<bool> {
        self.playback.speaking()
    }

    pub fn reaction(&self) -> watch::Receiver<Option<Reaction>> {
        self.playback.reaction()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::config::settings::{AvatarSettings, ProfileSettings};
    use crate::playback::NullSpeechEngine;
    use crate::provider::{ChatCompletionRequest, ProviderError};

    /// Backend that replies with a fixed script and counts calls.
    struct ScriptedBackend {
        reply: Result<String, ()>,
        calls: Mutex<usize>,
        hold: Option<Notify>,
    }

    impl ScriptedBackend {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                calls: Mutex::new(0),
                hold: None,
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                calls: Mutex::new(0),
                hold: None,
            }
        }

        fn held(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                calls: Mutex::new(0),
                hold: Some(Notify::new()),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(
            &self,
            _request: ChatCompletionRequest,
        ) -> Result<String, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            if let Some(hold) = &self.hold {
                hold.notified().await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(()) => Err(ProviderError::Api {
                    status: 500,
                    detail: "Internal Server Error".into(),
                }),
            }
        }
    }

    fn coordinator(backend: Arc<ScriptedBackend>) -> ExchangeCoordinator {
        let persona = PersonaContract::for_profile(&ProfileSettings::default());
        let playback =
            PlaybackSynchronizer::new(Arc::new(NullSpeechEngine), AvatarSettings::default());
        ExchangeCoordinator::new(
            persona,
            GenerationConfig::default(),
            "test-model",
            backend,
            playback,
        )
    }

    #[tokio::test]
    async fn successful_exchange_appends_both_turns() {
        let backend = Arc::new(ScriptedBackend::replying("Guten Tag!"));
        let coordinator = coordinator(backend.clone());

        let turn = coordinator.send("Hallo", None).await.unwrap();
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.content, "Guten Tag!");

        let turns = coordinator.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert!(!coordinator.in_flight());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn empty_input_is_a_silent_no_op() {
        let backend = Arc::new(ScriptedBackend::replying("nie"));
        let coordinator = coordinator(backend.clone());

        assert!(matches!(
            coordinator.send("", None).await,
            Err(SendError::EmptyInput)
        ));
        assert!(matches!(
            coordinator.send("   ", None).await,
            Err(SendError::EmptyInput)
        ));

        assert!(coordinator.turns().is_empty());
        assert_eq!(backend.calls(), 0);
        assert!(!coordinator.in_flight());
    }

    #[tokio::test]
    async fn attachment_only_send_skips_the_provider() {
        let backend = Arc::new(ScriptedBackend::replying("nie"));
        let coordinator = coordinator(backend.clone());
        coordinator.seed_greeting("Willkommen!");

        let attachment = Attachment {
            data_url: "data:image/png;base64,AAAA".into(),
        };
        // The blank-content turn is filtered and the greeting is stripped,
        // leaving nothing to answer: fixed reply, no network call.
        let turn = coordinator.send("", Some(attachment)).await.unwrap();

        assert_eq!(backend.calls(), 0);
        assert_eq!(turn.content, "Bitte sende eine Nachricht");
        assert_eq!(coordinator.turns().len(), 3);
        assert!(!coordinator.in_flight());
    }

    #[tokio::test]
    async fn attachment_with_prior_text_still_reaches_provider() {
        let backend = Arc::new(ScriptedBackend::replying("Schönes Bild!"));
        let coordinator = coordinator(backend.clone());

        coordinator.send("Hallo", None).await.unwrap();

        let attachment = Attachment {
            data_url: "data:image/png;base64,AAAA".into(),
        };
        let turn = coordinator.send("", Some(attachment)).await.unwrap();

        // Earlier turns keep the projected history non-empty.
        assert_eq!(backend.calls(), 2);
        assert_eq!(turn.content, "Schönes Bild!");
    }

    #[tokio::test]
    async fn second_send_while_in_flight_is_rejected() {
        let backend = Arc::new(ScriptedBackend::held("Erste Antwort"));
        let coordinator = Arc::new(coordinator(backend.clone()));

        let first = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.send("Erste", None).await })
        };
        // Let the first send reach its suspension point.
        tokio::task::yield_now().await;
        assert!(coordinator.in_flight());

        let second = coordinator.send("Zweite", None).await;
        assert!(matches!(second, Err(SendError::Busy)));
        // No second user turn, no second network call.
        assert_eq!(coordinator.turns().len(), 1);
        assert_eq!(backend.calls(), 1);

        backend.hold.as_ref().unwrap().notify_one();
        first.await.unwrap().unwrap();

        assert!(!coordinator.in_flight());
        assert_eq!(coordinator.turns().len(), 2);
    }

    #[tokio::test]
    async fn failure_is_visible_in_transcript() {
        let backend = Arc::new(ScriptedBackend::failing());
        let coordinator = coordinator(backend);

        let turn = coordinator.send("Hallo", None).await.unwrap();
        assert_eq!(turn.role, Role::Assistant);
        assert!(turn.content.starts_with("❌ Fehler"));
        assert!(turn.content.contains("500"));

        // Exactly one error turn, and the pipeline is usable again.
        let turns = coordinator.turns();
        assert_eq!(turns.len(), 2);
        assert!(!coordinator.in_flight());
    }

    #[tokio::test]
    async fn raw_reply_is_sanitized_before_storage() {
        let backend = Arc::new(ScriptedBackend::replying(
            "<think>calc</think>Ein halbes Brot plus ein viertel Brot sind drei viertel \
             Brot — also 3/4.\n\nHoffe das hilft!",
        ));
        let coordinator = coordinator(backend);

        let turn = coordinator.send("Was ist 1/2 + 1/4?", None).await.unwrap();
        assert_eq!(
            turn.content,
            "Ein halbes Brot plus ein viertel Brot sind drei viertel Brot — also 3/4."
        );
    }

    #[tokio::test]
    async fn greeting_is_displayed_but_alternation_holds() {
        let backend = Arc::new(ScriptedBackend::replying("Antwort"));
        let coordinator = coordinator(backend);
        coordinator.seed_greeting("Willkommen!");

        coordinator.send("Frage eins", None).await.unwrap();
        coordinator.send("Frage zwei", None).await.unwrap();

        let turns = coordinator.turns();
        assert_eq!(turns.len(), 5);
        // Ignoring the greeting, the transcript strictly alternates
        // starting with a user turn.
        for (i, turn) in turns[1..].iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(turn.role, expected);
        }
    }
}
