//! Wolfgang - digital trainer chatbot pipeline
//!
//! Serves a single-user conversational pipeline to an OpenAI-compatible
//! chat-completion endpoint, with a fixed German trainer persona, output
//! sanitization, and synchronized speech/avatar feedback.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod exchange;
mod playback;
mod provider;
mod routes;
mod sanitizer;

use config::{Config, PersonaContract, Settings};
use exchange::ExchangeCoordinator;
use playback::{NullSpeechEngine, PlaybackSynchronizer};
use provider::{GenerationConfig, HfClient};
use routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wolfgang=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    if config.hf_token.is_none() {
        tracing::warn!("HF_TOKEN is not set; every exchange will fail until it is configured");
    }

    let settings = Settings::load_or_default(config.settings_path.as_deref());
    let persona = PersonaContract::for_profile(&settings.profile);

    let backend = Arc::new(HfClient::new(&config)?);
    let playback =
        PlaybackSynchronizer::new(Arc::new(NullSpeechEngine), settings.avatar.clone());

    let coordinator = Arc::new(ExchangeCoordinator::new(
        persona,
        GenerationConfig::default(),
        config.model.clone(),
        backend,
        playback,
    ));
    coordinator.seed_greeting(settings.greeting());

    let state = AppState { coordinator };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("🎓 Wolfgang running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
