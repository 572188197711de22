//! Buddy Chat - a chat companion that can see your screen
//!
//! Every message is sent to a vision-capable chat model together with a
//! screenshot taken at the moment you hit send. A chat window talks to
//! this process over a small local HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod capture;
mod config;
mod conversation;
mod core;
mod providers;
mod routes;

use capture::{CaptureCommand, CaptureService, Recorder};
use config::{Config, PromptSettings};
use crate::core::ChatSession;
use providers::{OpenAICompatConfig, OpenAICompatProvider};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub session: ChatSession,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "buddy_chat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let prompts = match &config.prompts_file {
        Some(path) => PromptSettings::load_from_file(path)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Using built-in prompts: {}", e);
                PromptSettings::builtin()
            }),
        None => PromptSettings::builtin(),
    };

    let provider = OpenAICompatProvider::new(OpenAICompatConfig::from_config(&config, &prompts));
    if !provider.has_credential() {
        tracing::warn!("OPENAI_API_KEY is not set; every message will fail until it is");
    }

    let capture = CaptureService::probe(
        CaptureCommand::screencapture(&config.capture_program),
        &config.scratch_dir,
    );
    let recorder = Recorder::probe(config.recorder_path.as_deref());

    let session = ChatSession::new(Arc::new(provider), capture, prompts, recorder);

    if config.recorder_autostart {
        if let Err(e) = session.start_recorder().await {
            tracing::warn!("Recorder not started: {}", e);
        }
    }

    let state = AppState {
        session: session.clone(),
    };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!(model = %config.model, "Buddy Chat running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    session.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
