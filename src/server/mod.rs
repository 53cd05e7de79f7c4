pub mod webhook;

use crate::dispatch::Dispatcher;
use axum::{ routing::{ get, post }, Router };
use log::{ info, warn };
use std::error::Error;
use std::sync::Arc;

/// Everything the webhook handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub greeting: Arc<str>,
    pub webhook_secret: Option<Arc<str>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(webhook::handle_event))
        .route("/healthz", get(webhook::health))
        .with_state(state)
}

pub struct Server {
    addr: String,
    state: AppState,
}

impl Server {
    pub fn new(addr: String, state: AppState) -> Self {
        if state.webhook_secret.is_some() {
            info!("Server configured with webhook signature verification.");
        } else {
            warn!("Server configured WITHOUT webhook signature verification. Events are trusted as-is.");
        }
        Self { addr, state }
    }

    pub async fn run(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await.map_err(|e|
            format!("Failed to bind HTTP server to {}: {}. Try a different port.", self.addr, e)
        )?;
        info!("Webhook server listening on: http://{}", self.addr);

        axum::serve(listener, router(self.state)).await?;
        Ok(())
    }
}
