pub mod agent;
pub mod chat;
pub mod cli;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;

use agent::AIAgent;
use chat::auth::ServiceAccountTokenProvider;
use chat::GoogleChatClient;
use cli::Args;
use dispatch::Dispatcher;
use history::initialize_history_store;
use llm::{ new_client as new_chat_client, ChatClient, LlmConfig };
use log::{ info, warn };
use server::{ AppState, Server };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.trim().is_empty())
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Listen Address: {}", args.listen_addr());
    info!("Chat Model: {}", args.chat_model);
    info!("Chat Base URL: {}", args.chat_base_url);
    info!("Chat API Key Set: {}", !args.chat_api_key.trim().is_empty());
    info!("Google Chat Base URL: {}", args.chat_delivery_base_url);
    info!("Google Credentials Set: {}", is_set(&args.google_credentials));
    info!("History Store Type: {}", args.history_type);
    info!("History Store Host: {}", args.history_host);
    info!("History Limit: {}", args.history_limit);
    info!("Max Concurrent Replies: {}", args.max_concurrent_replies);
    info!("Webhook Signature Check: {}", is_set(&args.webhook_secret));
    info!("-------------------------");

    let timeout = Some(Duration::from_secs(args.http_timeout_secs));

    let chat_client = new_chat_client(&LlmConfig::from_args(&args))?;
    info!("Chat client configured: Model={}", chat_client.get_model());

    let history_store = initialize_history_store(&args)?;
    let agent = Arc::new(AIAgent::new(chat_client, history_store, args.history_limit));

    let tokens = ServiceAccountTokenProvider::new(args.google_credentials.clone());
    if !tokens.is_configured() {
        warn!("GOOGLE_CREDENTIALS is not set; replies cannot be delivered until it is.");
    }
    let sender = GoogleChatClient::new(&args.chat_delivery_base_url, Arc::new(tokens), timeout)?;

    let state = AppState {
        dispatcher: Dispatcher::new(agent, Arc::new(sender), args.max_concurrent_replies),
        greeting: Arc::from(args.greeting.as_str()),
        webhook_secret: args.webhook_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(Arc::from),
    };

    Server::new(args.listen_addr(), state).run().await
}
