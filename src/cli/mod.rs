use clap::Parser;

pub const DEFAULT_GREETING: &str = "Hello! I’m your AI assistant. Ask me anything!";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Address the webhook server binds to.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the webhook server listens on.
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Optional shared secret. When set, inbound events must carry a matching
    /// `X-Relay-Signature: sha256=<hex>` HMAC of the request body.
    #[arg(long, env = "WEBHOOK_SECRET")]
    pub webhook_secret: Option<String>,

    /// Text returned when the bot is added to a space.
    #[arg(long, env = "GREETING_TEXT", default_value = DEFAULT_GREETING)]
    pub greeting: String,

    /// Upper bound on replies being generated at the same time.
    #[arg(long, env = "MAX_CONCURRENT_REPLIES", default_value = "32")]
    pub max_concurrent_replies: usize,

    /// Timeout in seconds for outbound HTTP calls (completion API, chat API).
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "60")]
    pub http_timeout_secs: u64,

    // --- Chat LLM Provider Args ---
    /// API Key for the completion API.
    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Base URL of the completion API; `/v1/responses` is appended.
    #[arg(long, env = "CHAT_BASE_URL", default_value = "https://api.openai.com")]
    pub chat_base_url: String,

    /// Model name sent with every completion request.
    #[arg(long, env = "CHAT_MODEL", default_value = "gpt-4.1-mini")]
    pub chat_model: String,

    // --- Google Chat Delivery Args ---
    /// Service-account JSON descriptor used to obtain chat.bot tokens.
    #[arg(long, env = "GOOGLE_CREDENTIALS", hide_env_values = true)]
    pub google_credentials: Option<String>,

    /// Base URL of the Google Chat REST API.
    #[arg(long, env = "GOOGLE_CHAT_BASE_URL", default_value = "https://chat.googleapis.com")]
    pub chat_delivery_base_url: String,

    // --- History Store Args ---
    /// History chat store type (redis, memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "redis")]
    pub history_type: String,

    /// History chat store host endpoint (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "HISTORY_HOST", default_value = "redis://127.0.0.1:6379")]
    pub history_host: String,

    /// Prefix for Redis history keys.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "history:")]
    pub history_redis_prefix: String,

    /// Number of messages kept per conversation and sent as context.
    #[arg(long, env = "HISTORY_LIMIT", default_value = "5")]
    pub history_limit: usize,
}

impl Args {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
