use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or unusable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential exchange with the token endpoint failed.
    #[error("credential exchange failed: {0}")]
    Auth(String),

    /// The completion API was unreachable or answered with an unexpected shape.
    #[error("completion API error: {0}")]
    Upstream(String),

    /// Posting the reply to the chat platform failed.
    #[error("chat delivery failed: {0}")]
    Delivery(String),

    #[error("malformed event: {0}")]
    Parse(String),

    #[error("history store error: {0}")]
    History(String),
}

impl From<redis::RedisError> for RelayError {
    fn from(err: redis::RedisError) -> Self {
        RelayError::History(err.to_string())
    }
}
