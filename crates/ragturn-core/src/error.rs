use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat not found: {chat_id}")]
    ChatNotFound { chat_id: String },

    #[error("Bot not found: {name}")]
    BotNotFound { name: String },

    #[error("Bot already exists: {name}")]
    BotExists { name: String },

    #[error("Already initialized")]
    InitializedAlready,

    #[error("Upstream RAG error: {0}")]
    UpstreamRag(String),

    #[error("Cache transport error: {0}")]
    CacheTransport(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChatError {
    /// Short error code, mirrored into client-facing error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::ChatNotFound { .. } => "CHAT_NOT_FOUND",
            ChatError::BotNotFound { .. } => "BOT_NOT_FOUND",
            ChatError::BotExists { .. } => "BOT_EXISTS",
            ChatError::InitializedAlready => "INITIALIZED_ALREADY",
            ChatError::UpstreamRag(_) => "UPSTREAM_RAG_ERROR",
            ChatError::CacheTransport(_) => "CACHE_TRANSPORT_ERROR",
            ChatError::InvalidInput(_) => "INVALID_INPUT",
            ChatError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
