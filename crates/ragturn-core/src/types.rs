use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Extra headroom subtracted from `max_input_tokens` before windowing the
/// history buffer, so a completion's own framing never pushes it over.
pub const EXTRA_TOKEN_MARGIN: usize = 5;

pub const TOKEN_COUNT_META_KEY: &str = "token_count";
pub const EPHEMERAL_META_KEY: &str = "is_ephemeral";
pub const FILE_NAME_META_KEY: &str = "file_name";
pub const LLM_REPLY_META_KEY: &str = "llm_reply";
pub const GROUP_NAME_META_KEY: &str = "group_name";
pub const ANSWER_META_KEY: &str = "answer";
pub const RELATED_PROMPTS_META_KEY: &str = "related_prompts";

pub type Metadata = BTreeMap<String, Value>;

/// The two retrieval indexes every bot owns.
///
/// The suffix mapping below must not be changed — it is load-bearing for
/// every bot's index names already provisioned in the RAG backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    Document,
    Question,
}

impl IndexType {
    pub const ALL: [IndexType; 2] = [IndexType::Document, IndexType::Question];

    pub fn suffix(self) -> &'static str {
        match self {
            IndexType::Document => "-document-index",
            IndexType::Question => "-question-index",
        }
    }

    /// The index group name for a given bot, e.g. `acme-document-index`.
    ///
    /// Single source of truth for this mapping — `ragturn-bot` and
    /// `ragturn-retriever` both derive group names through this method so
    /// the two can never drift apart.
    pub fn group_name(self, bot_name: &str) -> String {
        format!("{bot_name}{}", self.suffix())
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexType::Document => write!(f, "DOCUMENT"),
            IndexType::Question => write!(f, "QUESTION"),
        }
    }
}

/// Role of a message in a chat transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in a chat transcript.
///
/// `metadata` carries bookkeeping the history buffer and retriever attach
/// (`token_count`, `is_ephemeral`, `no_llm_reply`, ...). Messages flagged
/// `is_ephemeral` are never persisted to the session cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_ephemeral(&self) -> bool {
        self.metadata
            .get(EPHEMERAL_META_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn token_count(&self) -> Option<usize> {
        self.metadata
            .get(TOKEN_COUNT_META_KEY)
            .and_then(Value::as_u64)
            .map(|n| n as usize)
    }

    pub fn set_token_count(&mut self, count: usize) {
        self.metadata
            .insert(TOKEN_COUNT_META_KEY.to_string(), Value::from(count));
    }
}

/// Persisted state for one chat session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatState {
    pub started_at: i64,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// Per-bot, per-turn tuning knobs. Read fresh from the parameter store each
/// turn — the core never caches these across requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotParameters {
    pub max_input_tokens: usize,
    pub max_reply_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: usize,
    pub min_k: f32,
    pub top_n: usize,
    pub min_n: f32,
    pub llm_generate_related_prompts: bool,
    pub no_context_message: String,
    pub no_context_use_message: bool,
    pub no_context_llm_guess: bool,
    pub system_message: Option<String>,
}

impl Default for BotParameters {
    fn default() -> Self {
        Self {
            max_input_tokens: 2000,
            max_reply_tokens: 1024,
            temperature: 0.9,
            top_p: 0.0,
            top_k: 10,
            min_k: 0.5,
            top_n: 3,
            min_n: 0.7,
            llm_generate_related_prompts: true,
            no_context_message: "Sorry, I'm not sure about that.".to_string(),
            no_context_use_message: false,
            no_context_llm_guess: false,
            system_message: None,
        }
    }
}

/// A retrieved node, scored by the index (and later re-scored by the
/// re-ranker).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextNodeWithScore {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub score: f32,
}

impl TextNodeWithScore {
    pub fn is_question_node(&self) -> bool {
        self.metadata.contains_key(ANSWER_META_KEY) && self.metadata.contains_key(LLM_REPLY_META_KEY)
    }

    pub fn is_llm_reply(&self) -> bool {
        self.is_question_node()
            && self
                .metadata
                .get(LLM_REPLY_META_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }

    pub fn related_prompts(&self) -> Vec<String> {
        self.metadata
            .get(RELATED_PROMPTS_META_KEY)
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A retrievable asset (image, attachment) that may be embedded in a reply
/// via markdown image syntax `![label](<uuid>)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub uuid: String,
    pub data: String,
    pub description: String,
    pub mimetype: String,
}

/// Classification of retrieved context for a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "context_type")]
pub enum Context {
    #[serde(rename = "QUESTION")]
    Question {
        file_name: Option<String>,
        group_name: Option<String>,
        node: TextNodeWithScore,
        related_prompts: Vec<String>,
    },
    #[serde(rename = "TEXT")]
    Text {
        text: String,
        nodes: Vec<TextNodeWithScore>,
        related_prompts: Vec<String>,
    },
}

impl Context {
    pub fn related_prompts(&self) -> &[String] {
        match self {
            Context::Question { related_prompts, .. } => related_prompts,
            Context::Text { related_prompts, .. } => related_prompts,
        }
    }

    pub fn is_question(&self) -> bool {
        matches!(self, Context::Question { .. })
    }
}

/// Token accounting for one LLM/rerank/agent call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CompletionUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Structured metadata constraint forwarded verbatim to the index search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFilter {
    #[serde(default)]
    pub must: Vec<Value>,
    #[serde(default)]
    pub must_not: Vec<Value>,
    #[serde(default)]
    pub should: Vec<Value>,
}

/// Parameters for one index search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchGroupConfig {
    pub prompt: String,
    pub top_k: usize,
    pub min_k: f32,
    pub top_n: usize,
    pub min_n: f32,
    #[serde(default)]
    pub search_filter: Option<MetadataFilter>,
    #[serde(default)]
    pub extra_groups: Vec<String>,
}

/// Raw result of one index search, keyed by group name by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupSearchResponse {
    pub nodes: Vec<TextNodeWithScore>,
    pub assets: Vec<Asset>,
    pub search_units: u32,
}

/// Model identifiers associated with a bot's document index group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    pub llm_model_id: i64,
    pub rerank_model_id: i64,
    pub embedding_model_id: i64,
}

/// Output of the re-ranker for one call.
#[derive(Debug, Clone, Default)]
pub struct RerankResult {
    pub ranked_nodes: Vec<TextNodeWithScore>,
    pub search_units: u32,
}

/// Assistant/user reply content returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReplyContent {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Full result of one `send`/`query` turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub prompt: String,
    pub content: ChatReplyContent,
    pub history: Vec<ChatMessage>,
    pub group_responses: BTreeMap<String, GroupSearchResponse>,
    pub context: Option<Context>,
    pub related_prompts: Vec<String>,
    pub token_usage: Vec<CompletionUsage>,
    pub total_usage: CompletionUsage,
    pub search_units: u32,
    pub verified_response: bool,
}
