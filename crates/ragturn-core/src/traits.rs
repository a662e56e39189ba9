use async_trait::async_trait;

use crate::error::ChatError;
use crate::types::{
    ChatMessage, ChatState, CompletionUsage, GroupInfo, GroupSearchResponse, RerankResult,
    SearchGroupConfig, TextNodeWithScore,
};

/// TTL-backed storage for [`ChatState`], keyed by chat id.
///
/// Implementations MUST treat the key as opaque and MUST NOT reorder or
/// mutate history on write. Callers are responsible for serializing
/// concurrent `set` calls against the same key — this trait makes no
/// read-modify-write atomicity guarantee.
#[async_trait]
pub trait ChatCache: Send + Sync {
    async fn set(&self, chat_id: &str, state: &ChatState, ttl_secs: u64) -> Result<(), ChatError>;
    async fn get(&self, chat_id: &str) -> Result<Option<ChatState>, ChatError>;
    async fn delete(&self, chat_id: &str) -> Result<(), ChatError>;

    async fn exists(&self, chat_id: &str) -> Result<bool, ChatError> {
        Ok(self.get(chat_id).await?.is_some())
    }
}

/// Search and content-management surface for a single index group.
#[async_trait]
pub trait RagContent: Send + Sync {
    async fn search(
        &self,
        group_name: &str,
        config: &SearchGroupConfig,
    ) -> Result<GroupSearchResponse, ChatError>;
}

/// Request payload for one LLM completion call.
#[derive(Debug, Clone)]
pub struct ChatCompletionRequest {
    pub history: Vec<ChatMessage>,
    pub max_reply_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

/// Result of one LLM completion call.
#[derive(Debug, Clone)]
pub struct ChatCompletionResponse {
    pub message: ChatMessage,
    pub usage: CompletionUsage,
}

/// Request payload for the follow-up related-prompts agent.
#[derive(Debug, Clone)]
pub struct RelatedPromptsRequest {
    pub llm_prompt: String,
    pub llm_reply: String,
    pub max_reply_tokens: usize,
    pub temperature: f32,
}

/// Result of the related-prompts agent call.
#[derive(Debug, Clone, Default)]
pub struct RelatedPromptsResponse {
    pub related_prompts: Vec<String>,
    pub usage: Vec<CompletionUsage>,
}

/// LLM-backed agent operations: completion, re-ranking, follow-up prompts.
#[async_trait]
pub trait RagAgents: Send + Sync {
    async fn chat(
        &self,
        model_id: i64,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ChatError>;

    async fn rerank(
        &self,
        model_id: i64,
        prompt: &str,
        nodes: Vec<TextNodeWithScore>,
        top_n: usize,
        min_n: f32,
    ) -> Result<RerankResult, ChatError>;

    async fn related_prompts(
        &self,
        model_id: i64,
        request: RelatedPromptsRequest,
    ) -> Result<RelatedPromptsResponse, ChatError>;
}

/// Bot-level index metadata lookup.
#[async_trait]
pub trait RagGroupInfo: Send + Sync {
    async fn about(&self, group_name: &str) -> Result<GroupInfo, ChatError>;
}
