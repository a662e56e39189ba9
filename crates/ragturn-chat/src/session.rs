use std::sync::Arc;

use ragturn_bot::Bot;
use ragturn_core::error::ChatError;
use ragturn_core::traits::{ChatCache, RagAgents, RagContent, RelatedPromptsRequest};
use ragturn_core::types::{
    Asset, BotParameters, ChatMessage, ChatReply, ChatReplyContent, ChatState, CompletionUsage,
    Context, MetadataFilter, Role,
};
use ragturn_history::{ChatBuffer, Tokenizer};
use ragturn_retriever::ContextRetriever;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::assets::{extract_used_assets, strip_asset_data};
use crate::branches::{no_context_reply, question_context_reply, text_context_reply};

/// Swap out the chat's system message (if any) for the one currently
/// configured on the bot, keeping it at history position 0. A bot with no
/// configured system message drops any previously stored one.
fn set_system_message(history: &mut Vec<ChatMessage>, system_message: Option<&str>) {
    if history.first().map(|m| m.role == Role::System).unwrap_or(false) {
        history.remove(0);
    }
    if let Some(text) = system_message {
        history.insert(0, ChatMessage::new(Role::System, text));
    }
}

fn sum_usage(usage: &[CompletionUsage]) -> CompletionUsage {
    usage.iter().fold(CompletionUsage::default(), |mut acc, u| {
        acc.prompt_tokens += u.prompt_tokens;
        acc.completion_tokens += u.completion_tokens;
        acc.total_tokens += u.total_tokens;
        acc
    })
}

/// Orchestrates the chat-turn pipeline: session lifecycle, context
/// retrieval, branch dispatch, and cache persistence.
pub struct ChatSession {
    cache: Arc<dyn ChatCache>,
    content: Arc<dyn RagContent>,
    agents: Arc<dyn RagAgents>,
    tokenizer: Arc<dyn Tokenizer>,
    ttl_secs: u64,
}

impl ChatSession {
    pub fn new(
        cache: Arc<dyn ChatCache>,
        content: Arc<dyn RagContent>,
        agents: Arc<dyn RagAgents>,
        tokenizer: Arc<dyn Tokenizer>,
        ttl_secs: u64,
    ) -> Self {
        Self {
            cache,
            content,
            agents,
            tokenizer,
            ttl_secs,
        }
    }

    async fn load(&self, chat_id: &str) -> Result<ChatState, ChatError> {
        self.cache
            .get(chat_id)
            .await?
            .ok_or_else(|| ChatError::ChatNotFound {
                chat_id: chat_id.to_string(),
            })
    }

    async fn persist(&self, chat_id: &str, started_at: i64, history: Vec<ChatMessage>) -> Result<(), ChatError> {
        let state = ChatState { started_at, history };
        self.cache.set(chat_id, &state, self.ttl_secs).await
    }

    #[instrument(skip(self))]
    pub async fn start_chat(&self) -> Result<String, ChatError> {
        let chat_id = Uuid::new_v4().to_string();
        let state = ChatState {
            started_at: chrono::Utc::now().timestamp(),
            history: Vec::new(),
        };
        self.cache.set(&chat_id, &state, self.ttl_secs).await?;
        Ok(chat_id)
    }

    #[instrument(skip(self))]
    pub async fn end_chat(&self, chat_id: &str) -> Result<(), ChatError> {
        if !self.cache.exists(chat_id).await? {
            return Err(ChatError::ChatNotFound {
                chat_id: chat_id.to_string(),
            });
        }
        self.cache.delete(chat_id).await
    }

    pub async fn chat_exists(&self, chat_id: &str) -> Result<bool, ChatError> {
        self.cache.exists(chat_id).await
    }

    pub async fn chat_history(&self, chat_id: &str) -> Result<Vec<ChatMessage>, ChatError> {
        Ok(self.load(chat_id).await?.history)
    }

    /// Run one chat turn: retrieve context, append the user's prompt,
    /// dispatch the reply branch, and persist the updated transcript.
    ///
    /// The bot's LLM/rerank model ids are resolved fresh from its document
    /// index's group info on every turn, same as the original — a bot's
    /// model wiring is not cached across requests.
    ///
    /// The user's prompt is persisted as soon as it's appended — before the
    /// branch's (possible) LLM call — so a transient completion failure
    /// never drops what the user said. A retrieval failure, before the
    /// prompt is appended at all, does not touch the stored transcript.
    #[instrument(skip(self, bot, params, metadata_filter), fields(chat_id, bot_name = bot.name()))]
    pub async fn send(
        &self,
        chat_id: &str,
        bot: &Bot,
        prompt: &str,
        extra_bots: &[String],
        metadata_filter: Option<MetadataFilter>,
        params: &BotParameters,
    ) -> Result<ChatReply, ChatError> {
        if prompt.trim().is_empty() {
            return Err(ChatError::InvalidInput("prompt must not be empty".to_string()));
        }

        let (mut state, group_info) = tokio::try_join!(self.load(chat_id), bot.retrieve_group_info())?;
        set_system_message(&mut state.history, params.system_message.as_deref());

        let llm_model_id = group_info.llm_model_id;
        let rerank_model_id = group_info.rerank_model_id;

        let retriever = ContextRetriever::new(
            Arc::clone(&self.content),
            Arc::clone(&self.agents),
            bot.name(),
            rerank_model_id,
        );
        let retrieved = retriever
            .retrieve(prompt, metadata_filter, extra_bots, params)
            .await?;

        let mut buffer = ChatBuffer::new(Arc::clone(&self.tokenizer), params.max_input_tokens, state.history);
        buffer.add_message(ChatMessage::new(Role::User, prompt));
        self.persist(chat_id, state.started_at, buffer.history().to_vec())
            .await?;

        let mut related_prompts = retrieved.context.as_ref().map(|c| c.related_prompts().to_vec()).unwrap_or_default();

        let branch = match &retrieved.context {
            Some(Context::Text { text, .. }) => {
                text_context_reply(&mut buffer, self.agents.as_ref(), llm_model_id, params, text).await?
            }
            Some(Context::Question {
                file_name,
                group_name,
                node,
                ..
            }) => question_context_reply(
                &mut buffer,
                file_name.as_deref(),
                group_name.as_deref(),
                node,
            ),
            None => no_context_reply(&mut buffer, self.agents.as_ref(), llm_model_id, params).await?,
        };

        self.persist(chat_id, state.started_at, buffer.history().to_vec())
            .await?;

        let mut token_usage: Vec<CompletionUsage> = Vec::new();
        if let Some(usage) = branch.usage {
            token_usage.push(usage);
        }
        token_usage.extend(retrieved.token_usage.clone());

        if params.llm_generate_related_prompts && related_prompts.is_empty() {
            match self
                .agents
                .related_prompts(
                    llm_model_id,
                    RelatedPromptsRequest {
                        llm_prompt: prompt.to_string(),
                        llm_reply: branch.message.content.clone(),
                        max_reply_tokens: 500,
                        temperature: 0.1,
                    },
                )
                .await
            {
                Ok(response) => {
                    related_prompts = response.related_prompts;
                    token_usage.extend(response.usage);
                }
                Err(error) => {
                    warn!(%error, "related-prompts agent failed, continuing without suggestions");
                }
            }
        }

        let asset_pool: Vec<Asset> = retrieved
            .group_responses
            .values()
            .flat_map(|r| r.assets.clone())
            .collect();
        let used_assets = extract_used_assets(&branch.message.content, &asset_pool);

        let verified_response = retrieved
            .context
            .as_ref()
            .map(|c| c.is_question())
            .unwrap_or(false);

        Ok(ChatReply {
            prompt: prompt.to_string(),
            content: ChatReplyContent {
                role: branch.message.role,
                content: branch.message.content.clone(),
                assets: used_assets,
                metadata: branch.message.metadata.clone(),
            },
            history: branch.history,
            group_responses: strip_asset_data(retrieved.group_responses),
            context: retrieved.context,
            related_prompts,
            total_usage: sum_usage(&token_usage),
            token_usage,
            search_units: retrieved.search_units,
            verified_response,
        })
    }

    /// `start_chat` + `send` + `end_chat`, composed rather than duplicated
    /// so single-shot queries can never drift from the multi-turn path.
    ///
    /// A successful reply is returned even if the trailing `end_chat`
    /// cleanup fails (e.g. a transient cache error) — the caller already
    /// has a good answer, and the cache entry will simply expire via its
    /// TTL instead of being deleted early.
    pub async fn query(
        &self,
        bot: &Bot,
        prompt: &str,
        extra_bots: &[String],
        metadata_filter: Option<MetadataFilter>,
        params: &BotParameters,
    ) -> Result<ChatReply, ChatError> {
        let chat_id = self.start_chat().await?;
        let result = self
            .send(&chat_id, bot, prompt, extra_bots, metadata_filter, params)
            .await;
        if let Err(error) = self.end_chat(&chat_id).await {
            warn!(%error, chat_id, "failed to clean up one-shot chat session");
        }
        result
    }
}
