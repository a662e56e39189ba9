use ragturn_core::error::ChatError;
use ragturn_core::traits::{ChatCompletionRequest, RagAgents};
use ragturn_core::types::{BotParameters, ChatMessage, CompletionUsage, Metadata, Role, ANSWER_META_KEY};
use ragturn_history::ChatBuffer;
use ragturn_retriever::{build_context_prompt, build_no_context_guess_prompt, build_no_context_llm_prompt};
use serde_json::{json, Value};

/// One assistant reply plus the usage it cost (`None` when no LLM call was
/// made, e.g. a direct question answer or a canned no-context message).
///
/// `history` is what `ChatReply.history` surfaces to the caller: for the
/// LLM branches this is the windowed request list *including* the
/// ephemeral system message, with the assistant's reply appended — matching
/// the original, which logs the ephemeral prompt alongside the reply. The
/// non-LLM branches have no ephemeral message, so it's just the buffer's
/// persisted history after the reply is appended.
pub struct BranchReply {
    pub message: ChatMessage,
    pub usage: Option<CompletionUsage>,
    pub history: Vec<ChatMessage>,
}

async fn call_llm(
    buffer: &mut ChatBuffer,
    agents: &dyn RagAgents,
    llm_model_id: i64,
    params: &BotParameters,
    ephemeral: ChatMessage,
) -> Result<(Vec<ChatMessage>, ChatMessage, CompletionUsage), ChatError> {
    let windowed = buffer.buffer(Some(ephemeral));
    let response = agents
        .chat(
            llm_model_id,
            ChatCompletionRequest {
                history: windowed.clone(),
                max_reply_tokens: params.max_reply_tokens,
                temperature: params.temperature,
                top_p: params.top_p,
            },
        )
        .await?;
    Ok((windowed, response.message, response.usage))
}

/// TextContext branch: answer using the retrieved context, via one LLM call.
pub async fn text_context_reply(
    buffer: &mut ChatBuffer,
    agents: &dyn RagAgents,
    llm_model_id: i64,
    params: &BotParameters,
    context_text: &str,
) -> Result<BranchReply, ChatError> {
    let ephemeral = ChatMessage::new(
        Role::System,
        build_context_prompt(context_text, params.no_context_llm_guess),
    );
    let (mut history, message, usage) = call_llm(buffer, agents, llm_model_id, params, ephemeral).await?;
    buffer.add_message(message.clone());
    history.push(message.clone());
    Ok(BranchReply {
        message,
        usage: Some(usage),
        history,
    })
}

/// QuestionContext branch: the matched node already carries the answer, so
/// no model call is made.
pub fn question_context_reply(
    buffer: &mut ChatBuffer,
    file_name: Option<&str>,
    group_name: Option<&str>,
    node: &ragturn_core::types::TextNodeWithScore,
) -> BranchReply {
    let answer = node
        .metadata
        .get(ANSWER_META_KEY)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut metadata = Metadata::new();
    metadata.insert(
        "no_llm_reply".to_string(),
        json!({ "file_name": file_name, "group_name": group_name }),
    );

    let message = ChatMessage::new(Role::Assistant, answer).with_metadata(metadata);
    buffer.add_message(message.clone());
    BranchReply {
        message,
        usage: None,
        history: buffer.history().to_vec(),
    }
}

/// No-context branch where the model is asked to guess, optionally
/// continuing from a canned message already shown to the user.
pub async fn no_context_llm_guess_reply(
    buffer: &mut ChatBuffer,
    agents: &dyn RagAgents,
    llm_model_id: i64,
    params: &BotParameters,
) -> Result<BranchReply, ChatError> {
    let canned = if params.no_context_use_message {
        Some(params.no_context_message.as_str())
    } else {
        None
    };
    let ephemeral = ChatMessage::new(Role::System, build_no_context_guess_prompt(canned));
    let (mut history, mut message, usage) = call_llm(buffer, agents, llm_model_id, params, ephemeral).await?;

    if params.no_context_use_message {
        message.content = format!("{}\n\n{}", params.no_context_message.trim(), message.content);
    }

    buffer.add_message(message.clone());
    history.push(message.clone());
    Ok(BranchReply {
        message,
        usage: Some(usage),
        history,
    })
}

/// No-context branch where the model states it doesn't know.
pub async fn no_context_llm_message_reply(
    buffer: &mut ChatBuffer,
    agents: &dyn RagAgents,
    llm_model_id: i64,
    params: &BotParameters,
) -> Result<BranchReply, ChatError> {
    let ephemeral = ChatMessage::new(Role::System, build_no_context_llm_prompt());
    let (mut history, message, usage) = call_llm(buffer, agents, llm_model_id, params, ephemeral).await?;
    buffer.add_message(message.clone());
    history.push(message.clone());
    Ok(BranchReply {
        message,
        usage: Some(usage),
        history,
    })
}

/// No-context branch where a canned message is returned directly, no model
/// call made.
pub fn no_context_saved_message_reply(buffer: &mut ChatBuffer, params: &BotParameters) -> BranchReply {
    let message = ChatMessage::new(Role::Assistant, params.no_context_message.clone());
    buffer.add_message(message.clone());
    BranchReply {
        message,
        usage: None,
        history: buffer.history().to_vec(),
    }
}

/// Dispatch the absent-context branch according to `params`' precedence:
/// LLM guess, then canned message, then plain "I don't know".
pub async fn no_context_reply(
    buffer: &mut ChatBuffer,
    agents: &dyn RagAgents,
    llm_model_id: i64,
    params: &BotParameters,
) -> Result<BranchReply, ChatError> {
    if params.no_context_llm_guess {
        no_context_llm_guess_reply(buffer, agents, llm_model_id, params).await
    } else if !params.no_context_message.is_empty() {
        Ok(no_context_saved_message_reply(buffer, params))
    } else {
        no_context_llm_message_reply(buffer, agents, llm_model_id, params).await
    }
}
