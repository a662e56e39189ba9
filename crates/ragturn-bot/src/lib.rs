//! The bot handle: index-name derivation and the thin wrapper over a bot's
//! group metadata lookup.
//!
//! Bot creation, parameter persistence, and content upload/update/delete
//! live in a relational store outside this crate — see the top-level
//! design notes for why they aren't modeled here.

use std::sync::Arc;

use ragturn_core::error::ChatError;
use ragturn_core::traits::RagGroupInfo;
use ragturn_core::types::{GroupInfo, IndexType};

/// A bot is just a name bound to two index groups plus a handle to the RAG
/// backend's group-info lookup. It carries no mutable state of its own.
#[derive(Clone)]
pub struct Bot {
    name: String,
    group_info: Arc<dyn RagGroupInfo>,
}

impl Bot {
    pub fn new(name: impl Into<String>, group_info: Arc<dyn RagGroupInfo>) -> Self {
        Self {
            name: name.into(),
            group_info,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index name for a given index type, e.g. `acme-document-index`.
    ///
    /// This suffix mapping must not change — it is load-bearing for every
    /// index already provisioned against a bot's name.
    pub fn group_name(&self, index_type: IndexType) -> String {
        Self::bot_group_name(&self.name, index_type)
    }

    pub fn bot_group_name(bot_name: &str, index_type: IndexType) -> String {
        index_type.group_name(bot_name)
    }

    /// Fetch the LLM/rerank/embedding model ids bound to this bot's
    /// document index.
    pub async fn retrieve_group_info(&self) -> Result<GroupInfo, ChatError> {
        self.group_info
            .about(&self.group_name(IndexType::Document))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeGroupInfo;

    #[async_trait]
    impl RagGroupInfo for FakeGroupInfo {
        async fn about(&self, group_name: &str) -> Result<GroupInfo, ChatError> {
            assert_eq!(group_name, "acme-document-index");
            Ok(GroupInfo {
                llm_model_id: 1,
                rerank_model_id: 2,
                embedding_model_id: 3,
            })
        }
    }

    #[test]
    fn derives_index_names_with_fixed_suffixes() {
        let bot = Bot::new("acme", Arc::new(FakeGroupInfo));
        assert_eq!(bot.group_name(IndexType::Document), "acme-document-index");
        assert_eq!(bot.group_name(IndexType::Question), "acme-question-index");
    }

    #[tokio::test]
    async fn retrieve_group_info_queries_the_document_index() {
        let bot = Bot::new("acme", Arc::new(FakeGroupInfo));
        let info = bot.retrieve_group_info().await.unwrap();
        assert_eq!(info.llm_model_id, 1);
    }
}
