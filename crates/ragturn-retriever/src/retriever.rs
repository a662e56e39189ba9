use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use ragturn_core::error::ChatError;
use ragturn_core::traits::{RagAgents, RagContent};
use ragturn_core::types::{
    BotParameters, CompletionUsage, GroupSearchResponse, IndexType, MetadataFilter,
    SearchGroupConfig, TextNodeWithScore,
};
use tracing::{debug, instrument};

use crate::classify::build_context;

pub use ragturn_core::types::Context;

/// Result of one `retrieve` call.
#[derive(Debug, Clone, Default)]
pub struct RetrieveResponse {
    pub context: Option<Context>,
    pub group_responses: BTreeMap<String, GroupSearchResponse>,
    pub token_usage: Vec<CompletionUsage>,
    pub search_units: u32,
}

/// Fans a prompt out across a bot's DOCUMENT/QUESTION indexes (optionally
/// federated with peer bots' indexes), re-ranks the merged node set, and
/// classifies the result into a [`Context`].
pub struct ContextRetriever {
    content: Arc<dyn RagContent>,
    agents: Arc<dyn RagAgents>,
    bot_name: String,
    rerank_model_id: i64,
}

impl ContextRetriever {
    pub fn new(
        content: Arc<dyn RagContent>,
        agents: Arc<dyn RagAgents>,
        bot_name: impl Into<String>,
        rerank_model_id: i64,
    ) -> Self {
        Self {
            content,
            agents,
            bot_name: bot_name.into(),
            rerank_model_id,
        }
    }

    #[instrument(skip(self, metadata_filter), fields(bot = %self.bot_name, extra_bots = extra_bots.len()))]
    pub async fn retrieve(
        &self,
        prompt: &str,
        metadata_filter: Option<MetadataFilter>,
        extra_bots: &[String],
        params: &BotParameters,
    ) -> Result<RetrieveResponse, ChatError> {
        let searches = IndexType::ALL.iter().map(|&index_type| {
            let own_group = index_type.group_name(&self.bot_name);
            let extra_groups = extra_bots
                .iter()
                .map(|bot| index_type.group_name(bot))
                .collect();
            let config = SearchGroupConfig {
                prompt: prompt.to_string(),
                top_k: params.top_k,
                min_k: params.min_k,
                top_n: params.top_n,
                min_n: params.min_n,
                search_filter: metadata_filter.clone(),
                extra_groups,
            };
            let content = Arc::clone(&self.content);
            async move {
                let result = content.search(&own_group, &config).await;
                (own_group, result)
            }
        });

        let searched = join_all(searches).await;

        let mut group_responses = BTreeMap::new();
        let mut nodes: Vec<TextNodeWithScore> = Vec::new();
        let mut search_units = 0u32;

        for (group_name, result) in searched {
            let response = result?;
            search_units += response.search_units;
            nodes.extend(response.nodes.clone());
            group_responses.insert(group_name, response);
        }

        if nodes.is_empty() {
            debug!("no nodes returned by any index, context is absent");
            return Ok(RetrieveResponse {
                context: None,
                group_responses,
                token_usage: Vec::new(),
                search_units,
            });
        }

        let rerank = self
            .agents
            .rerank(self.rerank_model_id, prompt, nodes, params.top_n, params.min_n)
            .await?;
        search_units += rerank.search_units;

        let context = build_context(rerank.ranked_nodes);

        Ok(RetrieveResponse {
            context,
            group_responses,
            token_usage: Vec::new(),
            search_units,
        })
    }
}
