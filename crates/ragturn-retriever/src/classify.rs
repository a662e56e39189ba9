use ragturn_core::types::{Context, TextNodeWithScore, FILE_NAME_META_KEY, GROUP_NAME_META_KEY};
use serde_json::Value;

/// Render nodes as a numbered context block for a text-context prompt.
pub fn build_text_context(nodes: &[TextNodeWithScore]) -> String {
    nodes
        .iter()
        .enumerate()
        .map(|(i, n)| format!("[DOCUMENT #{}]\n{}", i + 1, n.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Classify re-ranked nodes into a [`Context`], or `None` if the list is
/// empty.
///
/// The highest-scoring node wins; on a tie (no later node strictly exceeds
/// it) the first such node in ranking order wins. A node carrying both
/// `answer` and `llm_reply` metadata is a *question node*: if `llm_reply`
/// is false it's answered directly with no model call, otherwise its
/// answer is folded into the normal text-context flow as a single-node
/// context (the broader ranked set is still kept for asset resolution).
pub fn build_context(ranked_nodes: Vec<TextNodeWithScore>) -> Option<Context> {
    if ranked_nodes.is_empty() {
        return None;
    }

    let mut top_idx = 0usize;
    for i in 1..ranked_nodes.len() {
        if ranked_nodes[i].score > ranked_nodes[top_idx].score {
            top_idx = i;
        }
    }

    let is_question = ranked_nodes[top_idx].is_question_node();
    let is_llm_reply = ranked_nodes[top_idx].is_llm_reply();

    if is_question && !is_llm_reply {
        let top = ranked_nodes[top_idx].clone();
        let file_name = top
            .metadata
            .get(FILE_NAME_META_KEY)
            .and_then(Value::as_str)
            .map(String::from);
        let group_name = top
            .metadata
            .get(GROUP_NAME_META_KEY)
            .and_then(Value::as_str)
            .map(String::from);
        let related_prompts = top.related_prompts();
        return Some(Context::Question {
            file_name,
            group_name,
            node: top,
            related_prompts,
        });
    }

    if is_question && is_llm_reply {
        let top = ranked_nodes[top_idx].clone();
        let related_prompts = top.related_prompts();
        let text = build_text_context(std::slice::from_ref(&top));
        return Some(Context::Text {
            text,
            nodes: ranked_nodes,
            related_prompts,
        });
    }

    let text = build_text_context(&ranked_nodes);
    Some(Context::Text {
        text,
        nodes: ranked_nodes,
        related_prompts: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragturn_core::types::Metadata;
    use serde_json::json;

    fn node(text: &str, score: f32, metadata: Metadata) -> TextNodeWithScore {
        TextNodeWithScore {
            text: text.to_string(),
            metadata,
            score,
        }
    }

    #[test]
    fn empty_nodes_yield_no_context() {
        assert!(build_context(vec![]).is_none());
    }

    #[test]
    fn plain_nodes_build_text_context_from_all() {
        let nodes = vec![
            node("A", 0.9, Metadata::new()),
            node("B", 0.8, Metadata::new()),
        ];
        let ctx = build_context(nodes).unwrap();
        match ctx {
            Context::Text { text, nodes, related_prompts } => {
                assert_eq!(text, "[DOCUMENT #1]\nA\n\n[DOCUMENT #2]\nB");
                assert_eq!(nodes.len(), 2);
                assert!(related_prompts.is_empty());
            }
            _ => panic!("expected text context"),
        }
    }

    #[test]
    fn tie_on_top_score_keeps_first_node() {
        let nodes = vec![
            node("first", 0.9, Metadata::new()),
            node("second", 0.9, Metadata::new()),
        ];
        let ctx = build_context(nodes).unwrap();
        match ctx {
            Context::Text { text, .. } => assert!(text.starts_with("[DOCUMENT #1]\nfirst")),
            _ => panic!("expected text context"),
        }
    }

    #[test]
    fn question_node_without_llm_reply_is_direct_answer() {
        let mut meta = Metadata::new();
        meta.insert("answer".to_string(), json!("42"));
        meta.insert("llm_reply".to_string(), json!(false));
        meta.insert("file_name".to_string(), json!("f.txt"));
        meta.insert("group_name".to_string(), json!("g"));
        let nodes = vec![node("irrelevant text", 0.9, meta)];
        let ctx = build_context(nodes).unwrap();
        match ctx {
            Context::Question { file_name, group_name, .. } => {
                assert_eq!(file_name.as_deref(), Some("f.txt"));
                assert_eq!(group_name.as_deref(), Some("g"));
            }
            _ => panic!("expected question context"),
        }
    }

    #[test]
    fn question_node_with_llm_reply_becomes_single_node_text_context() {
        let mut meta = Metadata::new();
        meta.insert("answer".to_string(), json!("42"));
        meta.insert("llm_reply".to_string(), json!(true));
        let nodes = vec![
            node("should be ignored in text", 0.5, Metadata::new()),
            node("question node text", 0.95, meta),
        ];
        let ctx = build_context(nodes).unwrap();
        match ctx {
            Context::Text { text, nodes, .. } => {
                assert_eq!(text, "[DOCUMENT #1]\nquestion node text");
                assert_eq!(nodes.len(), 2, "full ranked set kept for asset resolution");
            }
            _ => panic!("expected text context"),
        }
    }
}
