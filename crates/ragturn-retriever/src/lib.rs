//! Concurrent context retrieval: index fan-out, re-rank dispatch, context
//! classification, and ephemeral prompt construction.

pub mod classify;
pub mod prompts;
pub mod retriever;

pub use classify::{build_context, build_text_context};
pub use prompts::{build_context_prompt, build_no_context_guess_prompt, build_no_context_llm_prompt, clean_text};
pub use retriever::{ContextRetriever, RetrieveResponse};
