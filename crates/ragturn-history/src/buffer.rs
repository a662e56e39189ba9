use std::sync::Arc;

use ragturn_core::types::{ChatMessage, Role, EXTRA_TOKEN_MARGIN};
use tracing::trace;

use crate::tokenizer::Tokenizer;

/// Token-budgeted sliding window over a chat transcript.
///
/// Every call to [`ChatBuffer::buffer`] both (a) returns the history to send
/// to the LLM for this turn, with an optional ephemeral system message
/// spliced in, and (b) rewrites the buffer's own persisted history to the
/// windowed tail — so the persisted transcript never grows unbounded across
/// turns. The ephemeral message is never part of the persisted copy.
pub struct ChatBuffer {
    tokenizer: Arc<dyn Tokenizer>,
    max_tokens: usize,
    history: Vec<ChatMessage>,
}

impl ChatBuffer {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, max_tokens: usize, history: Vec<ChatMessage>) -> Self {
        let mut buffer = Self {
            tokenizer,
            max_tokens,
            history,
        };
        for message in buffer.history.iter_mut() {
            if message.token_count().is_none() {
                let tokenizer = &buffer.tokenizer;
                let count = tokenizer.count(&message.content);
                message.set_token_count(count);
            }
        }
        buffer
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Append a message, computing and caching its token count, then
    /// re-window the buffer so the persisted history never grows past
    /// budget even on turns that never call [`ChatBuffer::buffer`] directly
    /// (e.g. a branch that never calls the LLM).
    pub fn add_message(&mut self, mut message: ChatMessage) {
        self.ensure_token_count(&mut message);
        self.history.push(message);
        self.buffer(None);
    }

    fn ensure_token_count(&self, message: &mut ChatMessage) {
        if message.token_count().is_none() {
            let count = self.tokenizer.count(&message.content);
            message.set_token_count(count);
        }
    }

    fn sum_tokens(messages: &[ChatMessage]) -> usize {
        messages.iter().map(|m| m.token_count().unwrap_or(0)).sum()
    }

    /// Shrink `message.content` until it fits within `max_tokens`, dropping
    /// whole characters from the end. Each pass over-estimates 1 token as
    /// ~4 characters (times 3 margin) to converge quickly without
    /// retokenizing character-by-character.
    fn truncate_message(&self, message: &mut ChatMessage, max_tokens: usize) {
        loop {
            let tokens = self.tokenizer.count(&message.content);
            if tokens <= max_tokens {
                message.set_token_count(tokens);
                return;
            }
            let excess = tokens - max_tokens;
            let remove_chars = excess * 3;
            let char_count = message.content.chars().count();
            let keep = char_count.saturating_sub(remove_chars);
            if keep == char_count {
                // Can't make progress (remove_chars rounded to 0) — bail out.
                message.set_token_count(tokens);
                return;
            }
            message.content = message.content.chars().take(keep).collect();
            if keep == 0 {
                message.set_token_count(0);
                return;
            }
        }
    }

    /// Window the transcript to `max_tokens`, returning the list to send to
    /// the LLM for this turn (including `system_ephemeral` if given). The
    /// buffer's own persisted history is updated to the windowed tail,
    /// excluding the ephemeral message.
    pub fn buffer(&mut self, system_ephemeral: Option<ChatMessage>) -> Vec<ChatMessage> {
        let mut working = self.history.clone();

        let mut system = if working
            .first()
            .map(|m| m.role == Role::System)
            .unwrap_or(false)
        {
            Some(working.remove(0))
        } else {
            None
        };
        if let Some(system) = system.as_mut() {
            self.ensure_token_count(system);
        }

        let mut ephemeral = system_ephemeral;
        if let Some(ephemeral) = ephemeral.as_mut() {
            self.ensure_token_count(ephemeral);
        }

        for message in working.iter_mut() {
            self.ensure_token_count(message);
        }

        let system_tokens = system.as_ref().and_then(|m| m.token_count()).unwrap_or(0);
        let ephemeral_tokens = ephemeral.as_ref().and_then(|m| m.token_count()).unwrap_or(0);

        let available = (self.max_tokens as isize
            - system_tokens as isize
            - ephemeral_tokens as isize
            - EXTRA_TOKEN_MARGIN as isize)
            .max(0) as usize;

        let mut window = working.len();
        while window > 1 && Self::sum_tokens(&working[working.len() - window..]) > available {
            window -= 1;
        }

        let mut tail: Vec<ChatMessage> = if window == 0 {
            Vec::new()
        } else {
            working[working.len() - window..].to_vec()
        };

        if tail.len() == 1 {
            self.truncate_message(&mut tail[0], available);
        }

        trace!(
            available,
            window,
            system_tokens,
            ephemeral_tokens,
            "windowed chat history"
        );

        let mut persisted = Vec::new();
        if let Some(system) = system {
            persisted.push(system);
        }
        persisted.extend(tail);
        self.history = persisted.clone();

        let mut result = persisted;
        if let Some(ephemeral) = ephemeral {
            let insert_at = if result.len() > 1 { result.len() - 1 } else { 1 };
            let insert_at = insert_at.min(result.len());
            result.insert(insert_at, ephemeral);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    /// One token per character — makes budget math exact and legible.
    struct CharTokenizer;
    impl Tokenizer for CharTokenizer {
        fn count(&self, text: &str) -> usize {
            text.chars().count()
        }
    }

    fn msg(role: Role, content: &str) -> ChatMessage {
        ChatMessage::new(role, content)
    }

    #[test]
    fn fits_everything_when_under_budget() {
        let mut buf = ChatBuffer::new(
            Arc::new(CharTokenizer),
            1000,
            vec![msg(Role::System, "sys"), msg(Role::User, "hi")],
        );
        let out = buf.buffer(None);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].role, Role::System);
    }

    #[test]
    fn trims_oldest_messages_first_keeping_suffix_order() {
        let history = vec![
            msg(Role::System, "s"),
            msg(Role::User, "aaaaaaaaaa"),
            msg(Role::Assistant, "bbbbbbbbbb"),
            msg(Role::User, "cccccccccc"),
        ];
        // budget: system(1) + EXTRA_TOKEN_MARGIN(5) + one message(10) = 16
        let mut buf = ChatBuffer::new(Arc::new(CharTokenizer), 16, history);
        let out = buf.buffer(None);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].role, Role::System);
        assert_eq!(out[1].content, "cccccccccc");
    }

    #[test]
    fn truncates_single_oversized_message() {
        let history = vec![msg(Role::User, &"x".repeat(50))];
        let mut buf = ChatBuffer::new(Arc::new(CharTokenizer), 20, history);
        let out = buf.buffer(None);
        assert_eq!(out.len(), 1);
        assert!(out[0].content.len() < 50);
        assert!(out[0].token_count().unwrap() <= 15);
    }

    #[test]
    fn ephemeral_is_not_persisted() {
        let mut buf = ChatBuffer::new(
            Arc::new(CharTokenizer),
            1000,
            vec![msg(Role::User, "hi"), msg(Role::User, "there")],
        );
        let ephemeral = ChatMessage::new(Role::System, "ephemeral-instructions");
        let out = buf.buffer(Some(ephemeral));
        assert!(out.iter().any(|m| m.content == "ephemeral-instructions"));
        assert!(!buf
            .history()
            .iter()
            .any(|m| m.content == "ephemeral-instructions"));
    }

    #[test]
    fn ephemeral_is_inserted_before_last_message() {
        let mut buf = ChatBuffer::new(
            Arc::new(CharTokenizer),
            1000,
            vec![msg(Role::User, "a"), msg(Role::User, "b"), msg(Role::User, "c")],
        );
        let ephemeral = ChatMessage::new(Role::System, "eph");
        let out = buf.buffer(Some(ephemeral));
        assert_eq!(out[out.len() - 1].content, "c");
        assert_eq!(out[out.len() - 2].content, "eph");
    }

    #[test]
    fn persisted_history_never_exceeds_budget_sum() {
        let history: Vec<ChatMessage> = (0..20)
            .map(|i| msg(Role::User, &format!("message number {i}")))
            .collect();
        let mut buf = ChatBuffer::new(Arc::new(CharTokenizer), 40, history);
        let out = buf.buffer(None);
        let total: usize = out.iter().map(|m| m.token_count().unwrap_or(0)).sum();
        assert!(total <= 40);
    }
}
