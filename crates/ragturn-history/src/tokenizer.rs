use tiktoken_rs::CoreBPE;

/// A pure function from text to token count. Abstracted so the buffer
/// doesn't hard-depend on any one BPE vocabulary's API shape.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// `cl100k_base` — the encoding used by the completion model this history
/// buffer budgets for.
pub struct Cl100kTokenizer {
    bpe: CoreBPE,
}

impl Cl100kTokenizer {
    pub fn new() -> Self {
        Self {
            bpe: tiktoken_rs::cl100k_base().expect("cl100k_base vocabulary is bundled"),
        }
    }
}

impl Default for Cl100kTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for Cl100kTokenizer {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}
