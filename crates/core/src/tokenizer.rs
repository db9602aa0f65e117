//! Tokenizer contract.
//!
//! Token ids are model specific; the only promises are that counting is a
//! pure function of `(model_id, text)` and that decoding the ids produced by
//! `encode` gives back the original text.

/// Encodes text into model tokens and back.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, model_id: &str, text: &str) -> Vec<u32>;

    fn decode(&self, tokens: &[u32]) -> String;

    /// Number of tokens `text` costs for `model_id`.
    fn count(&self, model_id: &str, text: &str) -> usize {
        self.encode(model_id, text).len()
    }
}
