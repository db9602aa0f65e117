//! Token counting.
//!
//! [`BpeTokenizer`] encodes with the cl100k_base vocabulary used by the
//! GPT-3.5 and GPT-4 families. The chat markers `<|im_start|>`,
//! `<|im_end|>` and `<|im_sep|>` are single tokens, as they are when the
//! model reads the transcript. [`EstimatingTokenizer`] is the fallback when
//! the vocabulary cannot be loaded.

use parley_core::tokenizer::Tokenizer;
use std::sync::{Arc, OnceLock};
use tiktoken_rs::CoreBPE;
use tracing::warn;

pub const IM_START: &str = "<|im_start|>";
pub const IM_END: &str = "<|im_end|>";
pub const IM_SEP: &str = "<|im_sep|>";

/// Chat markers and their cl100k ids.
const CHAT_MARKERS: [(&str, u32); 3] = [(IM_START, 100264), (IM_END, 100265), (IM_SEP, 100266)];

static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();

/// The tokenizer exchanges use: cl100k_base, or the estimate if it fails to load.
pub fn default_tokenizer() -> Arc<dyn Tokenizer> {
    match BpeTokenizer::load() {
        Some(bpe) => Arc::new(bpe),
        None => Arc::new(EstimatingTokenizer),
    }
}

#[derive(Clone, Copy)]
pub struct BpeTokenizer {
    bpe: &'static CoreBPE,
}

impl BpeTokenizer {
    /// The vocabulary is parsed once per process.
    pub fn load() -> Option<Self> {
        CL100K
            .get_or_init(|| match tiktoken_rs::cl100k_base() {
                Ok(bpe) => Some(bpe),
                Err(e) => {
                    warn!(error = %e, "Failed to load cl100k_base, estimating tokens instead");
                    None
                }
            })
            .as_ref()
            .map(|bpe| Self { bpe })
    }

    fn ordinary(&self, text: &str, out: &mut Vec<u32>) {
        out.extend(self.bpe.encode_ordinary(text).into_iter().map(|t| t as u32));
    }

    /// Decode ids without markers. A slice may cut a multi-byte character
    /// at either end; those partial tokens are dropped.
    fn decode_run(&self, run: &[u32]) -> String {
        for start in 0..run.len().min(4) {
            for end in (start.max(run.len().saturating_sub(3))..=run.len()).rev() {
                let ids = run[start..end].iter().map(|&t| t as _).collect();
                if let Ok(text) = self.bpe.decode(ids) {
                    return text;
                }
            }
        }
        String::new()
    }
}

fn next_marker(text: &str) -> Option<(usize, &'static str, u32)> {
    CHAT_MARKERS
        .iter()
        .filter_map(|&(marker, id)| text.find(marker).map(|at| (at, marker, id)))
        .min_by_key(|(at, ..)| *at)
}

impl Tokenizer for BpeTokenizer {
    fn encode(&self, _model_id: &str, text: &str) -> Vec<u32> {
        let mut tokens = Vec::new();
        let mut rest = text;
        while let Some((at, marker, id)) = next_marker(rest) {
            self.ordinary(&rest[..at], &mut tokens);
            tokens.push(id);
            rest = &rest[at + marker.len()..];
        }
        self.ordinary(rest, &mut tokens);
        tokens
    }

    fn decode(&self, tokens: &[u32]) -> String {
        let mut out = String::new();
        let mut run_start = 0;
        for (i, id) in tokens.iter().enumerate() {
            if let Some((marker, _)) = CHAT_MARKERS.iter().find(|(_, m)| m == id) {
                out.push_str(&self.decode_run(&tokens[run_start..i]));
                out.push_str(marker);
                run_start = i + 1;
            }
        }
        out.push_str(&self.decode_run(&tokens[run_start..]));
        out
    }
}

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Counts with [`estimate_tokens`]; ids are code points, so slicing works
/// per character.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatingTokenizer;

impl Tokenizer for EstimatingTokenizer {
    fn encode(&self, _model_id: &str, text: &str) -> Vec<u32> {
        text.chars().map(u32::from).collect()
    }

    fn decode(&self, tokens: &[u32]) -> String {
        tokens
            .iter()
            .map(|&t| char::from_u32(t).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    fn count(&self, _model_id: &str, text: &str) -> usize {
        estimate_tokens(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bpe() -> BpeTokenizer {
        BpeTokenizer::load().expect("cl100k_base loads")
    }

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(bpe().count("gpt-4", ""), 0);
    }

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens("test"), 1);
        assert_eq!(estimate_tokens("hello"), 2);
        assert_eq!(EstimatingTokenizer.count("gpt-4", &"a".repeat(100)), 25);
    }

    #[test]
    fn cl100k_counts() {
        let tok = bpe();
        assert_eq!(tok.count("gpt-3.5-turbo", "Hello"), 1);
        assert_eq!(tok.count("gpt-3.5-turbo", "How are you?"), 4);
        assert_eq!(tok.count("gpt-3.5-turbo", "Fine, thank you."), 5);
    }

    #[test]
    fn chat_markers_are_single_tokens() {
        let tok = bpe();
        let ids = tok.encode("gpt-4", "<|im_start|>user\nHi<|im_end|>");
        assert_eq!(ids.len(), 5);
        assert_eq!(ids[0], 100264);
        assert_eq!(ids[4], 100265);
    }

    #[test]
    fn round_trips_mixed_text() {
        let tok = bpe();
        for text in [
            "<|im_start|>system\nHello<|im_end|>\n<|im_start|>assistant\n",
            "  indented\n\n\tcode();  ",
            "naïve café, 東京 🚀!",
        ] {
            assert_eq!(tok.decode(&tok.encode("gpt-4", text)), text);
            let estimating = EstimatingTokenizer;
            assert_eq!(estimating.decode(&estimating.encode("gpt-4", text)), text);
        }
    }

    #[test]
    fn any_slice_decodes() {
        let tok = bpe();
        let ids = tok.encode("gpt-4", "ab 東京 🚀 cd");
        for start in 0..ids.len() {
            for end in start..=ids.len() {
                let text = tok.decode(&ids[start..end]);
                assert!(!text.contains(char::REPLACEMENT_CHARACTER));
            }
        }
    }

    #[test]
    fn default_tokenizer_uses_the_vocabulary() {
        assert_eq!(default_tokenizer().count("gpt-4", "Fine, thank you."), 5);
    }
}
