//! Context window builder.
//!
//! Packs the newest messages of a conversation plus the system prompt into
//! a model's token budget. Selection is a greedy suffix: messages are taken
//! newest-first until the next one would push the serialized transcript
//! past `token_limit - reserved_for_completion`, so the most recent turns
//! are always kept and nothing older than a dropped message is sent.

use parley_core::message::Message;
use parley_core::model::ModelSpec;
use parley_core::tokenizer::Tokenizer;
use tracing::debug;

use super::token::{IM_END, IM_START};

/// Messages to send and the completion budget left for them.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextWindow {
    /// Selected messages in chronological order, system prompt excluded.
    pub messages: Vec<Message>,

    /// Tokens left for the completion: `token_limit - content_length`.
    pub max_tokens: usize,

    /// Token length of the serialized transcript that was accepted.
    pub content_length: usize,
}

/// Serialize messages into the text transcript used for token estimates.
///
/// Every message is wrapped in `<|im_start|>role..content<|im_end|>` and the
/// transcript ends with an open assistant turn. Chat models separate role,
/// content and messages with newlines; other models concatenate everything.
pub fn serialize_messages(model: &ModelSpec, messages: &[Message]) -> String {
    let sep = if model.is_chat() { "\n" } else { "" };
    let mut out = messages
        .iter()
        .map(|m| format!("{IM_START}{}{sep}{}{IM_END}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join(sep);
    out.push_str(sep);
    out.push_str(IM_START);
    out.push_str("assistant");
    out.push_str(sep);
    out
}

/// Select the longest suffix of `messages` that fits the model's budget.
///
/// `reserved_for_completion` must be smaller than `model.token_limit`;
/// otherwise nothing fits and the window is empty. An empty selection is a
/// valid result, never an error.
pub fn build_window(
    tokenizer: &dyn Tokenizer,
    model: &ModelSpec,
    system_prompt: &str,
    reserved_for_completion: usize,
    messages: &[Message],
) -> ContextWindow {
    let system = Message::system(system_prompt);
    let count = |candidate: &[Message]| {
        tokenizer.count(&model.id, &serialize_messages(model, candidate))
    };

    let mut content_length = count(std::slice::from_ref(&system));
    // accepted messages, newest first
    let mut accepted: Vec<Message> = Vec::new();

    for message in messages.iter().rev() {
        let mut candidate = Vec::with_capacity(accepted.len() + 2);
        candidate.push(system.clone());
        candidate.extend(accepted.iter().rev().cloned());
        candidate.push(message.clone());

        let length = count(&candidate);
        if length + reserved_for_completion > model.token_limit {
            debug!(
                model = %model.id,
                kept = accepted.len(),
                dropped = messages.len() - accepted.len(),
                "Context window full"
            );
            break;
        }
        content_length = length;
        accepted.push(message.clone());
    }

    accepted.reverse();
    ContextWindow {
        messages: accepted,
        max_tokens: model.token_limit.saturating_sub(content_length),
        content_length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::token::{BpeTokenizer, EstimatingTokenizer};

    fn model(token_limit: usize) -> ModelSpec {
        ModelSpec::new("gpt-3.5-turbo", "gpt-3.5-turbo", 4000, token_limit)
    }

    fn bpe() -> BpeTokenizer {
        BpeTokenizer::load().expect("cl100k_base loads")
    }

    fn history() -> Vec<Message> {
        vec![
            Message::user("World"),
            Message::assistant("How are you?"),
            Message::user("Fine, thank you."),
        ]
    }

    /// A long history of numbered turns.
    fn long_history(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                let text = format!("turn number {i} with some padding text");
                if i % 2 == 0 {
                    Message::user(text)
                } else {
                    Message::assistant(text)
                }
            })
            .collect()
    }

    #[test]
    fn serializes_chat_transcript() {
        let text = serialize_messages(
            &model(100),
            &[Message::system("Hello"), Message::user("World")],
        );
        assert_eq!(
            text,
            concat!(
                "<|im_start|>system\nHello<|im_end|>\n",
                "<|im_start|>user\nWorld<|im_end|>\n",
                "<|im_start|>assistant\n"
            )
        );
    }

    #[test]
    fn serializes_completion_transcript_without_separators() {
        let davinci = ModelSpec::new("text-davinci-003", "Davinci", 4000, 4000);
        let text = serialize_messages(&davinci, &[Message::user("Hi")]);
        assert_eq!(text, "<|im_start|>userHi<|im_end|><|im_start|>assistant");
    }

    #[test]
    fn small_history_leaves_1066_tokens() {
        let window = build_window(&bpe(), &model(1100), "Hello", 100, &history());

        assert_eq!(window.messages, history());
        assert_eq!(window.messages[0], Message::user("World"));
        assert_eq!(window.content_length, 34);
        assert_eq!(window.max_tokens, 1066);
    }

    #[test]
    fn empty_history_budgets_for_system_prompt() {
        let tok = bpe();
        let window = build_window(&tok, &model(1100), "Hello", 100, &[]);
        let system_len = tok.count(
            "gpt-3.5-turbo",
            &serialize_messages(&model(1100), &[Message::system("Hello")]),
        );
        assert!(window.messages.is_empty());
        assert_eq!(window.max_tokens, 1100 - system_len);
    }

    #[test]
    fn oversized_reservation_selects_nothing() {
        let window = build_window(&bpe(), &model(100), "Hello", 100, &history());
        assert!(window.messages.is_empty());
    }

    #[test]
    fn keeps_a_recency_suffix_within_budget() {
        let history = long_history(40);
        let bpe = bpe();
        let tokenizers: [&dyn Tokenizer; 2] = [&bpe, &EstimatingTokenizer];
        for tok in tokenizers {
            for limit in [80, 120, 250, 500, 2000] {
                for reserved in [0, 10, 50] {
                    let window =
                        build_window(tok, &model(limit), "Be brief.", reserved, &history);

                    // suffix: selected messages are exactly the tail of the history
                    let kept = window.messages.len();
                    assert_eq!(window.messages.as_slice(), &history[history.len() - kept..]);

                    // budget
                    assert!(
                        window.content_length + reserved <= limit,
                        "limit {limit} reserved {reserved}"
                    );
                    assert_eq!(window.max_tokens, limit - window.content_length);
                    assert!(window.max_tokens >= reserved);
                }
            }
        }
    }

    #[test]
    fn tight_budget_drops_oldest_turns() {
        let history = long_history(40);
        let window = build_window(&bpe(), &model(120), "Be brief.", 20, &history);
        assert!(!window.messages.is_empty());
        assert!(window.messages.len() < history.len());
        assert_eq!(window.messages.last(), history.last());
    }
}
