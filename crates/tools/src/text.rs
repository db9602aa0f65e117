//! Text helpers used when feeding fetched pages and search results to a
//! model: URL detection, whitespace cleanup, and token-size chunking.

use parley_core::tokenizer::Tokenizer;
use regex_lite::Regex;
use std::sync::OnceLock;

fn url_regex() -> Option<&'static Regex> {
    static URL: OnceLock<Option<Regex>> = OnceLock::new();
    URL.get_or_init(|| {
        Regex::new(r"(?:https?://)?(?:www\.)?[a-zA-Z0-9-]+(?:\.[a-zA-Z]+)+(?::\d+)?(?:/\S*)?").ok()
    })
    .as_ref()
}

/// The first URL-looking substring of `text`.
pub fn extract_url(text: &str) -> Option<&str> {
    url_regex()?.find(text).map(|m| m.as_str())
}

struct CleanupRules {
    many_newlines: Regex,
    paragraph_break: Regex,
    wide_spaces: Regex,
    newline_runs: Regex,
}

impl CleanupRules {
    fn compile() -> Option<Self> {
        Some(Self {
            many_newlines: Regex::new(r"\n{4,}").ok()?,
            paragraph_break: Regex::new(r"\n\n").ok()?,
            wide_spaces: Regex::new(r" {3,}").ok()?,
            newline_runs: Regex::new(r"\n+(?:\s*\n)*").ok()?,
        })
    }
}

fn cleanup_rules() -> Option<&'static CleanupRules> {
    static RULES: OnceLock<Option<CleanupRules>> = OnceLock::new();
    RULES.get_or_init(CleanupRules::compile).as_ref()
}

/// Normalise whitespace in text extracted from a web page.
///
/// Long newline runs collapse, paragraph breaks become spaces, space runs
/// shrink to two, tabs disappear, and remaining blank lines fold into one
/// newline.
pub fn clean_source_text(text: &str) -> String {
    let Some(rules) = cleanup_rules() else {
        return text.trim().to_string();
    };
    let cleaned = rules.many_newlines.replace_all(text.trim(), "\n\n\n");
    let cleaned = rules.paragraph_break.replace_all(&cleaned, " ");
    let cleaned = rules.wide_spaces.replace_all(&cleaned, "  ");
    let cleaned = cleaned.replace('\t', "");
    rules.newline_runs.replace_all(&cleaned, "\n").into_owned()
}

/// Decode the tokens of `text` in `[start, end)`. Out-of-range bounds clamp.
pub fn slice_by_token_size(
    tokenizer: &dyn Tokenizer,
    model_id: &str,
    text: &str,
    start: usize,
    end: usize,
) -> String {
    let tokens = tokenizer.encode(model_id, text);
    let end = end.min(tokens.len());
    let start = start.min(end);
    tokenizer.decode(&tokens[start..end])
}

/// Split `text` into pieces of at most `chunk_token_size` tokens.
///
/// A zero chunk size yields no chunks.
pub fn chunk_text_by_token_size(
    tokenizer: &dyn Tokenizer,
    model_id: &str,
    text: &str,
    chunk_token_size: usize,
) -> Vec<String> {
    if chunk_token_size == 0 {
        return Vec::new();
    }
    tokenizer
        .encode(model_id, text)
        .chunks(chunk_token_size)
        .map(|chunk| tokenizer.decode(chunk))
        .collect()
}
