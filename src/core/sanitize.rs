//! Identifier sanitization
//!
//! Every identifier that ends up as an image tag, service name or container
//! name passes through these functions, so the same project always yields
//! the same derived names across runs.

use regex::Regex;
use std::sync::OnceLock;

/// Docker rejects tags longer than this
const MAX_TAG_LEN: usize = 128;

/// Keep only ASCII alphanumerics, `-` and `_`
pub fn sanitize_identifier(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// [`sanitize_identifier`] followed by lower-casing
pub fn sanitize_name(input: &str) -> String {
    sanitize_identifier(input).to_ascii_lowercase()
}

fn color_code_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)§[0-9a-fk-or]").ok())
        .as_ref()
}

/// Remove in-game color/formatting escapes (`§a`, `§l`, ...)
pub fn strip_color_codes(input: &str) -> String {
    match color_code_pattern() {
        Some(pattern) => pattern.replace_all(input, "").into_owned(),
        None => input.to_string(),
    }
}

/// Container name announced to the runtime, e.g. `SkyWars-1`
pub fn container_name(game_name: &str) -> String {
    format!("{}-1", sanitize_identifier(&strip_color_codes(game_name)))
}

/// Turn a free-form name into a tag component, or `None` if nothing survives
pub fn tag_component(input: &str) -> Option<String> {
    let cleaned = sanitize_name(&strip_color_codes(input).replace(' ', "-"));
    let trimmed = cleaned.trim_start_matches(['-', '.']);
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_TAG_LEN).collect())
}
