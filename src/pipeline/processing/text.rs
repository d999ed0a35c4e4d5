//! Text canonicalization applied before any name comparison.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static LEADING_ARTICLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:the|a|an)\s+").expect("valid article regex"));

static LEGAL_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+(?:inc|llc|ltd|corp|corporation)\.?$").expect("valid suffix regex")
});

static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("valid punctuation regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Canonical form of free text: lower-cased, one leading article and one
/// trailing legal suffix removed, punctuation turned into spaces, whitespace
/// collapsed. Never fails; empty input gives an empty string.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let trimmed = lowered.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let without_article = LEADING_ARTICLE.replace(trimmed, "");
    let without_suffix = LEGAL_SUFFIX.replace(&without_article, "");
    let spaced = PUNCTUATION.replace_all(&without_suffix, " ");
    WHITESPACE.replace_all(&spaced, " ").trim().to_string()
}

/// Canonical form of a JSON cell. Strings are normalized as text, other
/// scalars through their JSON rendering; null and containers give "".
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::String(s) => normalize(s),
        Value::Number(n) => normalize(&n.to_string()),
        Value::Bool(b) => normalize(&b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_article_suffix_and_spacing() {
        assert_eq!(normalize(" The Rolling   Stones Inc."), "rolling stones");
    }

    #[test]
    fn strips_only_one_article() {
        assert_eq!(normalize("The The"), "the");
        assert_eq!(normalize("An Horse"), "horse");
        assert_eq!(normalize("Abba"), "abba");
    }

    #[test]
    fn suffix_variants() {
        assert_eq!(normalize("Live Nation Corporation"), "live nation");
        assert_eq!(normalize("Acme, LLC"), "acme");
        assert_eq!(normalize("Sub Pop Ltd"), "sub pop");
        // no separating whitespace, not a suffix
        assert_eq!(normalize("Zinc"), "zinc");
    }

    #[test]
    fn punctuation_becomes_space() {
        assert_eq!(normalize("Guns N' Roses"), "guns n roses");
        assert_eq!(normalize("AC/DC"), "ac dc");
        assert_eq!(normalize("Beyoncé!"), "beyoncé");
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize_value(&Value::Null), "");
        assert_eq!(normalize_value(&json!(["a"])), "");
    }

    #[test]
    fn scalar_values() {
        assert_eq!(normalize_value(&json!("The Crocodile")), "crocodile");
        assert_eq!(normalize_value(&json!(98101)), "98101");
    }
}
