//! Single-pass `${path}` placeholder substitution with caching
//!
//! Template text is tokenized once and cached; substitution walks the cached
//! tokens against the current render item.
//!
//! Syntax: `${dot.separated.path}`. An empty `${}` or an unclosed `${` is
//! literal text. Missing paths and falsy values (`null`, `false`, `0`, `""`)
//! render as an empty string.

use std::borrow::Cow;
use std::ops::Range;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde_json::{Number, Value};

use crate::path;

/// Token representing a parsed text fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal text (stores range in original string)
    Literal(Range<usize>),
    /// `${path}`
    Placeholder(String),
}

/// Placeholder tokenizer with a token cache
pub struct PlaceholderResolver {
    cache: DashMap<String, Arc<Vec<Token>>>,
}

impl Default for PlaceholderResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaceholderResolver {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Parse text into tokens (with caching)
    pub fn tokenize(&self, text: &str) -> Arc<Vec<Token>> {
        if let Some(cached) = self.cache.get(text) {
            return Arc::clone(&cached);
        }

        let mut tokens = Vec::new();
        let mut literal_start = 0;
        let mut cursor = 0;

        while let Some(offset) = text[cursor..].find("${") {
            let open = cursor + offset;
            let body_start = open + 2;
            let Some(close) = text[body_start..].find('}').map(|i| body_start + i) else {
                break; // unclosed: rest is literal
            };
            if close == body_start {
                // `${}` stays literal
                cursor = close + 1;
                continue;
            }
            if open > literal_start {
                tokens.push(Token::Literal(literal_start..open));
            }
            tokens.push(Token::Placeholder(text[body_start..close].to_string()));
            literal_start = close + 1;
            cursor = literal_start;
        }

        if literal_start < text.len() {
            tokens.push(Token::Literal(literal_start..text.len()));
        }

        let tokens = Arc::new(tokens);
        self.cache.insert(text.to_string(), Arc::clone(&tokens));
        tokens
    }

    /// Substitute every placeholder in `text` against `item`
    ///
    /// Text without placeholders is returned borrowed and unchanged.
    pub fn substitute<'t>(&self, text: &'t str, item: &Value) -> Cow<'t, str> {
        if !text.contains("${") {
            return Cow::Borrowed(text);
        }
        let tokens = self.tokenize(text);
        if !tokens.iter().any(|t| matches!(t, Token::Placeholder(_))) {
            return Cow::Borrowed(text);
        }

        let mut result = String::with_capacity(text.len() * 2);
        for token in tokens.iter() {
            match token {
                Token::Literal(range) => result.push_str(&text[range.clone()]),
                Token::Placeholder(expr) => {
                    if let Some(value) = path::lookup(item, expr) {
                        result.push_str(&display_value(value));
                    }
                }
            }
        }
        Cow::Owned(result)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

/// Text shown for a JSON value
///
/// Falsy values render empty. Arrays join their entries with `,` (where
/// `false` and `0` keep their text) and objects render as `[object Object]`.
pub fn display_value(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null | Value::Bool(false) => Cow::Borrowed(""),
        Value::Number(n) if n.as_f64() == Some(0.0) => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(script_string(other)),
    }
}

fn script_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_text(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(script_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Integral floats drop their fraction: `2.0` → `2`
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() => f.to_string(),
        _ => n.to_string(),
    }
}

/// Global resolver instance
pub static PLACEHOLDERS: Lazy<PlaceholderResolver> = Lazy::new(PlaceholderResolver::new);

/// Convenience function for substituting with the global resolver
pub fn substitute<'t>(text: &'t str, item: &Value) -> Cow<'t, str> {
    PLACEHOLDERS.substitute(text, item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tokenize_literal_only() {
        let resolver = PlaceholderResolver::new();
        let tokens = resolver.tokenize("simple text");
        assert_eq!(*tokens, vec![Token::Literal(0..11)]);
    }

    #[test]
    fn tokenize_mixed() {
        let resolver = PlaceholderResolver::new();
        let tokens = resolver.tokenize("Hi ${user.name}, you have ${count} items");
        assert_eq!(
            *tokens,
            vec![
                Token::Literal(0..3),
                Token::Placeholder("user.name".into()),
                Token::Literal(15..26),
                Token::Placeholder("count".into()),
                Token::Literal(34..40),
            ]
        );
    }

    #[test]
    fn empty_and_unclosed_are_literal() {
        let item = json!({"a": "A"});
        assert_eq!(substitute("${} and ${a}", &item), "${} and A");
        assert_eq!(substitute("${a} then ${b", &item), "A then ${b");
    }

    #[test]
    fn missing_path_renders_empty() {
        let item = json!({"name": "Ann"});
        assert_eq!(substitute("[${a.b}]", &item), "[]");
        assert_eq!(substitute("[${name.first}]", &item), "[]");
    }

    #[test]
    fn falsy_values_render_empty() {
        let item = json!({"z": 0, "f": false, "e": "", "n": null, "l": [1, 2]});
        assert_eq!(substitute("[${z}][${f}][${e}][${n}][${l}]", &item), "[][][][][1,2]");
        assert_eq!(substitute("${neg}", &json!({"neg": -0.0})), "");
    }

    #[test]
    fn scalar_rendering() {
        let item = json!({"one": 1, "yes": true, "half": 1.5, "whole": 2.0, "neg": -3});
        assert_eq!(substitute("${one}|${yes}|${half}|${whole}|${neg}", &item), "1|true|1.5|2|-3");
    }

    #[test]
    fn arrays_and_objects_render_like_script_strings() {
        let item = json!({
            "nested": [[1, [2]], null, false, 0, "s"],
            "empty": [],
            "obj": {"k": "v"},
            "objs": [{"a": 1}, {"b": 2}]
        });
        assert_eq!(substitute("${nested}", &item), "1,2,,false,0,s");
        assert_eq!(substitute("[${empty}]", &item), "[]");
        assert_eq!(substitute("${obj}", &item), "[object Object]");
        assert_eq!(substitute("${objs}", &item), "[object Object],[object Object]");
    }

    #[test]
    fn text_without_placeholders_is_borrowed() {
        let item = json!({});
        assert!(matches!(substitute("plain $ {x}", &item), Cow::Borrowed(_)));
        assert!(matches!(substitute("only ${}", &item), Cow::Borrowed(_)));
    }

    #[test]
    fn cache_reuse() {
        let resolver = PlaceholderResolver::new();
        let text = "${a} ${b}";
        let first = resolver.tokenize(text);
        let second = resolver.tokenize(text);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.cached_len(), 1);
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let item = json!({"a": "${b}", "b": "nope"});
        assert_eq!(substitute("${a}", &item), "${b}");
    }
}
