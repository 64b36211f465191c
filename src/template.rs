//! Single-pass template substitution with caching
//!
//! Two marker forms are recognised:
//! - `~name~`
//! - `{{name}}` (whitespace allowed inside the braces)
//!
//! Anything else, including an unterminated marker, is literal text.
//! Templates are tokenized once and the token list is shared process-wide.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::ops::Range;
use std::sync::Arc;

/// Token representing a parsed template fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal text (stores range in original string)
    Literal(Range<usize>),
    /// Field reference: `~name~` or `{{ name }}`
    Field(String),
}

/// Tokenizer with a cache of parsed templates
pub struct TemplateCache {
    cache: DashMap<String, Arc<Vec<Token>>>,
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateCache {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Parse template into tokens (with caching)
    pub fn tokenize(&self, template: &str) -> Arc<Vec<Token>> {
        if let Some(cached) = self.cache.get(template) {
            return Arc::clone(&cached);
        }

        let tokens = Arc::new(scan(template));
        self.cache.insert(template.to_string(), Arc::clone(&tokens));
        tokens
    }

    /// Substitute every field reference using `resolve`.
    ///
    /// Names that `resolve` cannot produce become the empty string.
    pub fn expand<F>(&self, template: &str, mut resolve: F) -> String
    where
        F: FnMut(&str) -> Option<String>,
    {
        let tokens = self.tokenize(template);
        let mut result = String::with_capacity(template.len() * 2);

        for token in tokens.iter() {
            match token {
                Token::Literal(range) => result.push_str(&template[range.clone()]),
                Token::Field(name) => {
                    if let Some(text) = resolve(name) {
                        result.push_str(&text);
                    }
                }
            }
        }

        result
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

fn scan(template: &str) -> Vec<Token> {
    let bytes = template.as_bytes();
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    // Markers are ASCII, so every position we slice at is a char boundary.
    while i < bytes.len() {
        let marker = match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => braced(template, i + 2),
            b'~' => tilde(template, i + 1),
            _ => None,
        };

        match marker {
            Some((name, end)) => {
                if i > literal_start {
                    tokens.push(Token::Literal(literal_start..i));
                }
                tokens.push(Token::Field(name));
                i = end;
                literal_start = end;
            }
            None => i += 1,
        }
    }

    if literal_start < template.len() {
        tokens.push(Token::Literal(literal_start..template.len()));
    }

    tokens
}

/// Parse `{{ name }}` starting after the opening braces
fn braced(template: &str, body_start: usize) -> Option<(String, usize)> {
    let close = body_start + template[body_start..].find("}}")?;
    let name = template[body_start..close].trim();
    is_field_name(name).then(|| (name.to_string(), close + 2))
}

/// Parse `~name~` starting after the opening tilde
fn tilde(template: &str, body_start: usize) -> Option<(String, usize)> {
    let close = body_start + template[body_start..].find('~')?;
    let name = &template[body_start..close];
    is_field_name(name).then(|| (name.to_string(), close + 1))
}

fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Global template cache instance
pub static TEMPLATE_CACHE: Lazy<TemplateCache> = Lazy::new(TemplateCache::new);

/// Convenience function for expanding templates through the global cache
pub fn expand<F>(template: &str, resolve: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    TEMPLATE_CACHE.expand(template, resolve)
}

/// Field names referenced by a template, in order of appearance
pub fn references(template: &str) -> Vec<String> {
    TEMPLATE_CACHE
        .tokenize(template)
        .iter()
        .filter_map(|token| match token {
            Token::Field(name) => Some(name.clone()),
            Token::Literal(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "amount" => Some("5".to_string()),
            "currency" => Some("EUR".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_tokenize_simple_literal() {
        let cache = TemplateCache::new();
        let tokens = cache.tokenize("simple text");
        assert_eq!(*tokens, vec![Token::Literal(0..11)]);
    }

    #[test]
    fn test_tokenize_both_markers() {
        let cache = TemplateCache::new();
        let tokens = cache.tokenize("$~amount~ {{ currency }}");
        assert_eq!(
            *tokens,
            vec![
                Token::Literal(0..1),
                Token::Field("amount".to_string()),
                Token::Literal(9..10),
                Token::Field("currency".to_string()),
            ]
        );
    }

    #[test]
    fn test_expand_markers() {
        let cache = TemplateCache::new();
        assert_eq!(cache.expand("$~amount~", lookup), "$5");
        assert_eq!(cache.expand("~amount~ {{currency}}", lookup), "5 EUR");
        assert_eq!(cache.expand("{{  amount  }}!", lookup), "5!");
    }

    #[test]
    fn test_unresolved_is_empty() {
        let cache = TemplateCache::new();
        assert_eq!(cache.expand("[~missing~]", lookup), "[]");
    }

    #[test]
    fn test_unterminated_markers_are_literal() {
        let cache = TemplateCache::new();
        assert_eq!(cache.expand("~amount", lookup), "~amount");
        assert_eq!(cache.expand("{{amount", lookup), "{{amount");
        assert_eq!(cache.expand("a ~ b ~amount~", lookup), "a ~ b 5");
        assert_eq!(cache.expand("{{ two words }}", lookup), "{{ two words }}");
    }

    #[test]
    fn test_multibyte_literals() {
        let cache = TemplateCache::new();
        assert_eq!(cache.expand("€ ~amount~ ±", lookup), "€ 5 ±");
    }

    #[test]
    fn test_cache_reuse() {
        let cache = TemplateCache::new();
        let template = "~amount~ {{currency}}";

        let tokens1 = cache.tokenize(template);
        let tokens2 = cache.tokenize(template);

        assert!(Arc::ptr_eq(&tokens1, &tokens2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_references() {
        assert_eq!(
            references("~a~ and {{ b }} and ~a~"),
            vec!["a".to_string(), "b".to_string(), "a".to_string()]
        );
        assert!(references("plain").is_empty());
    }
}
