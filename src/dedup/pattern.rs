//! Key patterns for cache invalidation

use regex::Regex;

/// Selects which keys an invalidation applies to
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// A single key
    Exact(String),
    /// Every key starting with the prefix
    Prefix(String),
    /// Every key the expression matches
    Regex(Regex),
}

impl KeyPattern {
    /// Build a regex pattern
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(KeyPattern::Regex)
    }

    /// Build a prefix pattern
    pub fn prefix(prefix: impl Into<String>) -> Self {
        KeyPattern::Prefix(prefix.into())
    }

    /// Check whether `key` is selected
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Exact(exact) => exact == key,
            KeyPattern::Prefix(prefix) => key.starts_with(prefix.as_str()),
            KeyPattern::Regex(re) => re.is_match(key),
        }
    }
}

impl From<&str> for KeyPattern {
    fn from(key: &str) -> Self {
        KeyPattern::Exact(key.to_string())
    }
}

impl From<String> for KeyPattern {
    fn from(key: String) -> Self {
        KeyPattern::Exact(key)
    }
}

impl From<Regex> for KeyPattern {
    fn from(re: Regex) -> Self {
        KeyPattern::Regex(re)
    }
}

impl std::fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPattern::Exact(key) => write!(f, "{}", key),
            KeyPattern::Prefix(prefix) => write!(f, "{}*", prefix),
            KeyPattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}
