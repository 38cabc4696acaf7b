//! Plugin traits and types

use crate::query::Query;
use crate::results::ResultItem;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Keyword that marks a plugin as global in settings
pub const GLOBAL_KEYWORD: &str = "*";

/// How queries are routed to a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordBinding {
    /// Receives every query that does not start with an action keyword
    Global,
    /// Receives only queries starting with this keyword and a separator
    Keyword(String),
}

impl KeywordBinding {
    /// Parse a settings value; `*` or an empty keyword means global
    pub fn parse(keyword: &str) -> Self {
        let keyword = keyword.trim();
        if keyword.is_empty() || keyword == GLOBAL_KEYWORD {
            Self::Global
        } else {
            Self::Keyword(keyword.to_string())
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    pub fn keyword(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Keyword(k) => Some(k),
        }
    }
}

impl fmt::Display for KeywordBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str(GLOBAL_KEYWORD),
            Self::Keyword(k) => f.write_str(k),
        }
    }
}

/// Static description of a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Plugin ID
    pub id: String,
    /// Display name
    pub name: String,
    pub binding: KeywordBinding,
    pub disabled: bool,
    /// Whether `query_delayed` should run after the fast wave
    pub supports_delayed: bool,
}

impl PluginMetadata {
    /// Metadata for an enabled global plugin
    pub fn global(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            binding: KeywordBinding::Global,
            disabled: false,
            supports_delayed: false,
        }
    }

    /// Metadata for an enabled keyword-bound plugin
    pub fn keyword(
        id: impl Into<String>,
        name: impl Into<String>,
        keyword: impl Into<String>,
    ) -> Self {
        Self {
            binding: KeywordBinding::Keyword(keyword.into()),
            ..Self::global(id, name)
        }
    }

    pub fn with_delayed(mut self, supports_delayed: bool) -> Self {
        self.supports_delayed = supports_delayed;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// A search provider.
///
/// Both query methods run on a blocking worker thread and may perform
/// blocking I/O. Long-running plugins should poll [`Query::is_cancelled`];
/// results from a cancelled query are discarded either way. Errors and
/// panics only empty this plugin's results for the round.
pub trait Plugin: Send + Sync {
    /// Get plugin metadata
    fn metadata(&self) -> PluginMetadata;

    /// Fast query, run for every routed query
    fn query(&self, query: &Query) -> anyhow::Result<Vec<ResultItem>>;

    /// Slower query run after the fast wave when
    /// [`PluginMetadata::supports_delayed`] is set
    fn query_delayed(&self, _query: &Query) -> anyhow::Result<Vec<ResultItem>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_binding_parse() {
        assert_eq!(KeywordBinding::parse("*"), KeywordBinding::Global);
        assert_eq!(KeywordBinding::parse(" "), KeywordBinding::Global);
        assert_eq!(
            KeywordBinding::parse("img"),
            KeywordBinding::Keyword("img".to_string())
        );
        assert_eq!(KeywordBinding::parse("img").keyword(), Some("img"));
        assert_eq!(KeywordBinding::Global.to_string(), "*");
    }
}
