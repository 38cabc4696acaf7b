//! Catalog plugin serving a fixed list of entries

use super::traits::{KeywordBinding, Plugin, PluginMetadata};
use crate::config::{CatalogConfig, CatalogEntry};
use crate::matcher::{SearchPrecision, StringMatcher};
use crate::query::Query;
use crate::results::{ActionHandle, ContextMenuItem, ResultItem};
use tracing::info;

/// Plugin that fuzzy-matches the query against a configured list of entries
pub struct CatalogPlugin {
    metadata: PluginMetadata,
    entries: Vec<CatalogEntry>,
    matcher: StringMatcher,
}

impl CatalogPlugin {
    pub fn new(config: &CatalogConfig, precision: SearchPrecision) -> Self {
        let name = if config.name.is_empty() {
            config.id.clone()
        } else {
            config.name.clone()
        };
        Self {
            metadata: PluginMetadata {
                id: config.id.clone(),
                name,
                binding: KeywordBinding::parse(&config.action_keyword),
                disabled: false,
                supports_delayed: config.delayed,
            },
            entries: config.entries.clone(),
            matcher: StringMatcher::new(precision),
        }
    }

    fn search(&self, query: &Query, subtitle_prefix: &str) -> Vec<ResultItem> {
        let mut results = Vec::new();
        for entry in &self.entries {
            if query.is_cancelled() {
                break;
            }
            let matched = if query.search.is_empty() {
                Some(0)
            } else {
                self.matcher
                    .fuzzy_score(&query.search, &entry.title)
                    .filter(|score| *score >= self.matcher.precision().threshold())
            };
            if let Some(score) = matched {
                results.push(self.to_result(entry, score, subtitle_prefix));
            }
        }
        results
    }

    fn to_result(&self, entry: &CatalogEntry, match_score: i64, subtitle_prefix: &str) -> ResultItem {
        let title = entry.title.clone();
        let copy_title = entry.title.clone();
        ResultItem::new(&entry.title)
            .with_subtitle(format!("{}{}", subtitle_prefix, entry.subtitle))
            .with_score(entry.score.saturating_add(match_score))
            .with_action(move |_| {
                info!("Launching {}", title);
                true
            })
            .with_context_item(ContextMenuItem::new(
                "Copy title",
                ActionHandle::new(move |_| {
                    info!("Copied {}", copy_title);
                    false
                }),
            ))
    }
}

impl Plugin for CatalogPlugin {
    fn metadata(&self) -> PluginMetadata {
        self.metadata.clone()
    }

    fn query(&self, query: &Query) -> anyhow::Result<Vec<ResultItem>> {
        Ok(self.search(query, ""))
    }

    fn query_delayed(&self, query: &Query) -> anyhow::Result<Vec<ResultItem>> {
        Ok(self.search(query, "(refreshed) "))
    }
}
