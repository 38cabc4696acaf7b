//! Result type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Modifier keys held while a result is executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecialKeyState {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub win: bool,
}

/// Context handed to a result action when it is executed
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionContext {
    pub special_keys: SpecialKeyState,
}

type ActionFn = dyn Fn(&ActionContext) -> bool + Send + Sync;

/// Opaque action attached to a result or context menu item.
///
/// The closure returns `true` when the launcher window should be hidden
/// after the action ran.
#[derive(Clone)]
pub struct ActionHandle(Arc<ActionFn>);

impl ActionHandle {
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(&ActionContext) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(action))
    }

    /// Run the action
    pub fn invoke(&self, context: &ActionContext) -> bool {
        (self.0)(context)
    }
}

impl fmt::Debug for ActionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ActionHandle(..)")
    }
}

/// Secondary action shown in a result's context menu
#[derive(Debug, Clone)]
pub struct ContextMenuItem {
    pub title: String,
    pub action: ActionHandle,
}

impl ContextMenuItem {
    pub fn new(title: impl Into<String>, action: ActionHandle) -> Self {
        Self {
            title: title.into(),
            action,
        }
    }
}

/// The query a result was produced for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginQuery {
    /// Raw text as typed by the user
    pub raw_text: String,
    /// Dispatch generation the result belongs to
    pub generation: u64,
}

/// Identity of a result, stable across requeries
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultIdentity {
    pub plugin_id: String,
    pub title: String,
    pub subtitle: String,
}

impl ResultIdentity {
    pub fn new(
        plugin_id: impl Into<String>,
        title: impl Into<String>,
        subtitle: impl Into<String>,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            title: title.into(),
            subtitle: subtitle.into(),
        }
    }
}

impl fmt::Display for ResultIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.plugin_id, self.title, self.subtitle)
    }
}

/// A single result returned by a plugin
#[derive(Debug, Clone)]
pub struct ResultItem {
    /// Plugin that produced the result (stamped by the dispatcher)
    pub plugin_id: String,
    pub title: String,
    pub subtitle: String,
    /// Base score as reported by the plugin
    pub score: i64,
    pub origin: OriginQuery,
    pub action: Option<ActionHandle>,
    pub context_menu: Vec<ContextMenuItem>,
}

impl ResultItem {
    /// Create a new result
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            plugin_id: String::new(),
            title: title.into(),
            subtitle: String::new(),
            score: 0,
            origin: OriginQuery::default(),
            action: None,
            context_menu: Vec::new(),
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    pub fn with_score(mut self, score: i64) -> Self {
        self.score = score;
        self
    }

    pub fn with_plugin(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = plugin_id.into();
        self
    }

    pub fn with_action<F>(mut self, action: F) -> Self
    where
        F: Fn(&ActionContext) -> bool + Send + Sync + 'static,
    {
        self.action = Some(ActionHandle::new(action));
        self
    }

    pub fn with_context_item(mut self, item: ContextMenuItem) -> Self {
        self.context_menu.push(item);
        self
    }

    /// Identity used for merging and usage tracking
    pub fn identity(&self) -> ResultIdentity {
        ResultIdentity::new(&self.plugin_id, &self.title, &self.subtitle)
    }
}

/// A result with its adjusted score, produced by the ranking engine
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub item: ResultItem,
    pub score: i64,
}

impl RankedResult {
    pub fn generation(&self) -> u64 {
        self.item.origin.generation
    }
}

/// Immutable ranked list handed to the UI
#[derive(Debug, Clone, Default)]
pub struct ResultsSnapshot {
    /// Generation that was current when the snapshot was taken
    pub generation: u64,
    pub results: Arc<Vec<RankedResult>>,
    /// Whether the results list should be shown
    pub visible: bool,
}

impl ResultsSnapshot {
    pub fn empty(generation: u64) -> Self {
        Self {
            generation,
            results: Arc::new(Vec::new()),
            visible: false,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn titles(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.item.title.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ignores_action() {
        let a = ResultItem::new("Cat1")
            .with_plugin("b")
            .with_action(|_| true);
        let b = ResultItem::new("Cat1").with_plugin("b").with_score(99);

        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), b.clone().with_subtitle("other").identity());
    }

    #[test]
    fn test_action_invoke() {
        let item = ResultItem::new("x").with_action(|ctx| ctx.special_keys.ctrl);
        let action = item.action.unwrap();

        assert!(!action.invoke(&ActionContext::default()));
        let ctx = ActionContext {
            special_keys: SpecialKeyState {
                ctrl: true,
                ..Default::default()
            },
        };
        assert!(action.invoke(&ctx));
    }
}
