//! The ordered template registry and the specificity-ranked resolver.
//!
//! Templates are registered once at start-up and never change afterwards.
//! Resolution picks the matching template with the most literal matcher
//! fields; among equally specific matches the earliest registered wins.

use std::cmp::Reverse;

use crate::history::{Action, EventKey, HistoryRecord};
use crate::template::EventTemplate;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Only reachable when no universal (`* * *`) template was registered.
    #[error("no template matches {action} {} {table_name}", .event_name.as_deref().unwrap_or("<none>"))]
    NoMatchingTemplate {
        action: Action,
        event_name: Option<String>,
        table_name: String,
    },
}

impl ResolveError {
    fn no_match(key: &EventKey<'_>) -> Self {
        Self::NoMatchingTemplate {
            action: key.action.clone(),
            event_name: key.event_name.map(str::to_string),
            table_name: key.table_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    templates: Vec<EventTemplate>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `templates` in order. No deduplication: order decides ties.
    pub fn register(&mut self, templates: impl IntoIterator<Item = EventTemplate>) {
        self.templates.extend(templates);
    }

    /// Registered templates in registration order.
    pub fn templates(&self) -> &[EventTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Whether a `* * *` template guarantees every record resolves.
    pub fn has_universal_fallback(&self) -> bool {
        self.templates.iter().any(EventTemplate::is_universal)
    }

    /// Best-matching template for `record`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoMatchingTemplate`] when no template matches.
    pub fn resolve(&self, record: &HistoryRecord) -> Result<&EventTemplate, ResolveError> {
        self.resolve_key(&record.key())
    }

    /// Best-matching template for a bare `(action, event name, table name)` key.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoMatchingTemplate`] when no template matches.
    pub fn resolve_key(&self, key: &EventKey<'_>) -> Result<&EventTemplate, ResolveError> {
        self.templates
            .iter()
            .enumerate()
            .filter(|(_, t)| t.matches(key))
            .min_by_key(|(index, t)| (Reverse(t.specificity()), *index))
            .map(|(_, t)| t)
            .ok_or_else(|| ResolveError::no_match(key))
    }
}

impl FromIterator<EventTemplate> for Registry {
    fn from_iter<I: IntoIterator<Item = EventTemplate>>(iter: I) -> Self {
        let mut registry = Self::new();
        registry.register(iter);
        registry
    }
}
