pub mod details;
pub mod render;

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::history::{Action, EventKey, HistoryRecord};
use crate::lookup::LookupTables;
use details::{Details, Renderers};
use render::RenderVars;

/// The matcher value that accepts anything.
pub const WILDCARD: &str = "*";

/// One matcher field of a template: a literal value or the `*` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Matcher<T> {
    Any,
    Is(T),
}

impl<T> Matcher<T> {
    pub const fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// A missing record value only satisfies the wildcard.
    pub fn accepts<Q>(&self, value: Option<&Q>) -> bool
    where
        T: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        match self {
            Self::Any => true,
            Self::Is(expected) => value.is_some_and(|v| expected.borrow() == v),
        }
    }
}

impl<T: FromStr> FromStr for Matcher<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == WILDCARD {
            Ok(Self::Any)
        } else {
            s.parse().map(Self::Is)
        }
    }
}

impl<T: fmt::Display> fmt::Display for Matcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str(WILDCARD),
            Self::Is(v) => v.fmt(f),
        }
    }
}

impl<'de, T> Deserialize<'de> for Matcher<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl<T: fmt::Display> Serialize for Matcher<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which strategy renders a template's details.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailsType {
    /// The `details` template string, rendered against the record.
    PlainText,
    /// One `Label: value` entry per changed field.
    #[default]
    Labeled,
    /// A named [`details::DetailsRenderer`].
    Custom,
}

/// A declarative rule describing how to display one class of history record.
///
/// ```toml
/// [[template]]
/// action = "UPDATE"
/// event_name = "updateOrder"
/// table_name = "orders"
/// event_name_display = "Updated orders"
/// details_type = "labeled"
/// fields = ["orders_type", "sac"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventTemplate {
    pub action: Matcher<Action>,
    pub event_name: Matcher<String>,
    pub table_name: Matcher<String>,

    /// Title template, e.g. `"Updated shipment"`.
    pub event_name_display: String,

    #[serde(default)]
    pub details_type: DetailsType,

    /// Body template for `plain_text` details.
    #[serde(default)]
    pub details: Option<String>,

    /// Restricts and orders the fields shown by `labeled` details.
    #[serde(default)]
    pub fields: Vec<String>,

    /// Per-template label overrides, consulted before the global field labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Renderer name for `custom` details.
    #[serde(default)]
    pub renderer: Option<String>,

    /// Where the template was loaded from (`<path>#<index>`), for diagnostics.
    #[serde(skip)]
    pub origin: String,
}

/// Shared, read-only state needed to render templates.
#[derive(Clone, Copy)]
pub struct RenderEnv<'a> {
    pub lookups: &'a LookupTables,
    pub renderers: &'a Renderers,
}

impl EventTemplate {
    pub fn new(
        action: Matcher<Action>,
        event_name: Matcher<String>,
        table_name: Matcher<String>,
        event_name_display: impl Into<String>,
    ) -> Self {
        Self {
            action,
            event_name,
            table_name,
            event_name_display: event_name_display.into(),
            details_type: DetailsType::default(),
            details: None,
            fields: Vec::new(),
            labels: BTreeMap::new(),
            renderer: None,
            origin: String::new(),
        }
    }

    /// A template matching every record.
    pub fn universal(event_name_display: impl Into<String>) -> Self {
        Self::new(Matcher::Any, Matcher::Any, Matcher::Any, event_name_display)
    }

    #[must_use]
    pub fn with_plain_text(mut self, details: impl Into<String>) -> Self {
        self.details_type = DetailsType::PlainText;
        self.details = Some(details.into());
        self
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: impl Into<String>) -> Self {
        self.details_type = DetailsType::Custom;
        self.renderer = Some(renderer.into());
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Count of non-wildcard matcher fields; higher means more specific.
    pub fn specificity(&self) -> usize {
        [
            self.action.is_wildcard(),
            self.event_name.is_wildcard(),
            self.table_name.is_wildcard(),
        ]
        .into_iter()
        .filter(|wild| !wild)
        .count()
    }

    pub fn is_universal(&self) -> bool {
        self.specificity() == 0
    }

    pub fn matches(&self, key: &EventKey<'_>) -> bool {
        self.action.accepts(Some(key.action))
            && self.event_name.accepts(key.event_name)
            && self.table_name.accepts(Some(key.table_name))
    }

    /// Human-readable title for `record`.
    pub fn event_name_display(&self, record: &HistoryRecord, env: RenderEnv<'_>) -> String {
        let vars = RenderVars::for_record(record, self, env.lookups);
        render::render_template(&self.event_name_display, &vars, env.lookups)
    }

    /// Rendered detail content for `record`.
    pub fn details(&self, record: &HistoryRecord, env: RenderEnv<'_>) -> Details {
        match self.details_type {
            DetailsType::PlainText => {
                let body = self.details.as_deref().unwrap_or_default();
                let vars = RenderVars::for_record(record, self, env.lookups);
                Details::Text(render::render_template(body, &vars, env.lookups))
            }
            DetailsType::Labeled => Details::List(details::labeled_values(record, self, env.lookups)),
            DetailsType::Custom => {
                match self.renderer.as_deref().and_then(|name| env.renderers.get(name)) {
                    Some(renderer) => renderer.render(record, env.lookups),
                    None => Details::List(details::labeled_values(record, self, env.lookups)),
                }
            }
        }
    }

    /// [`Self::details`] flattened to a single line.
    pub fn details_plain_text(&self, record: &HistoryRecord, env: RenderEnv<'_>) -> String {
        self.details(record, env).to_plain_text()
    }

    /// Configuration problems that would make this template misbehave.
    /// An empty list means the template is usable.
    pub fn problems(&self, renderers: &Renderers) -> Vec<String> {
        let mut problems = Vec::new();

        if let Matcher::Is(event) = &self.event_name
            && event.is_empty()
        {
            problems.push("event_name is empty (use \"*\" to match any event)".to_string());
        }
        if let Matcher::Is(table) = &self.table_name
            && !is_table_name(table)
        {
            problems.push(format!("table_name '{table}' is not a valid table name"));
        }
        if self.event_name_display.trim().is_empty() {
            problems.push("event_name_display is empty".to_string());
        }

        match self.details_type {
            DetailsType::PlainText if self.details.is_none() => {
                problems.push("details_type = \"plain_text\" requires `details`".to_string());
            }
            DetailsType::Custom => match self.renderer.as_deref() {
                None => problems.push("details_type = \"custom\" requires `renderer`".to_string()),
                Some(name) if renderers.get(name).is_none() => {
                    problems.push(format!(
                        "unknown renderer '{name}' (available: {})",
                        renderers.names().collect::<Vec<_>>().join(", ")
                    ));
                }
                Some(_) => {}
            },
            _ => {}
        }

        problems
    }
}

static TABLE_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").ok());

fn is_table_name(name: &str) -> bool {
    TABLE_NAME.as_ref().is_some_and(|re| re.is_match(name))
}

/// On-disk shape of a template file: any number of `[[template]]` entries.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateFile {
    #[serde(default)]
    pub template: Vec<EventTemplate>,
}
