use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::EventTemplate;
use crate::history::{HistoryRecord, value_text};
use crate::lookup::LookupTables;

/// Rendered detail content for one history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum Details {
    Text(String),
    List(Vec<LabeledValue>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledValue {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
}

impl LabeledValue {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            previous: None,
        }
    }
}

impl Details {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
        }
    }

    /// Single-line form: text as-is, list entries as `Label: value` joined by `, `.
    pub fn to_plain_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::List(items) => items
                .iter()
                .map(|item| format!("{}: {}", item.label, item.value))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Label for `field`: template override, then the global label table, then the raw name.
pub fn field_label(field: &str, template: &EventTemplate, lookups: &LookupTables) -> String {
    template
        .labels
        .get(field)
        .map(String::as_str)
        .or_else(|| lookups.field_label(field))
        .unwrap_or(field)
        .to_string()
}

/// Display text for a field value: booleans as `Yes`/`No`, codes translated
/// through the field's lookup table. `None` for null or empty values.
fn field_value_text(field: &str, value: &Value, lookups: &LookupTables) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(true) => Some("Yes".to_string()),
        Value::Bool(false) => Some("No".to_string()),
        other => {
            let text = value_text(other);
            if text.trim().is_empty() {
                None
            } else {
                Some(lookups.field_value(field, &text))
            }
        }
    }
}

/// One entry per changed field, in key order or the template's `fields` order.
pub fn labeled_values(
    record: &HistoryRecord,
    template: &EventTemplate,
    lookups: &LookupTables,
) -> Vec<LabeledValue> {
    let fields: Vec<&str> = if template.fields.is_empty() {
        record.changed_values.keys().map(String::as_str).collect()
    } else {
        template.fields.iter().map(String::as_str).collect()
    };

    fields
        .into_iter()
        .filter_map(|field| {
            let value = field_value_text(field, record.changed_values.get(field)?, lookups)?;
            let previous = record
                .old_values
                .get(field)
                .and_then(|old| field_value_text(field, old, lookups));
            Some(LabeledValue {
                label: field_label(field, template, lookups),
                value,
                previous,
            })
        })
        .collect()
}

/// A hand-written details strategy for records the declarative forms cannot express.
pub trait DetailsRenderer: Send + Sync {
    /// Name referenced by `renderer = "..."` in template files.
    fn name(&self) -> &'static str;
    fn render(&self, record: &HistoryRecord, lookups: &LookupTables) -> Details;
}

/// The set of custom renderers available to templates, keyed by name.
pub struct Renderers {
    by_name: BTreeMap<&'static str, Box<dyn DetailsRenderer>>,
}

impl Renderers {
    pub fn empty() -> Self {
        Self {
            by_name: BTreeMap::new(),
        }
    }

    /// All renderers shipped with the crate.
    pub fn builtin() -> Self {
        let mut renderers = Self::empty();
        renderers.add(Box::new(AddressRenderer));
        renderers.add(Box::new(ShipmentRenderer));
        renderers.add(Box::new(ServiceItemRenderer));
        renderers
    }

    /// Later additions replace earlier ones with the same name.
    pub fn add(&mut self, renderer: Box<dyn DetailsRenderer>) {
        self.by_name.insert(renderer.name(), renderer);
    }

    pub fn get(&self, name: &str) -> Option<&dyn DetailsRenderer> {
        self.by_name.get(name).map(Box::as_ref)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_name.keys().copied()
    }
}

impl Default for Renderers {
    fn default() -> Self {
        Self::builtin()
    }
}

const ADDRESS_FIELDS: [&str; 5] = [
    "street_address_1",
    "street_address_2",
    "city",
    "state",
    "postal_code",
];

/// `"123 Any St, Apt 4, Norfolk, VA 23503"` from an address value map.
fn one_line_address(values: &BTreeMap<String, Value>) -> Option<String> {
    let part = |field: &str| {
        values
            .get(field)
            .map(value_text)
            .filter(|s| !s.trim().is_empty())
    };
    let [street1, street2, city, state, postal] = ADDRESS_FIELDS.map(part);

    let region = match (state, postal) {
        (Some(s), Some(p)) => Some(format!("{s} {p}")),
        (s, p) => s.or(p),
    };
    let parts: Vec<String> = [street1, street2, city, region].into_iter().flatten().collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Collapses address component changes into a single `Address` entry.
pub struct AddressRenderer;

impl DetailsRenderer for AddressRenderer {
    fn name(&self) -> &'static str {
        "address"
    }

    fn render(&self, record: &HistoryRecord, _lookups: &LookupTables) -> Details {
        // Unchanged components come from old values so the line stays complete.
        let mut merged = record.old_values.clone();
        merged.extend(record.changed_values.clone());

        let label = record
            .context_text(0, "address_type")
            .unwrap_or_else(|| "Address".to_string());

        match one_line_address(&merged) {
            Some(value) => Details::List(vec![LabeledValue {
                label,
                value,
                previous: one_line_address(&record.old_values),
            }]),
            None => Details::List(Vec::new()),
        }
    }
}

/// Prefixes the changed fields with the shipment they belong to, taken from context.
pub struct ShipmentRenderer;

impl DetailsRenderer for ShipmentRenderer {
    fn name(&self) -> &'static str {
        "shipment"
    }

    fn render(&self, record: &HistoryRecord, lookups: &LookupTables) -> Details {
        let mut items = Vec::new();

        let shipment_type = record
            .context_text(0, "shipment_type")
            .map(|t| lookups.translate("shipment_type", &t));
        let shipment_id = record
            .context_text(0, "shipment_id_abbr")
            .map(|id| format!("#{}", id.to_uppercase()));
        let heading: Vec<String> = [shipment_type, shipment_id].into_iter().flatten().collect();
        if !heading.is_empty() {
            items.push(LabeledValue::new("Shipment", heading.join(" shipment ")));
        }

        let template = EventTemplate::universal("");
        items.extend(labeled_values(record, &template, lookups));
        Details::List(items)
    }
}

/// `"<service item name>: <status>"` for service item status changes.
pub struct ServiceItemRenderer;

impl DetailsRenderer for ServiceItemRenderer {
    fn name(&self) -> &'static str {
        "service_item"
    }

    fn render(&self, record: &HistoryRecord, lookups: &LookupTables) -> Details {
        let name = record
            .context_text(0, "name")
            .unwrap_or_else(|| "Service item".to_string());
        let status = record
            .changed_text("status")
            .map(|s| lookups.translate("service_item_status", &s));

        let text = match status {
            Some(status) => format!("{name}: {status}"),
            None => name,
        };
        match record.changed_text("rejection_reason") {
            Some(reason) => Details::Text(format!("{text} ({reason})")),
            None => Details::Text(text),
        }
    }
}
