//! One display row per history record, as laid out by the move history view.

use serde::Serialize;

use crate::history::HistoryRecord;
use crate::registry::Registry;
use crate::template::details::{self, Details};
use crate::template::{EventTemplate, RenderEnv};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Action as reported by the audit log, including unrecognized ones.
    pub action: String,
    pub event: String,
    pub details: Details,
    pub details_text: String,
    /// Origin of the resolved template; empty for unrecognized rows.
    pub template: String,
    /// No template matched and the generic fallback was used.
    pub unrecognized: bool,
}

/// Build the row for one record.
///
/// A resolution failure does not abort: the row gets `fallback_label` as its
/// title and a labeled list of the changed values.
pub fn build_row(
    registry: &Registry,
    record: &HistoryRecord,
    env: RenderEnv<'_>,
    fallback_label: &str,
    verbose: bool,
) -> HistoryRow {
    match registry.resolve(record) {
        Ok(template) => {
            if verbose {
                eprintln!("[movehist] {} -> {}", record.key(), template.origin);
            }
            let details = template.details(record, env);
            HistoryRow {
                timestamp: record.action_tstamp_tx.clone(),
                user: record.user_name(),
                action: record.action.to_string(),
                event: template.event_name_display(record, env),
                details_text: details.to_plain_text(),
                details,
                template: template.origin.clone(),
                unrecognized: false,
            }
        }
        Err(e) => {
            if verbose {
                eprintln!("[movehist] {e}; using fallback row");
            }
            let generic = EventTemplate::universal(fallback_label);
            let details = Details::List(details::labeled_values(record, &generic, env.lookups));
            HistoryRow {
                timestamp: record.action_tstamp_tx.clone(),
                user: record.user_name(),
                action: record.action.to_string(),
                event: fallback_label.to_string(),
                details_text: details.to_plain_text(),
                details,
                template: String::new(),
                unrecognized: true,
            }
        }
    }
}

/// Build rows for every record, preserving input order.
pub fn build_rows(
    registry: &Registry,
    records: &[HistoryRecord],
    env: RenderEnv<'_>,
    fallback_label: &str,
    verbose: bool,
) -> Vec<HistoryRow> {
    records
        .iter()
        .map(|record| build_row(registry, record, env, fallback_label, verbose))
        .collect()
}

impl HistoryRow {
    /// `"<timestamp>  <user>  <event>  <details>"`, skipping missing columns.
    pub fn to_line(&self) -> String {
        let mut columns: Vec<&str> = Vec::new();
        if let Some(ts) = &self.timestamp {
            columns.push(ts);
        }
        if let Some(user) = &self.user {
            columns.push(user);
        }
        columns.push(&self.event);
        if !self.details_text.is_empty() {
            columns.push(&self.details_text);
        }
        columns.join("  ")
    }
}
