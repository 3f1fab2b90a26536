//! Business lookup tables: display labels for orders types, pay grades,
//! branches, statuses and field names, plus rank/grade associations.
//!
//! The tables are plain data loaded once at start-up and handed to consumers
//! by reference; nothing mutates them afterwards.

use std::collections::BTreeMap;

use anyhow::Context as _;
use serde::Deserialize;

static BUILTIN_LOOKUPS: &str = include_str!("../../data/lookups.toml");

/// Orders types that get special handling in the move workflow.
const SPECIAL_ORDERS_TYPES: [&str; 3] = ["BLUEBARK", "WOUNDED_WARRIOR", "SAFETY"];

/// One rank entry for a branch of service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RankEntry {
    pub branch: String,
    pub abbv: String,
    pub name: String,
    pub grade: String,
}

/// A rank formatted for display, e.g. `"SGT / E-5"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankOption {
    pub abbv: String,
    pub name: String,
    pub grade: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupTables {
    #[serde(default)]
    tables: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    field_labels: BTreeMap<String, String>,
    #[serde(default)]
    field_lookups: BTreeMap<String, String>,
    #[serde(default, rename = "rank")]
    ranks: Vec<RankEntry>,
}

impl LookupTables {
    /// Parse the lookup document compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded document is not valid TOML.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_toml(BUILTIN_LOOKUPS).context("failed to parse built-in lookup tables")
    }

    /// # Errors
    ///
    /// Returns an error if `content` is not a valid lookup document.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Label for `code` in `table`, if both exist.
    pub fn display(&self, table: &str, code: &str) -> Option<&str> {
        self.tables.get(table)?.get(code).map(String::as_str)
    }

    /// Label for `code` in `table`, falling back to the code itself.
    pub fn translate(&self, table: &str, code: &str) -> String {
        self.display(table, code).unwrap_or(code).to_string()
    }

    pub fn table(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Human label for a database field name.
    pub fn field_label(&self, field: &str) -> Option<&str> {
        self.field_labels.get(field).map(String::as_str)
    }

    /// Lookup table whose labels apply to values of `field`.
    pub fn field_table(&self, field: &str) -> Option<&str> {
        self.field_lookups.get(field).map(String::as_str)
    }

    /// Translate a field value through the table bound to that field, if any.
    pub fn field_value(&self, field: &str, value: &str) -> String {
        self.field_table(field)
            .map_or_else(|| value.to_string(), |table| self.translate(table, value))
    }

    /// Ranks for `branch`, in declaration order.
    pub fn ranks<'a>(&'a self, branch: &'a str) -> impl Iterator<Item = &'a RankEntry> + 'a {
        self.ranks.iter().filter(move |r| r.branch == branch)
    }

    /// Ranks for `branch` keyed for display as `"<abbv> / <pay grade label>"`.
    pub fn rank_options(&self, branch: &str) -> Vec<RankOption> {
        self.ranks(branch)
            .map(|r| RankOption {
                abbv: r.abbv.clone(),
                name: r.name.clone(),
                grade: r.grade.clone(),
                value: format!("{} / {}", r.abbv, self.translate("pay_grade", &r.grade)),
            })
            .collect()
    }
}

pub fn is_special_orders_type(code: &str) -> bool {
    SPECIAL_ORDERS_TYPES.contains(&code)
}

#[cfg(test)]
mod tests;
