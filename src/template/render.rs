use std::collections::HashMap;

use regex::Regex;

use super::EventTemplate;
use super::details::field_label;
use crate::history::{HistoryRecord, value_text};
use crate::lookup::LookupTables;

/// Maximum recursion depth to prevent infinite loops.
const MAX_DEPTH: usize = 3;

/// Variables visible to a template string.
#[derive(Debug, Clone, Default)]
pub struct RenderVars {
    pub vars: HashMap<String, String>,
    pub collections: HashMap<String, Vec<String>>,
}

impl RenderVars {
    /// Flatten a record into template variables:
    /// `action`, `event_name`, `table_name`, `user`, `user_email`, `timestamp`,
    /// `changed.<field>`, `old.<field>`, `context.<i>.<field>`, `context.count`,
    /// and the collection `changed_fields`.
    pub fn for_record(
        record: &HistoryRecord,
        template: &EventTemplate,
        lookups: &LookupTables,
    ) -> Self {
        let mut vars = HashMap::new();
        vars.insert("action".to_string(), record.action.to_string());
        vars.insert(
            "event_name".to_string(),
            record.event_name.clone().unwrap_or_default(),
        );
        vars.insert("table_name".to_string(), record.table_name.clone());
        vars.insert("user".to_string(), record.user_name().unwrap_or_default());
        vars.insert(
            "user_email".to_string(),
            record.session_user_email.clone().unwrap_or_default(),
        );
        vars.insert(
            "timestamp".to_string(),
            record.action_tstamp_tx.clone().unwrap_or_default(),
        );

        for (field, value) in &record.changed_values {
            vars.insert(format!("changed.{field}"), value_text(value));
        }
        for (field, value) in &record.old_values {
            vars.insert(format!("old.{field}"), value_text(value));
        }
        for (i, entry) in record.context.iter().enumerate() {
            for (field, value) in entry {
                vars.insert(format!("context.{i}.{field}"), value_text(value));
            }
        }
        vars.insert("context.count".to_string(), record.context.len().to_string());

        let changed_fields = record
            .changed_values
            .keys()
            .map(|field| field_label(field, template, lookups))
            .collect();

        let mut collections = HashMap::new();
        collections.insert("changed_fields".to_string(), changed_fields);

        Self { vars, collections }
    }
}

/// Render a template string, resolving `{var}` and pipe chains such as
/// `{changed.orders_type | lookup: orders_type | default: "n/a"}`.
///
/// Unknown variables render as empty strings; unknown pipes pass values through.
pub fn render_template(template: &str, vars: &RenderVars, lookups: &LookupTables) -> String {
    render_template_inner(template, vars, lookups, 0)
}

fn render_template_inner(
    template: &str,
    vars: &RenderVars,
    lookups: &LookupTables,
    depth: usize,
) -> String {
    if depth >= MAX_DEPTH {
        return template.to_string();
    }

    let expressions = find_expressions(template);
    if expressions.is_empty() {
        return template.to_string();
    }

    let mut result = template.to_string();

    // Right-to-left keeps earlier offsets valid.
    for (start, end) in expressions.into_iter().rev() {
        let inner = &template[start + 1..end - 1];
        let replacement = evaluate_expression(inner, vars, lookups, depth);
        result.replace_range(start..end, &replacement);
    }

    result
}

/// Find top-level `{...}` spans, handling nested braces and quotes.
/// Returns (start, end) byte offsets where end is exclusive.
fn find_expressions(template: &str) -> Vec<(usize, usize)> {
    let mut result = Vec::new();
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{'
            && let Some(end) = find_matching_close(bytes, i)
        {
            result.push((i, end + 1));
            i = end + 1;
        } else {
            i += 1;
        }
    }

    result
}

fn find_matching_close(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0;
    let mut in_quote = false;

    for (i, &ch) in bytes.iter().enumerate().skip(start) {
        if ch == b'"' && (i == 0 || bytes[i - 1] != b'\\') {
            in_quote = !in_quote;
        } else if !in_quote {
            if ch == b'{' {
                depth += 1;
            } else if ch == b'}' {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
        }
    }

    None
}

/// Resolved value: either a single string or a collection.
enum Value {
    Str(String),
    Collection(Vec<String>),
}

fn evaluate_expression(
    expr: &str,
    vars: &RenderVars,
    lookups: &LookupTables,
    depth: usize,
) -> String {
    let parts = split_pipes(expr);
    let mut value = resolve_variable(parts[0].trim(), vars);

    for pipe in &parts[1..] {
        value = apply_pipe(pipe.trim(), value, vars, lookups, depth);
    }

    match value {
        Value::Str(s) => s,
        Value::Collection(items) => items.join(", "),
    }
}

/// Split on top-level `|` (not inside quotes or nested braces).
fn split_pipes(expr: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let bytes = expr.as_bytes();
    let mut last = 0;
    let mut brace_depth = 0;
    let mut in_quote = false;

    for (i, &ch) in bytes.iter().enumerate() {
        if ch == b'"' && (i == 0 || bytes[i - 1] != b'\\') {
            in_quote = !in_quote;
        } else if !in_quote {
            if ch == b'{' {
                brace_depth += 1;
            } else if ch == b'}' {
                brace_depth -= 1;
            } else if ch == b'|' && brace_depth == 0 {
                result.push(&expr[last..i]);
                last = i + 1;
            }
        }
    }

    result.push(&expr[last..]);
    result
}

fn resolve_variable(name: &str, vars: &RenderVars) -> Value {
    if let Some(val) = vars.vars.get(name) {
        return Value::Str(val.clone());
    }
    if let Some(items) = vars.collections.get(name) {
        return Value::Collection(items.clone());
    }
    if let Some(base) = name.strip_suffix(".count")
        && let Some(items) = vars.collections.get(base)
    {
        return Value::Str(items.len().to_string());
    }
    Value::Str(String::new())
}

fn apply_pipe(
    pipe: &str,
    value: Value,
    vars: &RenderVars,
    lookups: &LookupTables,
    depth: usize,
) -> Value {
    if let Some(arg) = pipe.strip_prefix("lookup:") {
        apply_lookup(&parse_string_arg(arg), value, lookups)
    } else if let Some(arg) = pipe.strip_prefix("default:") {
        apply_default(&parse_string_arg(arg), value)
    } else if let Some(arg) = pipe.strip_prefix("join:") {
        apply_join(&parse_string_arg(arg), value)
    } else if let Some(arg) = pipe.strip_prefix("each:") {
        apply_each(&parse_string_arg(arg), value, vars, lookups, depth)
    } else if let Some(arg) = pipe.strip_prefix("truncate:") {
        apply_truncate(arg.trim(), value)
    } else if let Some(arg) = pipe.strip_prefix("keep:") {
        apply_keep(&parse_string_arg(arg), value)
    } else if pipe == "upper" {
        map_str(value, |s| s.to_uppercase())
    } else if pipe == "lower" {
        map_str(value, |s| s.to_lowercase())
    } else {
        value
    }
}

fn map_str(value: Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::Str(s) => Value::Str(f(&s)),
        Value::Collection(items) => Value::Collection(items.iter().map(|s| f(s)).collect()),
    }
}

/// `| lookup: table`: translate codes through a lookup table.
fn apply_lookup(table: &str, value: Value, lookups: &LookupTables) -> Value {
    map_str(value, |code| lookups.translate(table, code))
}

/// `| default: "text"`: substitute when the value is empty.
fn apply_default(fallback: &str, value: Value) -> Value {
    match value {
        Value::Str(s) if s.is_empty() => Value::Str(fallback.to_string()),
        Value::Collection(items) if items.is_empty() => Value::Str(fallback.to_string()),
        other => other,
    }
}

/// `| join: "separator"`
fn apply_join(sep: &str, value: Value) -> Value {
    match value {
        Value::Collection(items) => Value::Str(items.join(sep)),
        s @ Value::Str(_) => s,
    }
}

/// `| each: "template"`: map each item through a sub-template with `{index}` / `{value}`.
fn apply_each(
    tmpl: &str,
    value: Value,
    vars: &RenderVars,
    lookups: &LookupTables,
    depth: usize,
) -> Value {
    let items = match value {
        Value::Collection(items) => items,
        Value::Str(s) if s.is_empty() => return Value::Collection(Vec::new()),
        Value::Str(s) => vec![s],
    };

    let mapped = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let mut local = vars.clone();
            local.vars.insert("index".to_string(), (i + 1).to_string());
            local.vars.insert("value".to_string(), item.clone());
            render_template_inner(tmpl, &local, lookups, depth + 1)
        })
        .collect();

    Value::Collection(mapped)
}

/// `| truncate: N`: cut to N characters, appending `...`.
fn apply_truncate(arg: &str, value: Value) -> Value {
    let Ok(n) = arg.parse::<usize>() else {
        return value;
    };
    map_str(value, |s| {
        if s.chars().count() <= n {
            s.to_string()
        } else {
            let truncated: String = s.chars().take(n).collect();
            format!("{truncated}...")
        }
    })
}

/// `| keep: "re"`: retain collection items matching the regex.
///
/// Strings and invalid patterns pass through unchanged.
fn apply_keep(pattern: &str, value: Value) -> Value {
    let Ok(re) = Regex::new(pattern) else {
        return value;
    };
    match value {
        Value::Collection(items) => {
            Value::Collection(items.into_iter().filter(|l| re.is_match(l)).collect())
        }
        s @ Value::Str(_) => s,
    }
}

/// Parse a quoted or unquoted string argument, unescaping `\n`, `\t`, `\\`, `\"`.
fn parse_string_arg(arg: &str) -> String {
    let trimmed = arg.trim();
    let inner = if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    unescape(inner)
}

fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('"') => result.push('"'),
                Some('\\') | None => result.push('\\'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}
