//! Key-by-key merge of one row or object with its patched version.
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::util::truncate_string;

/// Shown even when unchanged.
pub const IMPORTANT_KEYS: [&str; 5] = ["id", "title", "titleText", "text", "scores"];

/// Visited first, in this order; every other key follows sorted.
pub const SPECIAL_KEYS: [&str; 8] = [
    "id",
    "title",
    "titleText",
    "text",
    "scores",
    "addons",
    "image",
    "requireds",
];

/// Editor state that a patch must never overwrite.
pub const IGNORE_KEYS: [&str; 3] = ["currentChoices", "isActive", "isEditModeOn"];

const MAX_TEXT_LEN: usize = 60;
const NOT_AVAILABLE: &str = "N/A";
const UNCHANGED: &str = "==";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRow {
    pub key: String,
    pub old: String,
    pub new: String,
}

/// Three-column key / old / new table printed for every merged item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffTable {
    pub rows: Vec<DiffRow>,
}

impl DiffTable {
    fn push(&mut self, key: &str, old: String, new: String) {
        self.rows.push(DiffRow {
            key: key.to_string(),
            old,
            new,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for DiffTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = |cell: &str| cell.lines().map(|line| line.chars().count()).max().unwrap_or(0);
        let key_width = self.rows.iter().map(|row| width(&row.key)).max().unwrap_or(0);
        let old_width = self.rows.iter().map(|row| width(&row.old)).max().unwrap_or(0);
        for row in &self.rows {
            let old_lines: Vec<&str> = row.old.lines().collect();
            let new_lines: Vec<&str> = row.new.lines().collect();
            let height = old_lines.len().max(new_lines.len()).max(1);
            for line in 0..height {
                let key = if line == 0 { row.key.as_str() } else { "" };
                let old = old_lines.get(line).copied().unwrap_or("");
                let new = new_lines.get(line).copied().unwrap_or("");
                let text = format!("{key:<key_width$} | {old:<old_width$} | {new}");
                writeln!(f, "{}", text.trim_end())?;
            }
        }
        Ok(())
    }
}

/// Outcome of `update_dict`.
#[derive(Debug, Clone)]
pub struct DictMerge {
    pub value: Map<String, Value>,
    pub changed: bool,
    pub table: DiffTable,
}

/// Merge `new` into `old` key by key.
///
/// Changed and added keys take the new value, keys missing from `new` are
/// dropped, ignored keys keep the old value. When nothing changed the old map
/// is returned untouched (including its key order).
pub fn update_dict(old: &Map<String, Value>, new: &Map<String, Value>) -> DictMerge {
    let merged_keys: BTreeSet<&str> = old.keys().chain(new.keys()).map(String::as_str).collect();
    let rest_keys = merged_keys
        .into_iter()
        .filter(|key| !SPECIAL_KEYS.contains(key));

    let mut result = Map::new();
    let mut changed = false;
    let mut table = DiffTable::default();
    for key in SPECIAL_KEYS.into_iter().chain(rest_keys) {
        match (old.get(key), new.get(key)) {
            (Some(old_value), _) if IGNORE_KEYS.contains(&key) => {
                result.insert(key.to_string(), old_value.clone());
            }
            (None, _) if IGNORE_KEYS.contains(&key) => {}
            (Some(old_value), Some(new_value)) if old_value != new_value => {
                table.push(
                    key,
                    show_value(old_value, Some(key)),
                    show_value(new_value, Some(key)),
                );
                result.insert(key.to_string(), new_value.clone());
                changed = true;
            }
            (Some(old_value), None) => {
                table.push(key, show_value(old_value, Some(key)), NOT_AVAILABLE.to_string());
                changed = true;
            }
            (None, Some(new_value)) => {
                table.push(key, NOT_AVAILABLE.to_string(), show_value(new_value, Some(key)));
                result.insert(key.to_string(), new_value.clone());
                changed = true;
            }
            (Some(old_value), Some(_)) => {
                if IMPORTANT_KEYS.contains(&key) {
                    table.push(key, show_value(old_value, Some(key)), UNCHANGED.to_string());
                }
                result.insert(key.to_string(), old_value.clone());
            }
            (None, None) => {}
        }
    }

    DictMerge {
        value: if changed { result } else { old.clone() },
        changed,
        table,
    }
}

/// Human-readable rendering of one value for the diff table.
pub fn show_value(value: &Value, key: Option<&str>) -> String {
    match (key, value) {
        (Some("scores"), Value::Array(scores)) => {
            scores.iter().map(show_score).collect::<Vec<_>>().join("\n")
        }
        (Some("requireds"), Value::Array(items)) => items
            .iter()
            .map(show_required)
            .collect::<Vec<_>>()
            .join("\n"),
        (_, Value::String(text)) if text.is_empty() => NOT_AVAILABLE.to_string(),
        (_, Value::String(text)) => {
            if text.chars().count() > MAX_TEXT_LEN {
                let cut = text
                    .char_indices()
                    .nth(MAX_TEXT_LEN)
                    .map(|(index, _)| index)
                    .unwrap_or(text.len());
                format!("{}...", truncate_string(text, cut))
            } else {
                text.clone()
            }
        }
        (_, Value::Array(items)) if items.is_empty() => "[]".to_string(),
        (_, Value::Array(items)) => items
            .iter()
            .map(|item| show_value(item, None))
            .collect::<Vec<_>>()
            .join("\n"),
        (_, Value::Object(map)) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            serde_json::to_string_pretty(&sorted).unwrap_or_default()
        }
        (_, other) => other.to_string(),
    }
}

fn field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn show_score(score: &Value) -> String {
    let conditional = score
        .get("requireds")
        .and_then(Value::as_array)
        .is_some_and(|requireds| !requireds.is_empty());
    format!(
        "{} {} {} ({}){}",
        field(score, "beforeText"),
        field(score, "value"),
        field(score, "afterText"),
        field(score, "id"),
        if conditional { " (cond)" } else { "" }
    )
}

fn show_required(item: &Value) -> String {
    let target = match item.get("type").and_then(Value::as_str) {
        Some("id") => field(item, "reqId"),
        Some("or") => item
            .get("orRequired")
            .and_then(Value::as_array)
            .map(|alternatives| {
                alternatives
                    .iter()
                    .map(|alternative| field(alternative, "req"))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default(),
        _ => "Other".to_string(),
    };
    format!(
        "{} {} {}",
        field(item, "beforeText"),
        target,
        field(item, "afterText")
    )
}
