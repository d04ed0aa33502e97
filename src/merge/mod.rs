//! `merge` command: bring edits from a patch project into a project file.
//!
//! Rows are diffed against the patch by id and content; changed rows have
//! their properties merged key by key and their objects diffed the same way.
//! Skip and only lists protect rows and objects from any change.
mod dict;
mod matcher;
mod sequence;

use anyhow::{anyhow, Result};
use serde_json::{Map, Value};

pub use dict::{update_dict, DiffTable};
pub use sequence::{diff_sequence, DiffCounts, SequenceHandler};

use crate::cli::MergeArgs;
use crate::project::{item_id, item_title, load_project, project_rows_mut, save_project};
use crate::util::json_hash;

/// Skip/only lists for one level (rows or objects).
#[derive(Debug, Clone, Default)]
pub struct MergeFilter {
    pub skip: Vec<String>,
    pub only: Vec<String>,
}

impl MergeFilter {
    /// Why `id` must stay untouched, if it must.
    fn exclusion(&self, id: &str) -> Option<&'static str> {
        if self.skip.iter().any(|skip| skip == id) {
            return Some("in exclusion list");
        }
        if !self.only.is_empty() && !self.only.iter().any(|only| only == id) {
            return Some("not in inclusion list");
        }
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeFilters {
    pub rows: MergeFilter,
    pub objects: MergeFilter,
}

impl From<&MergeArgs> for MergeFilters {
    fn from(args: &MergeArgs) -> Self {
        MergeFilters {
            rows: MergeFilter {
                skip: args.skip_rows.clone(),
                only: args.only_rows.clone(),
            },
            objects: MergeFilter {
                skip: args.skip_objs.clone(),
                only: args.only_objs.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub rows: DiffCounts,
    pub objects: DiffCounts,
}

pub fn run_merge(args: &MergeArgs) -> Result<()> {
    let mut project = load_project(&args.project_file)?;
    let mut patch = load_project(&args.patch)?;
    let filters = MergeFilters::from(args);

    let outcome = merge_projects(&mut project, &mut patch, &filters)?;
    tracing::info!(
        rows_updated = outcome.rows.replace,
        rows_deleted = outcome.rows.delete,
        rows_inserted = outcome.rows.insert,
        objects_updated = outcome.objects.replace,
        objects_deleted = outcome.objects.delete,
        objects_inserted = outcome.objects.insert,
        "merge complete"
    );

    if args.write {
        save_project(&args.project_file, &project)?;
        println!("wrote {}", args.project_file.display());
    } else {
        println!("dry run; pass --write to save {}", args.project_file.display());
    }
    Ok(())
}

/// Merge the rows of `patch` into `project` in place.
pub fn merge_projects(
    project: &mut Value,
    patch: &mut Value,
    filters: &MergeFilters,
) -> Result<MergeOutcome> {
    let patch_rows = std::mem::take(project_rows_mut(patch)?);
    let rows = project_rows_mut(project)?;

    let mut handler = RowHandler {
        filters,
        outcome: MergeOutcome::default(),
    };
    let merged = diff_sequence(rows, &patch_rows, &mut handler)?;
    *rows = merged;
    Ok(handler.outcome)
}

fn into_map(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("expected a JSON object, got {other}")),
    }
}

fn take_objects(row: &mut Map<String, Value>) -> Vec<Value> {
    match row.shift_remove("objects") {
        Some(Value::Array(objects)) => objects,
        _ => Vec::new(),
    }
}

fn print_table(table: &DiffTable) {
    if !table.is_empty() {
        print!("{table}");
    }
}

/// Show an item's key fields without changing it.
fn print_item(item: &Value) {
    if let Some(map) = item.as_object() {
        print_table(&update_dict(map, map).table);
    }
}

fn print_counts(indent: &str, noun: &str, counts: &DiffCounts) {
    if counts.replace > 0 {
        println!("{indent}Total Updated {noun}: {}", counts.replace);
    }
    if counts.delete > 0 {
        println!("{indent}Total Deleted {noun}: {}", counts.delete);
    }
    if counts.insert > 0 {
        println!("{indent}Total Inserted {noun}: {}", counts.insert);
    }
}

struct RowHandler<'a> {
    filters: &'a MergeFilters,
    outcome: MergeOutcome,
}

impl SequenceHandler for RowHandler<'_> {
    fn update_item(&mut self, old: Value, new: Value) -> Result<Value> {
        let id = item_id(&old)?;
        println!("Updated Row ({id}): {}", item_title(&old));
        if let Some(reason) = self.filters.rows.exclusion(&id) {
            println!("  Skipped ({reason})");
            return Ok(old);
        }

        let mut old_row = into_map(old)?;
        let mut new_row = into_map(new)?;
        let old_objects = take_objects(&mut old_row);
        let new_objects = take_objects(&mut new_row);

        let mut updated = if json_hash(&Value::Object(old_row.clone()))
            != json_hash(&Value::Object(new_row.clone()))
        {
            println!("  Updated Row Data");
            let merge = update_dict(&old_row, &new_row);
            print_table(&merge.table);
            merge.value
        } else {
            old_row
        };

        let objects = if json_hash(&Value::Array(old_objects.clone()))
            != json_hash(&Value::Array(new_objects.clone()))
        {
            let mut objects = ObjectHandler {
                filter: &self.filters.objects,
                counts: DiffCounts::default(),
            };
            let merged = diff_sequence(&old_objects, &new_objects, &mut objects)?;
            self.outcome.objects.add(&objects.counts);
            merged
        } else {
            old_objects
        };
        updated.insert("objects".to_string(), Value::Array(objects));
        Ok(Value::Object(updated))
    }

    fn delete_items(&mut self, items: Vec<Value>) -> Result<Vec<Value>> {
        let mut kept = Vec::new();
        for row in items {
            let id = item_id(&row)?;
            println!("Deleted Row ({id}): {}", item_title(&row));
            if let Some(reason) = self.filters.rows.exclusion(&id) {
                println!("  Skipped ({reason})");
                kept.push(row);
                continue;
            }
            print_item(&row);
        }
        Ok(kept)
    }

    fn insert_items(&mut self, items: Vec<Value>) -> Result<Vec<Value>> {
        let mut inserted = Vec::new();
        for row in items {
            let id = item_id(&row)?;
            println!("Inserted Row ({id}): {}", item_title(&row));
            if let Some(reason) = self.filters.rows.exclusion(&id) {
                println!("  Skipped ({reason})");
                continue;
            }
            print_item(&row);
            inserted.push(row);
        }
        Ok(inserted)
    }

    fn summary(&mut self, counts: &DiffCounts) {
        print_counts("", "Rows", counts);
        self.outcome.rows = *counts;
    }
}

struct ObjectHandler<'a> {
    filter: &'a MergeFilter,
    counts: DiffCounts,
}

impl SequenceHandler for ObjectHandler<'_> {
    fn update_item(&mut self, old: Value, new: Value) -> Result<Value> {
        let id = item_id(&old)?;
        println!("  Updated Item ({id}): {}", item_title(&old));
        if let Some(reason) = self.filter.exclusion(&id) {
            println!("    Skipped ({reason})");
            return Ok(old);
        }
        let old_map = into_map(old)?;
        let new_map = into_map(new)?;
        let merge = update_dict(&old_map, &new_map);
        print_table(&merge.table);
        if !merge.changed {
            tracing::debug!(%id, "object matched after ignored keys");
        }
        Ok(Value::Object(merge.value))
    }

    fn delete_items(&mut self, items: Vec<Value>) -> Result<Vec<Value>> {
        let mut kept = Vec::new();
        for object in items {
            let id = item_id(&object)?;
            println!("  Deleted Item ({id}): {}", item_title(&object));
            if let Some(reason) = self.filter.exclusion(&id) {
                println!("    Skipped ({reason})");
                kept.push(object);
                continue;
            }
            print_item(&object);
        }
        Ok(kept)
    }

    fn insert_items(&mut self, items: Vec<Value>) -> Result<Vec<Value>> {
        let mut inserted = Vec::new();
        for object in items {
            let id = item_id(&object)?;
            println!("  Inserted Item ({id}): {}", item_title(&object));
            if let Some(reason) = self.filter.exclusion(&id) {
                println!("    Skipped ({reason})");
                continue;
            }
            print_item(&object);
            inserted.push(object);
        }
        Ok(inserted)
    }

    fn summary(&mut self, counts: &DiffCounts) {
        print_counts("  ", "Objects", counts);
        self.counts = *counts;
    }
}
