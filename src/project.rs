//! Project file access and row-object editing helpers.
//!
//! Projects are kept as `serde_json::Value` with key order preserved so that
//! a load/save cycle only changes what an edit touched.
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::cli::ObjectsArgs;
use crate::staging::write_json;

pub fn load_project(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(anyhow!("project file missing: {}", path.display()));
    }
    tracing::info!(path = %path.display(), "loading project");
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse project {}", path.display()))
}

pub fn save_project(path: &Path, project: &Value) -> Result<()> {
    tracing::info!(path = %path.display(), "saving project");
    write_json(path, project)
}

/// Id of a row or object. Non-string ids are compared by their JSON text.
pub fn item_id(item: &Value) -> Result<String> {
    match item.get("id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(anyhow!("item has no id")),
    }
}

pub fn item_title(item: &Value) -> &str {
    item.get("title").and_then(Value::as_str).unwrap_or("")
}

pub fn project_rows_mut(project: &mut Value) -> Result<&mut Vec<Value>> {
    project
        .get_mut("rows")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| anyhow!("project has no rows array"))
}

fn row_objects(row: &Value) -> Result<&Vec<Value>> {
    row.get("objects")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("row has no objects array"))
}

fn row_objects_mut(row: &mut Value) -> Result<&mut Vec<Value>> {
    row.get_mut("objects")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| anyhow!("row has no objects array"))
}

/// Which objects of a row an edit applies to.
#[derive(Debug, Clone, Default)]
pub struct ObjectSelection {
    pub ids: Vec<String>,
    /// Inclusive index ranges written as `start-end`.
    pub ranges: Vec<String>,
    pub all: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPosition {
    AfterIndex(usize),
    /// At the index of the named object, ahead of it.
    AtObject(String),
    End,
}

pub fn parse_range(range: &str) -> Result<(usize, usize)> {
    let (start, end) = range
        .split_once('-')
        .ok_or_else(|| anyhow!("object range {range:?} must look like start-end"))?;
    let start: usize = start
        .trim()
        .parse()
        .with_context(|| format!("object range {range:?}: bad start"))?;
    let end: usize = end
        .trim()
        .parse()
        .with_context(|| format!("object range {range:?}: bad end"))?;
    if end < start {
        return Err(anyhow!("object range {range:?} ends before it starts"));
    }
    Ok((start, end))
}

/// Clamp an inclusive range to a slice of `len` items.
fn clamp_range(start: usize, end: usize, len: usize) -> (usize, usize) {
    (start.min(len), end.saturating_add(1).min(len))
}

pub fn copy_objects_from_row(row: &Value, selection: &ObjectSelection) -> Result<Vec<Value>> {
    let objects = row_objects(row)?;
    if selection.all {
        return Ok(objects.clone());
    }
    let mut copied = Vec::new();
    if !selection.ids.is_empty() {
        for object in objects {
            if selection.ids.contains(&item_id(object)?) {
                copied.push(object.clone());
            }
        }
    }
    for range in &selection.ranges {
        let (start, end) = parse_range(range)?;
        let (start, end) = clamp_range(start, end, objects.len());
        copied.extend_from_slice(&objects[start..end]);
    }
    Ok(copied)
}

pub fn remove_objects_from_row(row: &mut Value, selection: &ObjectSelection) -> Result<()> {
    let objects = row_objects_mut(row)?;
    if selection.all {
        objects.clear();
    }

    // Last range first so earlier indices stay valid.
    let mut ranges = selection
        .ranges
        .iter()
        .map(|range| parse_range(range.as_str()))
        .collect::<Result<Vec<_>>>()?;
    ranges.sort_unstable_by(|a, b| b.cmp(a));
    for (start, end) in ranges {
        let (start, end) = clamp_range(start, end, objects.len());
        objects.drain(start..end);
    }

    if !selection.ids.is_empty() {
        let mut kept = Vec::with_capacity(objects.len());
        for object in objects.drain(..) {
            if !selection.ids.contains(&item_id(&object)?) {
                kept.push(object);
            }
        }
        *objects = kept;
    }
    Ok(())
}

pub fn insert_objects_in_row(
    row: &mut Value,
    new_objects: Vec<Value>,
    position: &InsertPosition,
) -> Result<()> {
    let objects = row_objects_mut(row)?;
    let index = match position {
        InsertPosition::AfterIndex(index) => (index + 1).min(objects.len()),
        InsertPosition::AtObject(id) => find_object_index(objects, id)?
            .ok_or_else(|| anyhow!("object {id} not found in row"))?,
        InsertPosition::End => objects.len(),
    };
    objects.splice(index..index, new_objects);
    Ok(())
}

/// `objects` command: copy (or move) selected objects between two rows.
pub fn run_objects(args: &ObjectsArgs) -> Result<()> {
    let mut project = load_project(&args.project_file)?;
    let selection = ObjectSelection {
        ids: args.ids.clone(),
        ranges: args.ranges.clone(),
        all: args.all,
    };
    let position = match (&args.after_index, &args.at_object) {
        (Some(index), _) => InsertPosition::AfterIndex(*index),
        (None, Some(id)) => InsertPosition::AtObject(id.clone()),
        (None, None) => InsertPosition::End,
    };

    let count = transfer_objects(
        project_rows_mut(&mut project)?,
        &args.from_row,
        &args.to_row,
        &selection,
        &position,
        args.move_objects,
    )?;
    let verb = if args.move_objects { "moved" } else { "copied" };
    println!(
        "{verb} {count} objects from row {} to row {}",
        args.from_row, args.to_row
    );

    if args.write {
        save_project(&args.project_file, &project)?;
        println!("wrote {}", args.project_file.display());
    } else {
        println!("dry run; pass --write to save {}", args.project_file.display());
    }
    Ok(())
}

/// Returns how many objects were inserted into the target row.
pub fn transfer_objects(
    rows: &mut [Value],
    from_row: &str,
    to_row: &str,
    selection: &ObjectSelection,
    position: &InsertPosition,
    remove_from_source: bool,
) -> Result<usize> {
    let from = find_row_index(rows, from_row)?;
    let to = find_row_index(rows, to_row)?;
    let objects = copy_objects_from_row(&rows[from], selection)?;
    if objects.is_empty() {
        return Err(anyhow!("no objects selected in row {from_row}"));
    }
    if remove_from_source {
        remove_objects_from_row(&mut rows[from], selection)?;
    }
    let count = objects.len();
    insert_objects_in_row(&mut rows[to], objects, position)?;
    Ok(count)
}

fn find_row_index(rows: &[Value], id: &str) -> Result<usize> {
    for (index, row) in rows.iter().enumerate() {
        if item_id(row)? == id {
            return Ok(index);
        }
    }
    Err(anyhow!("row {id} not found"))
}

fn find_object_index(objects: &[Value], id: &str) -> Result<Option<usize>> {
    for (index, object) in objects.iter().enumerate() {
        if item_id(object)? == id {
            return Ok(Some(index));
        }
    }
    Ok(None)
}
