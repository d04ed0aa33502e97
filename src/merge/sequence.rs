use anyhow::Result;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::matcher::{opcodes, OpTag};
use crate::project::item_id;
use crate::util::json_hash;

/// Tally reported once a sequence has been merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffCounts {
    /// Number of equal blocks, not items.
    pub equal: usize,
    pub replace: usize,
    pub delete: usize,
    pub insert: usize,
}

impl DiffCounts {
    pub fn add(&mut self, other: &DiffCounts) {
        self.equal += other.equal;
        self.replace += other.replace;
        self.delete += other.delete;
        self.insert += other.insert;
    }
}

/// Decides what happens to items the diff marks as changed.
pub trait SequenceHandler {
    fn update_item(&mut self, old: Value, new: Value) -> Result<Value>;

    /// Returns the items that must be kept despite the deletion.
    fn delete_items(&mut self, items: Vec<Value>) -> Result<Vec<Value>>;

    /// Returns the items that are actually inserted.
    fn insert_items(&mut self, items: Vec<Value>) -> Result<Vec<Value>>;

    fn summary(&mut self, counts: &DiffCounts);
}

/// Merge `seq_b` into `seq_a`, matching items by `(id, content hash)`.
pub fn diff_sequence<H: SequenceHandler>(
    seq_a: &[Value],
    seq_b: &[Value],
    handler: &mut H,
) -> Result<Vec<Value>> {
    let keys_a = hash_items(seq_a)?;
    let keys_b = hash_items(seq_b)?;

    let mut counts = DiffCounts::default();
    let mut merged = Vec::with_capacity(seq_b.len());
    for op in opcodes(&keys_a, &keys_b) {
        let old_items = &seq_a[op.a_start..op.a_end];
        let new_items = &seq_b[op.b_start..op.b_end];
        match op.tag {
            OpTag::Equal => {
                merged.extend_from_slice(old_items);
                counts.equal += 1;
            }
            OpTag::Replace if old_items.len() == new_items.len() => {
                for (old, new) in old_items.iter().zip(new_items) {
                    merged.push(handler.update_item(old.clone(), new.clone())?);
                }
                counts.replace += old_items.len();
            }
            OpTag::Replace => {
                let old_ids = &keys_a[op.a_start..op.a_end];
                let new_ids = &keys_b[op.b_start..op.b_end];
                let new_id_set: HashSet<&str> =
                    new_ids.iter().map(|(id, _)| id.as_str()).collect();
                let updated_ids: HashSet<&str> = old_ids
                    .iter()
                    .map(|(id, _)| id.as_str())
                    .filter(|id| new_id_set.contains(id))
                    .collect();
                let old_by_id: HashMap<&str, &Value> = old_ids
                    .iter()
                    .map(|(id, _)| id.as_str())
                    .zip(old_items)
                    .collect();

                for ((id, _), old) in old_ids.iter().zip(old_items) {
                    if updated_ids.contains(id.as_str()) {
                        continue;
                    }
                    let kept = handler.delete_items(vec![old.clone()])?;
                    counts.delete += 1usize.saturating_sub(kept.len());
                    merged.extend(kept);
                }
                for ((id, _), new) in new_ids.iter().zip(new_items) {
                    match old_by_id.get(id.as_str()) {
                        Some(old) if updated_ids.contains(id.as_str()) => {
                            merged.push(handler.update_item((*old).clone(), new.clone())?);
                            counts.replace += 1;
                        }
                        _ => {
                            let inserted = handler.insert_items(vec![new.clone()])?;
                            counts.insert += inserted.len();
                            merged.extend(inserted);
                        }
                    }
                }
            }
            OpTag::Delete => {
                let kept = handler.delete_items(old_items.to_vec())?;
                counts.delete += old_items.len().saturating_sub(kept.len());
                merged.extend(kept);
            }
            OpTag::Insert => {
                let inserted = handler.insert_items(new_items.to_vec())?;
                counts.insert += inserted.len();
                merged.extend(inserted);
            }
        }
    }

    handler.summary(&counts);
    Ok(merged)
}

fn hash_items(items: &[Value]) -> Result<Vec<(String, String)>> {
    items
        .iter()
        .map(|item| Ok((item_id(item)?, json_hash(item))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Accepts every change and tags updated items.
    #[derive(Default)]
    struct Recorder {
        deleted: Vec<String>,
        keep_on_delete: Vec<String>,
        counts: Option<DiffCounts>,
    }

    impl SequenceHandler for Recorder {
        fn update_item(&mut self, _old: Value, mut new: Value) -> Result<Value> {
            new["updated"] = json!(true);
            Ok(new)
        }

        fn delete_items(&mut self, items: Vec<Value>) -> Result<Vec<Value>> {
            let mut kept = Vec::new();
            for item in items {
                let id = item_id(&item)?;
                if self.keep_on_delete.contains(&id) {
                    kept.push(item);
                } else {
                    self.deleted.push(id);
                }
            }
            Ok(kept)
        }

        fn insert_items(&mut self, items: Vec<Value>) -> Result<Vec<Value>> {
            Ok(items)
        }

        fn summary(&mut self, counts: &DiffCounts) {
            self.counts = Some(*counts);
        }
    }

    fn ids(items: &[Value]) -> Vec<String> {
        items.iter().map(|item| item_id(item).unwrap()).collect()
    }

    #[test]
    fn equal_sequences_pass_through() {
        let seq = vec![json!({"id": "a", "v": 1}), json!({"id": "b", "v": 2})];
        let mut recorder = Recorder::default();
        let merged = diff_sequence(&seq, &seq, &mut recorder).unwrap();
        assert_eq!(merged, seq);
        assert_eq!(
            recorder.counts,
            Some(DiffCounts {
                equal: 1,
                ..DiffCounts::default()
            })
        );
    }

    #[test]
    fn uneven_replace_updates_shared_ids_and_deletes_first() {
        let old = vec![
            json!({"id": "a", "v": 1}),
            json!({"id": "b", "v": 1}),
            json!({"id": "c", "v": 1}),
        ];
        let new = vec![
            json!({"id": "a", "v": 2}),
            json!({"id": "c", "v": 1}),
            json!({"id": "d", "v": 1}),
        ];
        let mut recorder = Recorder::default();
        let merged = diff_sequence(&old, &new, &mut recorder).unwrap();
        assert_eq!(ids(&merged), vec!["a", "c", "d"]);
        assert_eq!(merged[0]["updated"], true);
        assert_eq!(merged[0]["v"], 2);
        assert_eq!(recorder.deleted, vec!["b"]);
        assert_eq!(
            recorder.counts,
            Some(DiffCounts {
                equal: 1,
                replace: 1,
                delete: 1,
                insert: 1,
            })
        );
    }

    #[test]
    fn delete_handler_can_keep_items() {
        let old = vec![json!({"id": "a"}), json!({"id": "b"}), json!({"id": "c"})];
        let new = vec![json!({"id": "a"})];
        let mut recorder = Recorder {
            keep_on_delete: vec!["c".to_string()],
            ..Recorder::default()
        };
        let merged = diff_sequence(&old, &new, &mut recorder).unwrap();
        assert_eq!(ids(&merged), vec!["a", "c"]);
        assert_eq!(recorder.counts.map(|counts| counts.delete), Some(1));
    }

    #[test]
    fn items_without_id_are_rejected() {
        let old = vec![json!({"title": "no id"})];
        let mut recorder = Recorder::default();
        assert!(diff_sequence(&old, &[], &mut recorder).is_err());
    }
}
