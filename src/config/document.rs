//! Stage types for the model merge pipeline.
//!
//! A model moves through `BaseDocument` (as parsed) to `MergeDocument`
//! (skeleton ensured, fragments being folded in) to `MergedDocument` (empty
//! sections removed, ready for validation). Fragments enter as
//! [`IncludeFragment`] or [`PartialFragment`]. Merging is done by the total
//! functions [`deep_merge`] and [`dedupe_fields`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{ModelError, ModelResult};

/// Top-level sections that hold arrays of descriptors.
pub const SECTION_KEYS: [&str; 4] = ["menu", "collections", "singles", "dynamics"];

/// Sections whose entries may carry a `_mergePartial` reference.
pub const PARTIAL_SECTIONS: [&str; 3] = ["collections", "singles", "dynamics"];

/// Marker key naming the partial an entry is merged with.
pub const MERGE_PARTIAL_KEY: &str = "_mergePartial";

/// A base descriptor exactly as parsed from disk.
#[derive(Debug, Clone)]
pub struct BaseDocument {
    path: PathBuf,
    root: Map<String, Value>,
}

impl BaseDocument {
    /// Wraps a parsed base file. The top level must be a mapping; an empty
    /// file is accepted as an empty mapping.
    pub fn from_value(path: &Path, value: Value) -> ModelResult<Self> {
        let root = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(ModelError::NotAMapping {
                    path: path.to_path_buf(),
                })
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            root,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensures every section exists as an array and opens the document for merging.
    pub fn into_skeleton(self) -> MergeDocument {
        let mut root = self.root;
        for key in SECTION_KEYS {
            let is_array = matches!(root.get(key), Some(Value::Array(_)));
            if !is_array {
                if let Some(existing) = root.remove(key) {
                    if !existing.is_null() {
                        tracing::warn!(
                            path = %self.path.display(),
                            section = key,
                            "Section is not a list, replacing it with an empty list"
                        );
                    }
                }
                root.insert(key.to_string(), Value::Array(Vec::new()));
            }
        }
        MergeDocument { root }
    }
}

/// A fragment merged under the top-level key named by its file stem.
#[derive(Debug, Clone)]
pub struct IncludeFragment {
    pub key: String,
    pub path: PathBuf,
    pub value: Value,
}

impl IncludeFragment {
    pub fn new(path: &Path, value: Value) -> Option<Self> {
        let key = path.file_stem()?.to_str()?.to_string();
        Some(Self {
            key,
            path: path.to_path_buf(),
            value,
        })
    }
}

/// A parsed partial, the defaults side of a partial merge.
#[derive(Debug, Clone)]
pub struct PartialFragment {
    pub path: PathBuf,
    pub root: Map<String, Value>,
}

impl PartialFragment {
    pub fn from_value(path: &Path, value: Value) -> ModelResult<Self> {
        match value {
            Value::Object(root) => Ok(Self {
                path: path.to_path_buf(),
                root,
            }),
            Value::Null => Ok(Self {
                path: path.to_path_buf(),
                root: Map::new(),
            }),
            _ => Err(ModelError::NotAMapping {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Merges `entry` over this partial. Fields are matched by key: an entry
    /// field replaces the partial's field of the same key whole, in the
    /// partial's position, and new entry fields are appended. The
    /// `_mergePartial` marker is removed from the result.
    pub fn apply_to(self, entry: &Map<String, Value>) -> Map<String, Value> {
        let mut root = self.root;
        let mut entry = entry.clone();
        let partial_fields = take_fields(&mut root);
        let entry_fields = take_fields(&mut entry);

        let mut merged = merge_maps(root, entry);
        if partial_fields.is_some() || entry_fields.is_some() {
            let fields = replace_fields(
                partial_fields.unwrap_or_default(),
                entry_fields.unwrap_or_default(),
            );
            merged.insert("fields".to_string(), Value::Array(dedupe_fields(fields)));
        }
        merged.remove(MERGE_PARTIAL_KEY);
        merged
    }
}

fn take_fields(map: &mut Map<String, Value>) -> Option<Vec<Value>> {
    match map.remove("fields") {
        Some(Value::Array(fields)) => Some(fields),
        Some(other) => {
            map.insert("fields".to_string(), other);
            None
        }
        None => None,
    }
}

fn replace_fields(defaults: Vec<Value>, overrides: Vec<Value>) -> Vec<Value> {
    let mut fields = defaults;
    for field in overrides {
        let position = item_key(&field)
            .and_then(|key| fields.iter().position(|existing| item_key(existing) == Some(key)));
        match position {
            Some(index) => fields[index] = field,
            None => fields.push(field),
        }
    }
    fields
}

/// A model while includes and partials are folded in.
#[derive(Debug, Clone)]
pub struct MergeDocument {
    root: Map<String, Value>,
}

impl MergeDocument {
    /// Deep-merges an include under its key. The document's current value wins
    /// over the include on conflicting leaves.
    pub fn merge_include(&mut self, include: IncludeFragment) {
        let current = self.root.remove(&include.key).unwrap_or(Value::Null);
        let merged = deep_merge(include.value, current);
        self.root.insert(include.key, merged);
    }

    /// Appends a fragment's content to a section. Lists are appended
    /// element-wise, anything else is pushed as one entry.
    pub fn append_to_section(&mut self, section: &str, value: Value) {
        let items = match value {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };

        match self.root.get_mut(section) {
            Some(Value::Array(existing)) => existing.extend(items),
            _ => {
                self.root.insert(section.to_string(), Value::Array(items));
            }
        }
    }

    /// Takes the entries of a section out for partial resolution.
    pub fn take_section(&mut self, section: &str) -> Vec<Value> {
        match self.root.get_mut(section) {
            Some(Value::Array(items)) => std::mem::take(items),
            _ => Vec::new(),
        }
    }

    pub fn put_section(&mut self, section: &str, items: Vec<Value>) {
        self.root.insert(section.to_string(), Value::Array(items));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Removes empty sections and closes the document for validation.
    pub fn finish(self) -> MergedDocument {
        let mut root = self.root;
        for key in SECTION_KEYS {
            let empty = matches!(root.get(key), Some(Value::Array(items)) if items.is_empty());
            if empty {
                root.remove(key);
            }
        }
        MergedDocument {
            value: Value::Object(root),
        }
    }
}

/// A fully merged model awaiting validation.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedDocument {
    value: Value,
}

impl MergedDocument {
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Merges `overrides` onto `defaults`.
///
/// Objects merge key by key. Scalars take the override unless it is `null`.
/// Lists of keyed objects merge by `key` in the defaults' order with new
/// override entries appended. Other lists concatenate, defaults first.
pub fn deep_merge(defaults: Value, overrides: Value) -> Value {
    match (defaults, overrides) {
        (defaults, Value::Null) => defaults,
        (Value::Object(base), Value::Object(over)) => Value::Object(merge_maps(base, over)),
        (Value::Array(base), Value::Array(over)) => {
            if is_keyed_list(&base) && is_keyed_list(&over) {
                merge_keyed_lists(base, over)
            } else {
                let mut combined = base;
                combined.extend(over);
                Value::Array(combined)
            }
        }
        (_, overrides) => overrides,
    }
}

fn merge_maps(mut base: Map<String, Value>, over: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in over {
        match base.get_mut(&key) {
            Some(existing) => *existing = deep_merge(existing.take(), value),
            None => {
                base.insert(key, value);
            }
        }
    }
    base
}

fn item_key(item: &Value) -> Option<&str> {
    item.get("key").and_then(Value::as_str)
}

fn is_keyed_list(items: &[Value]) -> bool {
    items.iter().all(|item| item_key(item).is_some())
}

fn merge_keyed_lists(base: Vec<Value>, over: Vec<Value>) -> Value {
    let mut merged = base;
    for item in over {
        let position = item_key(&item)
            .and_then(|key| merged.iter().position(|existing| item_key(existing) == Some(key)));
        match position {
            Some(index) => {
                let existing = std::mem::take(&mut merged[index]);
                merged[index] = deep_merge(existing, item);
            }
            None => merged.push(item),
        }
    }
    Value::Array(merged)
}

/// Deduplicates a field list by `key`, keeping the last occurrence of each key
/// while preserving the surviving fields' relative order.
///
/// Implemented as reverse, keep first by key, reverse. Fields without a string
/// key are left alone so the validator can report them.
pub fn dedupe_fields(fields: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut kept: Vec<Value> = fields
        .into_iter()
        .rev()
        .filter(|field| match item_key(field) {
            Some(key) => seen.insert(key.to_string()),
            None => true,
        })
        .collect();
    kept.reverse();
    kept
}
