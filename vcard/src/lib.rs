// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Parse and represent vCard 3.0 documents.
//!
//! The model is deliberately loose: a card is an ordered map from lowercase
//! field names to entries, where each entry carries a scalar or compound
//! value plus parameter metadata grouped by parameter class (`type`,
//! `encoding`, `x-service-type`, ...). The sync engine edits this structure
//! through a declarative field table and regenerates the document; see
//! [`format`] for the canonical serialization that makes parse∘generate
//! byte-idempotent.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::pedantic
)]
// Allow certain clippy lints that are too restrictive for this crate
#![allow(clippy::similar_names, clippy::single_match_else)]

mod format;
mod parse;

pub use crate::format::format;
pub use crate::parse::parse;

use std::collections::BTreeMap;
use std::fmt;

/// Errors produced by the vCard codec.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum VCardError {
    /// The document does not start with `BEGIN:VCARD`.
    #[error("missing BEGIN:VCARD")]
    MissingBegin,

    /// The document does not end with `END:VCARD`.
    #[error("missing END:VCARD")]
    MissingEnd,

    /// A content line has no `:` separator.
    #[error("malformed content line: {0:?}")]
    MalformedLine(String),
}

/// A property value: a plain scalar or a compound (`;`-separated) list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Scalar text value.
    Text(String),
    /// Compound value, one element per component.
    List(Vec<String>),
}

impl Value {
    /// Empty scalar value.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Text(String::new())
    }

    /// Returns the component at `index`, treating a scalar as a
    /// single-component compound. Out-of-range components read as `""`.
    #[must_use]
    pub fn component(&self, index: usize) -> &str {
        match self {
            Self::Text(s) if index == 0 => s,
            Self::Text(_) => "",
            Self::List(items) => items.get(index).map_or("", String::as_str),
        }
    }

    /// Writes the component at `index`, promoting a scalar to a compound
    /// and padding with empty components as needed.
    pub fn set_component(&mut self, index: usize, value: &str) {
        if let Self::Text(s) = self {
            let first = std::mem::take(s);
            *self = Self::List(vec![first]);
        }
        if let Self::List(items) = self {
            while items.len() <= index {
                items.push(String::new());
            }
            if let Some(slot) = items.get_mut(index) {
                slot.clear();
                slot.push_str(value);
            }
        }
    }

    /// Renders the value as a single string; compound components are
    /// joined with a space.
    #[must_use]
    pub fn flatten(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::List(items) => items.join(" "),
        }
    }

    /// True when the scalar is empty or every compound component is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.iter().all(String::is_empty),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

/// One entry of a (possibly repeated) vCard field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    /// Optional property group prefix (`item1.EMAIL:...`).
    pub group: Option<String>,
    /// The value of this entry.
    pub value: Value,
    /// Parameter metadata, keyed by lowercase parameter class. Values of
    /// the `type` class are normalized to uppercase.
    pub meta: BTreeMap<String, Vec<String>>,
}

impl Default for Value {
    fn default() -> Self {
        Self::empty()
    }
}

impl Entry {
    /// Creates an entry with a plain value and no metadata.
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            group: None,
            value: value.into(),
            meta: BTreeMap::new(),
        }
    }

    /// Tags of the given parameter class, empty when the class is absent.
    #[must_use]
    pub fn tags(&self, class: &str) -> &[String] {
        self.meta.get(class).map_or(&[], Vec::as_slice)
    }

    /// True when the given class contains `tag` (case-sensitive; callers
    /// pass uppercase tags since parsing normalizes them).
    #[must_use]
    pub fn has_tag(&self, class: &str, tag: &str) -> bool {
        self.tags(class).iter().any(|t| t == tag)
    }

    /// Replaces the tags of a parameter class.
    pub fn set_tags(&mut self, class: &str, tags: Vec<String>) {
        if tags.is_empty() {
            self.meta.remove(class);
        } else {
            self.meta.insert(class.to_string(), tags);
        }
    }
}

/// A parsed vCard document.
///
/// Fields keep their first-appearance order so a regenerated document is
/// deterministic; entry order within a field is the document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VCard {
    fields: Vec<(String, Vec<Entry>)>,
}

impl VCard {
    /// Creates an empty card.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries of a field, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[Entry]> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entries)| entries.as_slice())
    }

    /// Number of entries of a field (0 when absent).
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.get(name).map_or(0, <[Entry]>::len)
    }

    /// First entry of a field, if any.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&Entry> {
        self.get(name).and_then(<[Entry]>::first)
    }

    /// Entry at `index` of a field, if present.
    #[must_use]
    pub fn entry(&self, name: &str, index: usize) -> Option<&Entry> {
        self.get(name).and_then(|entries| entries.get(index))
    }

    /// Mutable entry at `index` of a field, if present.
    pub fn entry_mut(&mut self, name: &str, index: usize) -> Option<&mut Entry> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .and_then(|(_, entries)| entries.get_mut(index))
    }

    /// Mutable entry list of a field, creating the field when absent.
    pub fn entries_mut(&mut self, name: &str) -> &mut Vec<Entry> {
        let pos = match self.fields.iter().position(|(n, _)| n == name) {
            Some(pos) => pos,
            None => {
                self.fields.push((name.to_string(), Vec::new()));
                self.fields.len() - 1
            }
        };
        &mut self.fields[pos].1
    }

    /// Appends an entry to a field, returning its index.
    pub fn push(&mut self, name: &str, entry: Entry) -> usize {
        let entries = self.entries_mut(name);
        entries.push(entry);
        entries.len() - 1
    }

    /// Replaces the field with a single plain entry.
    pub fn set_single(&mut self, name: &str, value: impl Into<Value>) {
        let entries = self.entries_mut(name);
        entries.clear();
        entries.push(Entry::new(value));
    }

    /// Removes a field entirely.
    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|(n, _)| n != name);
    }

    /// True when the field has at least one entry.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.count(name) > 0
    }

    /// Iterates fields in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Entry])> {
        self.fields
            .iter()
            .map(|(n, entries)| (n.as_str(), entries.as_slice()))
    }
}

impl fmt::Display for VCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format(self))
    }
}
