// SPDX-License-Identifier: Apache-2.0
//! Ordered property maps and the codec used by query-style remote calls.
//!
//! Object lookups AND every property together, so order does not change
//! lookup semantics, but encode order must still be deterministic for
//! reproducible remote logging and caching. Parameterized queries bind by
//! name, while their result rows are strictly positional; decoding a row
//! therefore preserves column order exactly.

use crate::variant::{self, Variant};
use crate::WireValue;
use serde::{Deserialize, Serialize};

/// One encoded property: a key and its wire value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEntry {
    /// Property key.
    pub key: String,
    /// Encoded property value.
    pub value: WireValue,
}

/// An insertion-ordered mapping from string keys to local variants.
///
/// Re-inserting an existing key replaces its value but keeps its original
/// position, so the encoded order is stable across updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    entries: Vec<(String, Variant)>,
}

impl PropertyMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a property, preserving insertion order.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Variant>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Look up a property by key.
    pub fn get(&self, key: &str) -> Option<&Variant> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Iterate properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variant)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode to an ordered sequence of key/wire-value entries.
    pub fn encode(&self) -> Vec<MapEntry> {
        self.entries
            .iter()
            .map(|(k, v)| MapEntry {
                key: k.clone(),
                value: v.to_wire(),
            })
            .collect()
    }

    /// Encode to a single wire value (the transport map aggregate).
    pub fn to_wire(&self) -> WireValue {
        WireValue::Map(self.encode())
    }

    /// Decode an ordered entry sequence back into a map.
    pub fn decode(entries: &[MapEntry]) -> Self {
        let mut map = Self::new();
        for entry in entries {
            map.insert(entry.key.clone(), variant::from_wire(&entry.value));
        }
        map
    }
}

impl<K: Into<String>, V: Into<Variant>> FromIterator<(K, V)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Decode a positional result row, marshaling each column in order.
pub fn decode_row(row: &[WireValue]) -> Vec<Variant> {
    row.iter().map(variant::from_wire).collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::record::tests::sample_project;
    use crate::DomainRecord;

    #[test]
    fn encode_preserves_insertion_order() {
        let mut map = PropertyMap::new();
        map.insert("name", "svn")
            .insert("version", 7_i64)
            .insert("status", "ADDED");
        let encoded = map.encode();
        let keys: Vec<&str> = encoded.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["name", "version", "status"]);

        let decoded = PropertyMap::decode(&encoded);
        let keys: Vec<&str> = decoded.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["name", "version", "status"]);
        assert_eq!(decoded, map);
    }

    #[test]
    fn reinsert_keeps_the_original_position() {
        let mut map = PropertyMap::new();
        map.insert("name", "svn").insert("version", 7_i64);
        map.insert("name", "git");
        let encoded = map.encode();
        let keys: Vec<&str> = encoded.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["name", "version"]);
        assert_eq!(map.get("name"), Some(&Variant::Str("git".into())));
    }

    #[test]
    fn record_values_encode_as_tagged_records() {
        let project = sample_project();
        let mut map = PropertyMap::new();
        map.insert("project", Variant::StoredProject(project.clone()));
        let encoded = map.encode();
        assert_eq!(encoded.len(), 1);
        assert_eq!(encoded[0].value, project.to_wire());
    }

    #[test]
    fn result_rows_decode_positionally() {
        let row = vec![
            WireValue::Str("svn".into()),
            WireValue::Int(42),
            sample_project().to_wire(),
            WireValue::Absent,
        ];
        let decoded = decode_row(&row);
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0], Variant::Str("svn".into()));
        assert_eq!(decoded[1], Variant::Int(42));
        assert_eq!(decoded[2], Variant::StoredProject(sample_project()));
        assert_eq!(decoded[3], Variant::Absent);
    }
}
