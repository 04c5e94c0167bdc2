// SPDX-License-Identifier: Apache-2.0
//! Wire value model and marshaling for the Alitheia client runtime.
//!
//! The remote core only understands an untyped, self-describing value and
//! string-named calls. This crate owns the closed set of values that cross
//! that boundary ([`WireValue`]), the typed domain records built on top of
//! it ([`record`]), the runtime-tagged [`Variant`] used where a value's
//! concrete type is only known at runtime, and the ordered property-map
//! codec used by query-style calls ([`PropertyMap`]).
//!
//! Conversions never mutate in place: a wire value's tag is fixed at
//! construction and every conversion produces a new value.

pub mod propmap;
pub mod record;
pub mod variant;

pub use propmap::{decode_row, MapEntry, PropertyMap};
pub use record::{
    Developer, Directory, DomainRecord, FileGroup, Metric, MetricType, MetricTypeKind, Plugin,
    ProjectFile, ProjectFileMeasurement, ProjectVersion, ProjectVersionMeasurement, StoredProject,
};
pub use variant::Variant;

use serde::{Deserialize, Serialize};

/// Type tag of a domain record on the wire.
///
/// The enumeration order is a wire contract: the legacy structural probe in
/// [`variant::from_wire`] tries record types in exactly this order and the
/// first match wins. Do not reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// A developer / committer identity.
    Developer,
    /// A directory within a project's tree.
    Directory,
    /// A named group of project files.
    FileGroup,
    /// A metric installed in the remote plugin registry.
    Metric,
    /// The activation category of a metric.
    MetricType,
    /// An installed analysis plugin.
    Plugin,
    /// A file at a specific project version.
    ProjectFile,
    /// A measurement bound to a project file.
    ProjectFileMeasurement,
    /// A revision of a stored project.
    ProjectVersion,
    /// A measurement bound to a project version.
    ProjectVersionMeasurement,
    /// A project tracked by the remote core.
    StoredProject,
}

impl RecordType {
    /// Every record type, in legacy probe priority order.
    pub const ALL: [Self; 11] = [
        Self::Developer,
        Self::Directory,
        Self::FileGroup,
        Self::Metric,
        Self::MetricType,
        Self::Plugin,
        Self::ProjectFile,
        Self::ProjectFileMeasurement,
        Self::ProjectVersion,
        Self::ProjectVersionMeasurement,
        Self::StoredProject,
    ];

    /// Stable name of the type as used in remote call arguments.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Developer => "Developer",
            Self::Directory => "Directory",
            Self::FileGroup => "FileGroup",
            Self::Metric => "Metric",
            Self::MetricType => "MetricType",
            Self::Plugin => "Plugin",
            Self::ProjectFile => "ProjectFile",
            Self::ProjectFileMeasurement => "ProjectFileMeasurement",
            Self::ProjectVersion => "ProjectVersion",
            Self::ProjectVersionMeasurement => "ProjectVersionMeasurement",
            Self::StoredProject => "StoredProject",
        }
    }
}

/// A tagged record as seen by the transport: a [`RecordType`] plus an
/// ordered field list. Field order is the wire layout contract of the
/// record type; see the [`record`] module.
///
/// The tag and fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    tag: RecordType,
    fields: Vec<WireValue>,
}

impl WireRecord {
    /// Build a record from a tag and its ordered fields.
    pub fn new(tag: RecordType, fields: Vec<WireValue>) -> Self {
        Self { tag, fields }
    }

    /// The record's type tag.
    pub fn tag(&self) -> RecordType {
        self.tag
    }

    /// The record's ordered fields.
    pub fn fields(&self) -> &[WireValue] {
        &self.fields
    }
}

/// The untyped, self-describing value exchanged with the transport.
///
/// `Absent`, `Bool`, `Int`, `Str` and `Record` form the closed marshaling
/// domain. `List` and `Map` are transport aggregates (query rows, property
/// maps) carried alongside the marshaling domain the way the original
/// middleware carried sequence types next to its any-value; they have no
/// [`Variant`] counterpart and marshal to [`Variant::Absent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    /// No value. Also what a failed marshal resolves to.
    Absent,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A UTF-8 string.
    Str(String),
    /// A tagged domain record.
    Record(WireRecord),
    /// An ordered sequence; also the legacy (untagged) record encoding.
    List(Vec<WireValue>),
    /// An ordered key/value sequence, as produced by the property-map codec.
    Map(Vec<MapEntry>),
}

impl WireValue {
    /// The value as a bool, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a tagged record, if it is one.
    pub fn as_record(&self) -> Option<&WireRecord> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// The value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[WireValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether this is the absent value.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl From<bool> for WireValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for WireValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for WireValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for WireValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn record_tag_is_fixed_at_construction() {
        let r = WireRecord::new(RecordType::Directory, vec![WireValue::Int(1)]);
        assert_eq!(r.tag(), RecordType::Directory);
        assert_eq!(r.fields(), &[WireValue::Int(1)]);
    }

    #[test]
    fn probe_order_matches_wire_contract() {
        // The legacy probe order is part of the wire contract; pin it.
        let names: Vec<&str> = RecordType::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(
            names,
            [
                "Developer",
                "Directory",
                "FileGroup",
                "Metric",
                "MetricType",
                "Plugin",
                "ProjectFile",
                "ProjectFileMeasurement",
                "ProjectVersion",
                "ProjectVersionMeasurement",
                "StoredProject",
            ]
        );
    }

    #[test]
    fn wire_values_survive_cbor_framing() {
        // The transport frames wire values with serde; make sure a nested
        // value survives a CBOR round trip unchanged.
        let value = WireValue::List(vec![
            WireValue::Record(WireRecord::new(
                RecordType::Plugin,
                vec![
                    WireValue::Int(7),
                    WireValue::from("wc"),
                    WireValue::from("20080101T101010"),
                ],
            )),
            WireValue::Absent,
            WireValue::Bool(true),
        ]);
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&value, &mut bytes).unwrap();
        let back: WireValue = ciborium::de::from_reader(bytes.as_slice()).unwrap();
        assert_eq!(back, value);
    }
}
