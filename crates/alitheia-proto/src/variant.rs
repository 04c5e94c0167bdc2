// SPDX-License-Identifier: Apache-2.0
//! The runtime-tagged local variant and the wire marshaling layer.
//!
//! [`from_wire`] is total: every wire value resolves to a [`Variant`], with
//! anything unknown or corrupt resolving to [`Variant::Absent`] rather than
//! an error. Absent values are uncommon and filtered upstream, so lenience
//! at this boundary is deliberate and is not silent data loss.
//!
//! Tagged records dispatch on their [`RecordType`] tag. Untagged legacy
//! lists fall back to the inherited fixed-priority structural probe:
//! string, boolean, integer, then every record type in [`RecordType::ALL`]
//! order. Record extraction is prefix-based, so a list can genuinely match
//! more than one type; the first match wins (the inherited tie-break, kept
//! exactly) and any later match is flagged through diagnostics.

use crate::record::{
    Developer, Directory, DomainRecord, FileGroup, Metric, MetricType, Plugin, ProjectFile,
    ProjectFileMeasurement, ProjectVersion, ProjectVersionMeasurement, StoredProject,
};
use crate::{RecordType, WireValue};
use tracing::warn;

/// A value whose concrete type is only known at runtime.
///
/// Used in property maps and query result rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    /// No value, or a wire value that matched no known local type.
    Absent,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A UTF-8 string.
    Str(String),
    /// A developer record.
    Developer(Developer),
    /// A directory record.
    Directory(Directory),
    /// A file-group record.
    FileGroup(FileGroup),
    /// A metric record.
    Metric(Metric),
    /// A metric-type record.
    MetricType(MetricType),
    /// A plugin record.
    Plugin(Plugin),
    /// A project-file record.
    ProjectFile(ProjectFile),
    /// A project-file measurement record.
    ProjectFileMeasurement(ProjectFileMeasurement),
    /// A project-version record.
    ProjectVersion(ProjectVersion),
    /// A project-version measurement record.
    ProjectVersionMeasurement(ProjectVersionMeasurement),
    /// A stored-project record.
    StoredProject(StoredProject),
}

impl Variant {
    /// Convert to a wire value. Dispatches on the variant tag; O(1).
    pub fn to_wire(&self) -> WireValue {
        match self {
            Self::Absent => WireValue::Absent,
            Self::Bool(b) => WireValue::Bool(*b),
            Self::Int(n) => WireValue::Int(*n),
            Self::Str(s) => WireValue::Str(s.clone()),
            Self::Developer(r) => r.to_wire(),
            Self::Directory(r) => r.to_wire(),
            Self::FileGroup(r) => r.to_wire(),
            Self::Metric(r) => r.to_wire(),
            Self::MetricType(r) => r.to_wire(),
            Self::Plugin(r) => r.to_wire(),
            Self::ProjectFile(r) => r.to_wire(),
            Self::ProjectFileMeasurement(r) => r.to_wire(),
            Self::ProjectVersion(r) => r.to_wire(),
            Self::ProjectVersionMeasurement(r) => r.to_wire(),
            Self::StoredProject(r) => r.to_wire(),
        }
    }

    /// The variant as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The variant as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is the absent variant.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl From<bool> for Variant {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Variant {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// Marshal a variant to the wire. Alias for [`Variant::to_wire`].
pub fn to_wire(variant: &Variant) -> WireValue {
    variant.to_wire()
}

/// Marshal a wire value to a local variant. Total; see the module docs for
/// the resolution rules.
pub fn from_wire(value: &WireValue) -> Variant {
    match value {
        WireValue::Absent | WireValue::Map(_) => Variant::Absent,
        WireValue::Str(s) => Variant::Str(s.clone()),
        WireValue::Bool(b) => Variant::Bool(*b),
        WireValue::Int(n) => Variant::Int(*n),
        WireValue::Record(r) => match decode_record_as(r.tag(), r.fields()) {
            Some(v) => v,
            None => {
                warn!(tag = r.tag().as_str(), "corrupt tagged record, marshaling as absent");
                Variant::Absent
            }
        },
        WireValue::List(items) => probe_legacy(items),
    }
}

/// Decode a field list as a specific record type.
fn decode_record_as(tag: RecordType, fields: &[WireValue]) -> Option<Variant> {
    match tag {
        RecordType::Developer => Developer::from_fields(fields).map(Variant::Developer),
        RecordType::Directory => Directory::from_fields(fields).map(Variant::Directory),
        RecordType::FileGroup => FileGroup::from_fields(fields).map(Variant::FileGroup),
        RecordType::Metric => Metric::from_fields(fields).map(Variant::Metric),
        RecordType::MetricType => MetricType::from_fields(fields).map(Variant::MetricType),
        RecordType::Plugin => Plugin::from_fields(fields).map(Variant::Plugin),
        RecordType::ProjectFile => ProjectFile::from_fields(fields).map(Variant::ProjectFile),
        RecordType::ProjectFileMeasurement => {
            ProjectFileMeasurement::from_fields(fields).map(Variant::ProjectFileMeasurement)
        }
        RecordType::ProjectVersion => {
            ProjectVersion::from_fields(fields).map(Variant::ProjectVersion)
        }
        RecordType::ProjectVersionMeasurement => {
            ProjectVersionMeasurement::from_fields(fields).map(Variant::ProjectVersionMeasurement)
        }
        RecordType::StoredProject => StoredProject::from_fields(fields).map(Variant::StoredProject),
    }
}

/// Structural probe for untagged legacy field lists.
///
/// Tries every record type in [`RecordType::ALL`] order and returns the
/// first match. The order is the inherited tie-break and must not change;
/// a list that also matches a later type is flagged but still resolves to
/// the earlier one.
fn probe_legacy(items: &[WireValue]) -> Variant {
    let mut hit: Option<(RecordType, Variant)> = None;
    for tag in RecordType::ALL {
        if let Some(v) = decode_record_as(tag, items) {
            match hit {
                None => hit = Some((tag, v)),
                Some((first, _)) => {
                    warn!(
                        first = first.as_str(),
                        also = tag.as_str(),
                        "ambiguous untagged record, keeping the earlier type"
                    );
                    break;
                }
            }
        }
    }
    hit.map_or(Variant::Absent, |(_, v)| v)
}
