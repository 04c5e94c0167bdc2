// SPDX-License-Identifier: Apache-2.0
//! Typed domain records and their wire layouts.
//!
//! Each record carries an integer identity (`0` = not yet persisted
//! remotely) and owns its referenced records by value: the remote core is
//! the source of truth, so local copies are snapshots, not live links.
//!
//! The wire layout of a record is its field order in `to_fields` /
//! `from_fields`. Decoding is prefix-based: trailing fields a decoder does
//! not know about are ignored, which is what makes the legacy untagged
//! probe in [`crate::variant`] able to mistake one record for a structural
//! prefix of another (see that module for how this is flagged).

use crate::{RecordType, WireRecord, WireValue};

/// A typed entity with remote identity, convertible to and from the wire.
pub trait DomainRecord: Sized {
    /// Wire type tag of this record.
    const TYPE: RecordType;

    /// Remote identity; `0` means not yet persisted.
    fn id(&self) -> i64;

    /// Ordered wire fields of this record.
    fn to_fields(&self) -> Vec<WireValue>;

    /// Decode from ordered wire fields. Extra trailing fields are ignored.
    fn from_fields(fields: &[WireValue]) -> Option<Self>;

    /// Encode as a tagged wire record.
    fn to_wire(&self) -> WireValue {
        WireValue::Record(WireRecord::new(Self::TYPE, self.to_fields()))
    }

    /// Decode from a wire value.
    ///
    /// A tagged record must carry this record's tag; an untagged list is
    /// decoded structurally. Anything else is `None`.
    fn from_wire(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::Record(r) if r.tag() == Self::TYPE => Self::from_fields(r.fields()),
            WireValue::List(items) => Self::from_fields(items),
            _ => None,
        }
    }
}

fn int_at(fields: &[WireValue], idx: usize) -> Option<i64> {
    fields.get(idx)?.as_int()
}

fn str_at(fields: &[WireValue], idx: usize) -> Option<String> {
    fields.get(idx)?.as_str().map(str::to_owned)
}

fn bool_at(fields: &[WireValue], idx: usize) -> Option<bool> {
    fields.get(idx)?.as_bool()
}

fn record_at<T: DomainRecord>(fields: &[WireValue], idx: usize) -> Option<T> {
    T::from_wire(fields.get(idx)?)
}

/// A project tracked by the remote core.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredProject {
    /// Remote identity.
    pub id: i64,
    /// Project name.
    pub name: String,
    /// Project website URL.
    pub website: String,
    /// Contact address.
    pub contact: String,
    /// Bug tracker URL.
    pub bugs: String,
    /// Source repository URL.
    pub repository: String,
    /// Mailing list address.
    pub mail: String,
}

impl DomainRecord for StoredProject {
    const TYPE: RecordType = RecordType::StoredProject;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_fields(&self) -> Vec<WireValue> {
        vec![
            WireValue::Int(self.id),
            WireValue::Str(self.name.clone()),
            WireValue::Str(self.website.clone()),
            WireValue::Str(self.contact.clone()),
            WireValue::Str(self.bugs.clone()),
            WireValue::Str(self.repository.clone()),
            WireValue::Str(self.mail.clone()),
        ]
    }

    fn from_fields(fields: &[WireValue]) -> Option<Self> {
        Some(Self {
            id: int_at(fields, 0)?,
            name: str_at(fields, 1)?,
            website: str_at(fields, 2)?,
            contact: str_at(fields, 3)?,
            bugs: str_at(fields, 4)?,
            repository: str_at(fields, 5)?,
            mail: str_at(fields, 6)?,
        })
    }
}

/// A developer / committer identity, owned by a project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Developer {
    /// Remote identity.
    pub id: i64,
    /// Full name.
    pub name: String,
    /// E-mail address.
    pub email: String,
    /// Repository username.
    pub username: String,
    /// Snapshot of the owning project.
    pub stored_project: StoredProject,
}

impl DomainRecord for Developer {
    const TYPE: RecordType = RecordType::Developer;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_fields(&self) -> Vec<WireValue> {
        vec![
            WireValue::Int(self.id),
            WireValue::Str(self.name.clone()),
            WireValue::Str(self.email.clone()),
            WireValue::Str(self.username.clone()),
            self.stored_project.to_wire(),
        ]
    }

    fn from_fields(fields: &[WireValue]) -> Option<Self> {
        Some(Self {
            id: int_at(fields, 0)?,
            name: str_at(fields, 1)?,
            email: str_at(fields, 2)?,
            username: str_at(fields, 3)?,
            stored_project: record_at(fields, 4)?,
        })
    }
}

/// A directory within a project's tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directory {
    /// Remote identity.
    pub id: i64,
    /// Path relative to the project root.
    pub path: String,
}

impl DomainRecord for Directory {
    const TYPE: RecordType = RecordType::Directory;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_fields(&self) -> Vec<WireValue> {
        vec![WireValue::Int(self.id), WireValue::Str(self.path.clone())]
    }

    fn from_fields(fields: &[WireValue]) -> Option<Self> {
        Some(Self {
            id: int_at(fields, 0)?,
            path: str_at(fields, 1)?,
        })
    }
}

/// A revision of a stored project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectVersion {
    /// Remote identity.
    pub id: i64,
    /// Snapshot of the owning project.
    pub project: StoredProject,
    /// Revision number.
    pub version: i64,
    /// Commit timestamp (opaque, service-formatted).
    pub time_stamp: i64,
    /// Snapshot of the committing developer.
    pub committer: Developer,
    /// Commit message.
    pub commit_msg: String,
    /// Service-defined version properties.
    pub properties: String,
}

impl DomainRecord for ProjectVersion {
    const TYPE: RecordType = RecordType::ProjectVersion;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_fields(&self) -> Vec<WireValue> {
        vec![
            WireValue::Int(self.id),
            self.project.to_wire(),
            WireValue::Int(self.version),
            WireValue::Int(self.time_stamp),
            self.committer.to_wire(),
            WireValue::Str(self.commit_msg.clone()),
            WireValue::Str(self.properties.clone()),
        ]
    }

    fn from_fields(fields: &[WireValue]) -> Option<Self> {
        Some(Self {
            id: int_at(fields, 0)?,
            project: record_at(fields, 1)?,
            version: int_at(fields, 2)?,
            time_stamp: int_at(fields, 3)?,
            committer: record_at(fields, 4)?,
            commit_msg: str_at(fields, 5)?,
            properties: str_at(fields, 6)?,
        })
    }
}

/// A file at a specific project version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectFile {
    /// Remote identity.
    pub id: i64,
    /// File name (path within the version).
    pub name: String,
    /// Snapshot of the owning version.
    pub project_version: ProjectVersion,
    /// Change status at this version (added, modified, ...).
    pub status: String,
    /// Whether the entry is a directory.
    pub is_directory: bool,
    /// Snapshot of the containing directory.
    pub directory: Directory,
}

impl DomainRecord for ProjectFile {
    const TYPE: RecordType = RecordType::ProjectFile;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_fields(&self) -> Vec<WireValue> {
        vec![
            WireValue::Int(self.id),
            WireValue::Str(self.name.clone()),
            self.project_version.to_wire(),
            WireValue::Str(self.status.clone()),
            WireValue::Bool(self.is_directory),
            self.directory.to_wire(),
        ]
    }

    fn from_fields(fields: &[WireValue]) -> Option<Self> {
        Some(Self {
            id: int_at(fields, 0)?,
            name: str_at(fields, 1)?,
            project_version: record_at(fields, 2)?,
            status: str_at(fields, 3)?,
            is_directory: bool_at(fields, 4)?,
            directory: record_at(fields, 5)?,
        })
    }
}

/// A named group of project files selected by a path and regex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileGroup {
    /// Remote identity.
    pub id: i64,
    /// Group name.
    pub name: String,
    /// Sub-path the group is rooted at.
    pub sub_path: String,
    /// File-matching regex.
    pub regex: String,
    /// Recalculation frequency.
    pub recalc_freq: i64,
    /// Last use timestamp (opaque, service-formatted).
    pub last_used: String,
    /// Snapshot of the owning version.
    pub project_version: ProjectVersion,
}

impl DomainRecord for FileGroup {
    const TYPE: RecordType = RecordType::FileGroup;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_fields(&self) -> Vec<WireValue> {
        vec![
            WireValue::Int(self.id),
            WireValue::Str(self.name.clone()),
            WireValue::Str(self.sub_path.clone()),
            WireValue::Str(self.regex.clone()),
            WireValue::Int(self.recalc_freq),
            WireValue::Str(self.last_used.clone()),
            self.project_version.to_wire(),
        ]
    }

    fn from_fields(fields: &[WireValue]) -> Option<Self> {
        Some(Self {
            id: int_at(fields, 0)?,
            name: str_at(fields, 1)?,
            sub_path: str_at(fields, 2)?,
            regex: str_at(fields, 3)?,
            recalc_freq: int_at(fields, 4)?,
            last_used: str_at(fields, 5)?,
            project_version: record_at(fields, 6)?,
        })
    }
}

/// Activation category of a metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetricTypeKind {
    /// Activated by source code changes.
    #[default]
    SourceCode,
    /// Activated by mailing list traffic.
    MailingList,
    /// Activated by bug database changes.
    BugDatabase,
}

impl MetricTypeKind {
    /// Wire encoding of the kind.
    pub fn as_int(self) -> i64 {
        match self {
            Self::SourceCode => 0,
            Self::MailingList => 1,
            Self::BugDatabase => 2,
        }
    }

    /// Decode the wire encoding of the kind.
    pub fn from_int(n: i64) -> Option<Self> {
        match n {
            0 => Some(Self::SourceCode),
            1 => Some(Self::MailingList),
            2 => Some(Self::BugDatabase),
            _ => None,
        }
    }
}

/// The activation category record of a metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricType {
    /// Remote identity.
    pub id: i64,
    /// Activation category.
    pub kind: MetricTypeKind,
}

impl DomainRecord for MetricType {
    const TYPE: RecordType = RecordType::MetricType;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_fields(&self) -> Vec<WireValue> {
        vec![WireValue::Int(self.id), WireValue::Int(self.kind.as_int())]
    }

    fn from_fields(fields: &[WireValue]) -> Option<Self> {
        Some(Self {
            id: int_at(fields, 0)?,
            kind: MetricTypeKind::from_int(int_at(fields, 1)?)?,
        })
    }
}

/// An installed analysis plugin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plugin {
    /// Remote identity.
    pub id: i64,
    /// Plugin name.
    pub name: String,
    /// Installation timestamp (opaque, service-formatted).
    pub install_date: String,
}

impl DomainRecord for Plugin {
    const TYPE: RecordType = RecordType::Plugin;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_fields(&self) -> Vec<WireValue> {
        vec![
            WireValue::Int(self.id),
            WireValue::Str(self.name.clone()),
            WireValue::Str(self.install_date.clone()),
        ]
    }

    fn from_fields(fields: &[WireValue]) -> Option<Self> {
        Some(Self {
            id: int_at(fields, 0)?,
            name: str_at(fields, 1)?,
            install_date: str_at(fields, 2)?,
        })
    }
}

/// A metric installed in the remote plugin registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metric {
    /// Remote identity.
    pub id: i64,
    /// Snapshot of the providing plugin.
    pub plugin: Plugin,
    /// Snapshot of the activation category.
    pub metric_type: MetricType,
    /// Short mnemonic the metric is addressed by.
    pub mnemonic: String,
    /// Human-readable description.
    pub description: String,
}

impl DomainRecord for Metric {
    const TYPE: RecordType = RecordType::Metric;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_fields(&self) -> Vec<WireValue> {
        vec![
            WireValue::Int(self.id),
            self.plugin.to_wire(),
            self.metric_type.to_wire(),
            WireValue::Str(self.mnemonic.clone()),
            WireValue::Str(self.description.clone()),
        ]
    }

    fn from_fields(fields: &[WireValue]) -> Option<Self> {
        Some(Self {
            id: int_at(fields, 0)?,
            plugin: record_at(fields, 1)?,
            metric_type: record_at(fields, 2)?,
            mnemonic: str_at(fields, 3)?,
            description: str_at(fields, 4)?,
        })
    }
}

/// A measurement bound to a project file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectFileMeasurement {
    /// Remote identity.
    pub id: i64,
    /// Snapshot of the measuring metric.
    pub metric: Metric,
    /// Snapshot of the measured file.
    pub project_file: ProjectFile,
    /// When the measurement ran (opaque, service-formatted).
    pub when_run: String,
    /// Measurement result.
    pub result: String,
}

impl DomainRecord for ProjectFileMeasurement {
    const TYPE: RecordType = RecordType::ProjectFileMeasurement;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_fields(&self) -> Vec<WireValue> {
        vec![
            WireValue::Int(self.id),
            self.metric.to_wire(),
            self.project_file.to_wire(),
            WireValue::Str(self.when_run.clone()),
            WireValue::Str(self.result.clone()),
        ]
    }

    fn from_fields(fields: &[WireValue]) -> Option<Self> {
        Some(Self {
            id: int_at(fields, 0)?,
            metric: record_at(fields, 1)?,
            project_file: record_at(fields, 2)?,
            when_run: str_at(fields, 3)?,
            result: str_at(fields, 4)?,
        })
    }
}

/// A measurement bound to a project version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectVersionMeasurement {
    /// Remote identity.
    pub id: i64,
    /// Snapshot of the measuring metric.
    pub metric: Metric,
    /// Snapshot of the measured version.
    pub project_version: ProjectVersion,
    /// When the measurement ran (opaque, service-formatted).
    pub when_run: String,
    /// Measurement result.
    pub result: String,
}

impl DomainRecord for ProjectVersionMeasurement {
    const TYPE: RecordType = RecordType::ProjectVersionMeasurement;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_fields(&self) -> Vec<WireValue> {
        vec![
            WireValue::Int(self.id),
            self.metric.to_wire(),
            self.project_version.to_wire(),
            WireValue::Str(self.when_run.clone()),
            WireValue::Str(self.result.clone()),
        ]
    }

    fn from_fields(fields: &[WireValue]) -> Option<Self> {
        Some(Self {
            id: int_at(fields, 0)?,
            metric: record_at(fields, 1)?,
            project_version: record_at(fields, 2)?,
            when_run: str_at(fields, 3)?,
            result: str_at(fields, 4)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    pub(crate) fn sample_project() -> StoredProject {
        StoredProject {
            id: 34578,
            name: "svn".into(),
            website: "https://subversion.apache.org".into(),
            contact: "dev@subversion.apache.org".into(),
            bugs: "https://issues.apache.org".into(),
            repository: "https://svn.apache.org/repos/asf".into(),
            mail: "users@subversion.apache.org".into(),
        }
    }

    pub(crate) fn sample_version() -> ProjectVersion {
        ProjectVersion {
            id: 910,
            project: sample_project(),
            version: 42,
            time_stamp: 1214221880,
            committer: Developer {
                id: 11,
                name: "Christoph Schleifenbaum".into(),
                email: "christoph@example.org".into(),
                username: "christoph".into(),
                stored_project: sample_project(),
            },
            commit_msg: "Fix line counting".into(),
            properties: String::new(),
        }
    }

    pub(crate) fn sample_file() -> ProjectFile {
        ProjectFile {
            id: 4711,
            name: "src/main.c".into(),
            project_version: sample_version(),
            status: "MODIFIED".into(),
            is_directory: false,
            directory: Directory {
                id: 77,
                path: "src".into(),
            },
        }
    }

    #[test]
    fn every_record_type_round_trips() {
        let project = sample_project();
        assert_eq!(StoredProject::from_wire(&project.to_wire()), Some(project));

        let version = sample_version();
        assert_eq!(
            ProjectVersion::from_wire(&version.to_wire()),
            Some(version.clone())
        );

        let file = sample_file();
        assert_eq!(ProjectFile::from_wire(&file.to_wire()), Some(file.clone()));

        let group = FileGroup {
            id: 5,
            name: "headers".into(),
            sub_path: "include".into(),
            regex: r".*\.h".into(),
            recalc_freq: 10,
            last_used: "20080623T101010".into(),
            project_version: version.clone(),
        };
        assert_eq!(FileGroup::from_wire(&group.to_wire()), Some(group));

        let metric = Metric {
            id: 3,
            plugin: Plugin {
                id: 2,
                name: "wc".into(),
                install_date: "20080101T000000".into(),
            },
            metric_type: MetricType {
                id: 1,
                kind: MetricTypeKind::SourceCode,
            },
            mnemonic: "LOC".into(),
            description: "Lines of code".into(),
        };
        assert_eq!(Metric::from_wire(&metric.to_wire()), Some(metric.clone()));

        let fm = ProjectFileMeasurement {
            id: 0,
            metric: metric.clone(),
            project_file: file,
            when_run: "20080623T111111".into(),
            result: "128".into(),
        };
        assert_eq!(
            ProjectFileMeasurement::from_wire(&fm.to_wire()),
            Some(fm.clone())
        );

        let vm = ProjectVersionMeasurement {
            id: 0,
            metric,
            project_version: version,
            when_run: "20080623T111111".into(),
            result: "4096".into(),
        };
        assert_eq!(ProjectVersionMeasurement::from_wire(&vm.to_wire()), Some(vm));
    }

    #[test]
    fn tagged_decode_rejects_foreign_tag() {
        // A Directory-shaped field list under a Plugin tag must not decode
        // as Directory: the tag is authoritative.
        let wire = WireValue::Record(WireRecord::new(
            RecordType::Plugin,
            vec![WireValue::Int(1), WireValue::Str("src".into())],
        ));
        assert_eq!(Directory::from_wire(&wire), None);
        // ...and it is not a valid Plugin either (missing install_date).
        assert_eq!(Plugin::from_wire(&wire), None);
    }

    #[test]
    fn decode_ignores_extra_trailing_fields() {
        let mut fields = Directory {
            id: 9,
            path: "doc".into(),
        }
        .to_fields();
        fields.push(WireValue::Str("spare".into()));
        let decoded = Directory::from_fields(&fields);
        assert_eq!(
            decoded,
            Some(Directory {
                id: 9,
                path: "doc".into()
            })
        );
    }

    #[test]
    fn default_records_are_unpersisted() {
        assert_eq!(StoredProject::default().id(), 0);
        assert_eq!(ProjectFile::default().id(), 0);
    }
}
