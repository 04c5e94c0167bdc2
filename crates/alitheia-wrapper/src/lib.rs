// SPDX-License-Identifier: Apache-2.0
//! Process-wrapper metric jobs: run an external analysis program over
//! project content and persist its output as a measurement.
//!
//! The program's arguments may carry placeholders: `%file%` is replaced
//! with the path of a temp file holding the project file's content (when
//! absent, the content is piped to stdin instead), and `%directory%` with
//! the path of a materialized checkout. Stdout becomes the measurement
//! result; abnormal termination aborts without persisting anything, so a
//! missing record is the only trace of a failed run.

use alitheia_client::{ClientError, Database, Fds, Job};
use alitheia_proto::{Metric as MetricRecord, ProjectFile, ProjectFileMeasurement, ProjectVersion, ProjectVersionMeasurement};
use std::io::{Read, Write};
use std::process::{Command, Output, Stdio};
use tracing::{debug, error};

const FILE_PLACEHOLDER: &str = "%file%";
const DIRECTORY_PLACEHOLDER: &str = "%directory%";

/// The external program and argument template shared by both job kinds.
#[derive(Debug, Clone)]
pub struct WrapperSpec {
    /// Program to launch.
    pub program: String,
    /// Arguments, possibly holding `%file%` / `%directory%` placeholders.
    pub args: Vec<String>,
}

impl WrapperSpec {
    /// A spec with no arguments (content arrives on stdin).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add one argument to the template.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn wants_file(&self) -> bool {
        self.args.iter().any(|arg| arg.contains(FILE_PLACEHOLDER))
    }

    fn output_with_path(&self, placeholder: &str, path: &str) -> Result<Output, ClientError> {
        let args = self
            .args
            .iter()
            .map(|arg| arg.replace(placeholder, path));
        debug!(program = %self.program, "launching wrapper program");
        Ok(Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()?)
    }

    fn output_with_stdin(&self, content: &[u8]) -> Result<Output, ClientError> {
        debug!(program = %self.program, "launching wrapper program");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(content)?;
        }
        Ok(child.wait_with_output()?)
    }

    fn result_from(&self, output: Output) -> Result<String, ClientError> {
        if !output.status.success() {
            return Err(ClientError::Subprocess {
                program: self.program.clone(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn timestamp() -> String {
    chrono::Utc::now().format("%Y%m%dT%H%M%S").to_string()
}

/// Runs the wrapped program over one project file and persists a
/// [`ProjectFileMeasurement`].
pub struct ProjectFileWrapperJob {
    spec: WrapperSpec,
    metric: MetricRecord,
    file: ProjectFile,
    fds: Fds,
    db: Database,
}

impl ProjectFileWrapperJob {
    /// Build a job measuring `file` on behalf of `metric`.
    pub fn new(
        spec: WrapperSpec,
        metric: MetricRecord,
        file: ProjectFile,
        fds: Fds,
        db: Database,
    ) -> Self {
        Self {
            spec,
            metric,
            file,
            fds,
            db,
        }
    }

    /// Run the program and persist the measurement. The persisted record
    /// (identity assigned) is returned; nothing is written when the
    /// program terminates abnormally.
    pub fn execute(&self) -> Result<ProjectFileMeasurement, ClientError> {
        let mut content = Vec::new();
        self.fds
            .get_file_contents(self.file.clone())
            .read_to_end(&mut content)?;

        let output = if self.spec.wants_file() {
            let mut scratch = tempfile::NamedTempFile::new()?;
            scratch.write_all(&content)?;
            scratch.flush()?;
            let path = scratch.path().display().to_string();
            self.spec.output_with_path(FILE_PLACEHOLDER, &path)?
        } else {
            self.spec.output_with_stdin(&content)?
        };
        let result = self.spec.result_from(output)?;

        let mut measurement = ProjectFileMeasurement {
            id: 0,
            metric: self.metric.clone(),
            project_file: self.file.clone(),
            when_run: timestamp(),
            result,
        };
        self.db.add_record(&mut measurement)?;
        Ok(measurement)
    }
}

impl Job for ProjectFileWrapperJob {
    fn run(&self) {
        if let Err(err) = self.execute() {
            error!(program = %self.spec.program, file = %self.file.name, %err, "file wrapper job failed");
        }
    }
}

/// Runs the wrapped program over a materialized checkout and persists a
/// [`ProjectVersionMeasurement`].
pub struct ProjectVersionWrapperJob {
    spec: WrapperSpec,
    metric: MetricRecord,
    version: ProjectVersion,
    fds: Fds,
    db: Database,
}

impl ProjectVersionWrapperJob {
    /// Build a job measuring `version` on behalf of `metric`.
    pub fn new(
        spec: WrapperSpec,
        metric: MetricRecord,
        version: ProjectVersion,
        fds: Fds,
        db: Database,
    ) -> Self {
        Self {
            spec,
            metric,
            version,
            fds,
            db,
        }
    }

    /// Check out the version into a scratch directory, run the program
    /// over it, and persist the measurement.
    pub fn execute(&self) -> Result<ProjectVersionMeasurement, ClientError> {
        let checkout = self.fds.get_checkout(&self.version)?;
        let scratch = tempfile::tempdir()?;
        checkout.save(scratch.path())?;
        let path = scratch.path().display().to_string();
        let output = self.spec.output_with_path(DIRECTORY_PLACEHOLDER, &path)?;
        let result = self.spec.result_from(output)?;

        let mut measurement = ProjectVersionMeasurement {
            id: 0,
            metric: self.metric.clone(),
            project_version: self.version.clone(),
            when_run: timestamp(),
            result,
        };
        self.db.add_record(&mut measurement)?;
        Ok(measurement)
    }
}

impl Job for ProjectVersionWrapperJob {
    fn run(&self) {
        if let Err(err) = self.execute() {
            error!(program = %self.spec.program, version = self.version.version, %err, "version wrapper job failed");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use alitheia_client::testing::{LoopbackOrb, StaticDatabase, StaticFds};
    use std::sync::Arc;

    fn fixture() -> (Fds, Database) {
        let orb = LoopbackOrb::new();
        let files = Arc::new(StaticFds::new());
        files.add_file("README", "alpha\nbeta\n");
        orb.install("FDS", files as _);
        orb.install("Database", Arc::new(StaticDatabase::new()));
        (Fds::connect(&orb).unwrap(), Database::connect(&orb).unwrap())
    }

    fn readme() -> ProjectFile {
        ProjectFile {
            id: 1,
            name: "README".to_owned(),
            ..ProjectFile::default()
        }
    }

    #[test]
    fn stdin_mode_measures_file_content() {
        let (fds, db) = fixture();
        let job = ProjectFileWrapperJob::new(
            WrapperSpec::new("cat"),
            MetricRecord::default(),
            readme(),
            fds,
            db.clone(),
        );
        let measurement = job.execute().unwrap();
        assert_eq!(measurement.result, "alpha\nbeta\n");
        assert_ne!(measurement.id, 0);
        assert!(!measurement.when_run.is_empty());

        let persisted: Option<ProjectFileMeasurement> =
            db.find_object_by_id(measurement.id).unwrap();
        assert_eq!(persisted, Some(measurement));
    }

    #[test]
    fn file_placeholder_mode_passes_a_temp_path() {
        let (fds, db) = fixture();
        let job = ProjectFileWrapperJob::new(
            WrapperSpec::new("cat").arg("%file%"),
            MetricRecord::default(),
            readme(),
            fds,
            db,
        );
        let measurement = job.execute().unwrap();
        assert_eq!(measurement.result, "alpha\nbeta\n");
    }

    #[test]
    fn abnormal_termination_persists_nothing() {
        let (fds, db) = fixture();
        let job = ProjectFileWrapperJob::new(
            WrapperSpec::new("false").arg("%file%"),
            MetricRecord::default(),
            readme(),
            fds,
            db.clone(),
        );
        assert!(matches!(
            job.execute(),
            Err(ClientError::Subprocess { .. })
        ));
        let persisted: Option<ProjectFileMeasurement> = db.find_object_by_id(1).unwrap();
        assert!(persisted.is_none());
    }

    #[test]
    fn version_job_runs_over_a_materialized_checkout() {
        let (fds, db) = fixture();
        let job = ProjectVersionWrapperJob::new(
            WrapperSpec::new("cat").arg("%directory%/README"),
            MetricRecord::default(),
            ProjectVersion::default(),
            fds,
            db,
        );
        let measurement = job.execute().unwrap();
        assert_eq!(measurement.result, "alpha\nbeta\n");
    }
}
