// SPDX-License-Identifier: Apache-2.0
//! Facade over the remote file-data service: per-file content retrieval
//! and whole-version checkouts.

use crate::error::{expect_list, expect_str, ClientError};
use crate::orb::{Orb, RemoteObject};
use crate::stream::{ContentFetcher, ContentStream};
use alitheia_proto::{DomainRecord, ProjectFile, ProjectVersion};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

const FDS_OBJECT: &str = "FDS";

/// Client for the remote file-data service.
#[derive(Clone)]
pub struct Fds {
    remote: Arc<dyn RemoteObject>,
}

impl Fds {
    /// Connect to the remote file-data service.
    pub fn connect(orb: &dyn Orb) -> Result<Self, ClientError> {
        Ok(Self {
            remote: orb.resolve(FDS_OBJECT)?,
        })
    }

    /// A lazy stream over `file`'s content. No remote traffic happens
    /// until the stream is first read.
    pub fn get_file_contents(&self, file: ProjectFile) -> ContentStream {
        ContentStream::new(Arc::new(self.clone()), file)
    }

    /// Fetch the file set of `version` as a checkout.
    pub fn get_checkout(&self, version: &ProjectVersion) -> Result<Checkout, ClientError> {
        const METHOD: &str = "getCheckout";
        let reply = self.remote.call(METHOD, &[version.to_wire()])?;
        let mut parts = expect_list(METHOD, reply)?.into_iter();
        let version = parts
            .next()
            .as_ref()
            .and_then(ProjectVersion::from_wire)
            .ok_or(ClientError::UnexpectedReply {
                method: METHOD.to_owned(),
                expected: "a version record",
            })?;
        let files = match parts.next() {
            Some(value) => expect_list(METHOD, value)?,
            None => Vec::new(),
        };
        let files = files
            .iter()
            .filter_map(|value| {
                let file = ProjectFile::from_wire(value);
                if file.is_none() {
                    warn!("checkout entry is not a file record; skipped");
                }
                file
            })
            .collect();
        Ok(Checkout {
            version,
            files,
            fds: self.clone(),
        })
    }
}

impl ContentFetcher for Fds {
    fn fetch(&self, file: &ProjectFile) -> Result<Vec<u8>, ClientError> {
        const METHOD: &str = "getFileContents";
        let reply = self.remote.call(METHOD, &[file.to_wire()])?;
        Ok(expect_str(METHOD, reply)?.into_bytes())
    }
}

/// A snapshot of a project version's file set.
///
/// File content is not part of the snapshot; each file is fetched lazily
/// through [`Checkout::file_contents`] or materialized by [`Checkout::save`].
pub struct Checkout {
    version: ProjectVersion,
    files: Vec<ProjectFile>,
    fds: Fds,
}

impl Checkout {
    /// The version this checkout snapshots.
    pub fn version(&self) -> &ProjectVersion {
        &self.version
    }

    /// The files of the snapshot, directories included.
    pub fn files(&self) -> &[ProjectFile] {
        &self.files
    }

    /// A lazy stream over one file of the checkout.
    pub fn file_contents(&self, file: &ProjectFile) -> ContentStream {
        self.fds.get_file_contents(file.clone())
    }

    /// Materialize the checkout under `dir`, one file per entry. Directory
    /// entries become directories; file paths are nested under their
    /// directory's path.
    pub fn save(&self, dir: &Path) -> Result<(), ClientError> {
        std::fs::create_dir_all(dir)?;
        for file in &self.files {
            let mut target = dir.to_path_buf();
            let prefix = file.directory.path.trim_matches('/');
            if !prefix.is_empty() {
                target.push(prefix);
            }
            if file.is_directory {
                std::fs::create_dir_all(target.join(&file.name))?;
                continue;
            }
            std::fs::create_dir_all(&target)?;
            let mut stream = self.file_contents(file);
            stream.save(&target.join(&file.name))?;
        }
        Ok(())
    }
}
