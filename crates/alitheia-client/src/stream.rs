// SPDX-License-Identifier: Apache-2.0
//! On-demand byte streams over remote file content.

use crate::error::ClientError;
use alitheia_proto::ProjectFile;
use std::io::{self, BufRead, Read};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Fetches the full content of one project file.
pub trait ContentFetcher: Send + Sync {
    /// Retrieve the file's complete content.
    fn fetch(&self, file: &ProjectFile) -> Result<Vec<u8>, ClientError>;
}

/// A readable stream over a project file's remote content.
///
/// Content is fetched in full on the first read and buffered; the stream
/// never re-fetches. Clones share the fetched buffer (at most one fetch per
/// underlying file handle, whichever clone reads first pays for it) but
/// keep their own read position. There is no incremental fetch: no byte is
/// delivered before the whole content has arrived.
#[derive(Clone)]
pub struct ContentStream {
    fetcher: Arc<dyn ContentFetcher>,
    file: ProjectFile,
    shared: Arc<Mutex<Option<Arc<[u8]>>>>,
    local: Option<Arc<[u8]>>,
    pos: usize,
}

impl ContentStream {
    /// Wrap `file` as a stream served by `fetcher`. No remote traffic
    /// happens until the first read.
    pub fn new(fetcher: Arc<dyn ContentFetcher>, file: ProjectFile) -> Self {
        Self {
            fetcher,
            file,
            shared: Arc::new(Mutex::new(None)),
            local: None,
            pos: 0,
        }
    }

    /// The file this stream reads.
    pub fn file(&self) -> &ProjectFile {
        &self.file
    }

    /// Write the full content to `path`, fetching it if necessary. The
    /// stream's read position is unaffected.
    pub fn save(&mut self, path: &Path) -> Result<(), ClientError> {
        let data = self.buffer()?.to_vec();
        std::fs::write(path, data)?;
        Ok(())
    }

    fn buffer(&mut self) -> io::Result<&[u8]> {
        if self.local.is_none() {
            let mut slot = self
                .shared
                .lock()
                .map_err(|_| io::Error::other("content buffer poisoned"))?;
            if slot.is_none() {
                let bytes = self.fetcher.fetch(&self.file).map_err(io::Error::other)?;
                *slot = Some(Arc::from(bytes.into_boxed_slice()));
            }
            self.local = (*slot).clone();
        }
        match &self.local {
            Some(data) => Ok(data),
            None => Err(io::Error::other("content buffer unavailable")),
        }
    }
}

impl Read for ContentStream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let pos = self.pos;
        let data = self.buffer()?;
        let n = data.len().saturating_sub(pos).min(out.len());
        out[..n].copy_from_slice(&data[pos..pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl BufRead for ContentStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        let pos = self.pos;
        let data = self.buffer()?;
        Ok(&data[pos.min(data.len())..])
    }

    fn consume(&mut self, amt: usize) {
        let len = self.local.as_ref().map_or(usize::MAX, |data| data.len());
        self.pos = self.pos.saturating_add(amt).min(len);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::io::BufRead;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        content: &'static str,
        fetches: AtomicUsize,
    }

    impl ContentFetcher for CountingFetcher {
        fn fetch(&self, _file: &ProjectFile) -> Result<Vec<u8>, ClientError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.content.as_bytes().to_vec())
        }
    }

    fn stream_over(content: &'static str) -> (ContentStream, Arc<CountingFetcher>) {
        let fetcher = Arc::new(CountingFetcher {
            content,
            fetches: AtomicUsize::new(0),
        });
        let file = ProjectFile {
            name: "README".to_owned(),
            ..ProjectFile::default()
        };
        (ContentStream::new(Arc::clone(&fetcher) as _, file), fetcher)
    }

    #[test]
    fn fetches_exactly_once_across_reads() {
        let (mut stream, fetcher) = stream_over("alpha\nbeta\n");

        let mut line = String::new();
        stream.read_line(&mut line).unwrap();
        assert_eq!(line, "alpha\n");

        let mut rest = String::new();
        stream.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "beta\n");

        // Exhausted stream; further reads stay at end-of-stream without
        // another fetch.
        let mut again = String::new();
        stream.read_to_string(&mut again).unwrap();
        assert!(again.is_empty());
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_one_fetch_with_independent_positions() {
        let (mut stream, fetcher) = stream_over("shared");
        let mut twin = stream.clone();

        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"sha");

        let mut all = String::new();
        twin.read_to_string(&mut all).unwrap();
        assert_eq!(all, "shared");

        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn save_leaves_position_untouched() {
        let (mut stream, _) = stream_over("line\n");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        stream.save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line\n");

        let mut all = String::new();
        stream.read_to_string(&mut all).unwrap();
        assert_eq!(all, "line\n");
    }
}
