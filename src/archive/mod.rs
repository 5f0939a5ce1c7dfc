//! Package archive sources and extraction.
//!
//! An [`ArchiveSource`] is an already-open byte source for a package
//! archive; fetching one over the network is somebody else's job. The
//! extractors unpack an archive into a scratch directory, preserving the
//! layout as-is — the descriptor must sit at the archive top level.

mod tar_gz;
mod zip;

pub use tar_gz::TarGzExtractor;
pub use zip::ZipExtractor;

use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A readable, seekable byte stream.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// A byte source for a package archive.
pub trait ArchiveSource: Send + Sync {
    /// Whether the source can be read at all.
    fn is_valid(&self) -> bool;

    /// Identifier of the source, used in messages and for format dispatch.
    fn uri(&self) -> String;

    /// Open the archive bytes.
    fn open(&self) -> Result<Box<dyn ReadSeek>>;
}

/// An archive on the local filesystem.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }
}

impl ArchiveSource for FileSource {
    fn is_valid(&self) -> bool {
        self.path.is_file()
    }

    fn uri(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&self) -> Result<Box<dyn ReadSeek>> {
        let file = fs::File::open(&self.path).map_err(|e| {
            Error::storage_io(format!("failed to open archive {}", self.path.display()), e)
        })?;
        Ok(Box::new(file))
    }
}

/// An in-memory archive, for embedded packages and tests.
pub struct BytesSource {
    name: String,
    bytes: Vec<u8>,
}

impl BytesSource {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        BytesSource {
            name: name.into(),
            bytes,
        }
    }
}

impl ArchiveSource for BytesSource {
    fn is_valid(&self) -> bool {
        !self.bytes.is_empty()
    }

    fn uri(&self) -> String {
        self.name.clone()
    }

    fn open(&self) -> Result<Box<dyn ReadSeek>> {
        Ok(Box::new(Cursor::new(self.bytes.clone())))
    }
}

/// Unpacks one archive format into a directory.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor: Send + Sync {
    /// Whether this extractor recognizes the archive format.
    fn can_handle(&self, uri: &str) -> bool;

    /// Unpack the archive into `dest`.
    fn unpack(&self, source: &dyn ArchiveSource, dest: &Path) -> Result<()>;
}

/// Dispatcher that selects the appropriate extractor based on the archive
/// format. Holds all available extractors and dispatches to the right one.
pub struct ArchiveExtractorImpl {
    zip: ZipExtractor,
    tar_gz: TarGzExtractor,
}

impl Default for ArchiveExtractorImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveExtractorImpl {
    pub fn new() -> Self {
        ArchiveExtractorImpl {
            zip: ZipExtractor,
            tar_gz: TarGzExtractor,
        }
    }
}

impl ArchiveExtractor for ArchiveExtractorImpl {
    fn can_handle(&self, uri: &str) -> bool {
        self.zip.can_handle(uri) || self.tar_gz.can_handle(uri)
    }

    #[tracing::instrument(skip(self, source))]
    fn unpack(&self, source: &dyn ArchiveSource, dest: &Path) -> Result<()> {
        let uri = source.uri();
        if self.zip.can_handle(&uri) {
            return self.zip.unpack(source, dest);
        }
        if self.tar_gz.can_handle(&uri) {
            return self.tar_gz.unpack(source, dest);
        }
        Err(Error::storage(format!("unsupported archive format: {uri}")))
    }
}
