//! Physical storage abstraction for a repository.
//!
//! `Storage` hides where and how installed packages live on disk, so the
//! repository logic never touches the filesystem directly. The production
//! implementation is [`FileSystemStorage`]; tests use the generated
//! `MockStorage`.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::interact::InteractionStrategy;
use crate::package::Package;

mod fs;
mod listing;

pub use fs::FileSystemStorage;

/// An opened piece of package content, together with the identifier of the
/// location it was resolved from.
///
/// The reader is owned by the caller, who is responsible for scoping and
/// releasing it.
pub struct Content {
    system_id: String,
    reader: Box<dyn Read + Send>,
}

impl Content {
    pub fn new(system_id: impl Into<String>, reader: Box<dyn Read + Send>) -> Self {
        Content {
            system_id: system_id.into(),
            reader,
        }
    }

    /// Identifier of the location the content was resolved from.
    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    pub fn into_reader(self) -> Box<dyn Read + Send> {
        self.reader
    }

    /// Drain the content into a byte vector.
    pub fn read_to_vec(mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.reader.read_to_end(&mut buffer).map_err(|e| {
            Error::storage_io(format!("failed to read content from {}", self.system_id), e)
        })?;
        Ok(buffer)
    }

    /// Drain the content into a string.
    pub fn read_to_string(mut self) -> Result<String> {
        let mut buffer = String::new();
        self.reader.read_to_string(&mut buffer).map_err(|e| {
            Error::storage_io(format!("failed to read content from {}", self.system_id), e)
        })?;
        Ok(buffer)
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Content")
            .field("system_id", &self.system_id)
            .finish_non_exhaustive()
    }
}

/// Durable storage owning the on-disk state of one repository.
#[cfg_attr(test, mockall::automock)]
pub trait Storage: Send + Sync {
    /// Whether installs and removals are supported at all.
    fn is_read_only(&self) -> bool;

    /// Return a resolver for one installed package.
    ///
    /// `dir_name` is the directory the package lives in within the
    /// repository; it is absent while a package has not reached its final
    /// location yet. `abbrev` must match the descriptor and is needed to
    /// locate the content directory.
    fn make_resolver(
        &self,
        dir_name: Option<String>,
        abbrev: Option<String>,
    ) -> Result<Box<dyn PackageResolver>>;

    /// The directory names of all installed packages, as recorded by the
    /// line-oriented listing.
    fn installed_directories(&self) -> Result<Vec<String>>;

    /// Veto hook invoked before anything is written during an install.
    fn before_install(&self, force: bool, interact: &dyn InteractionStrategy) -> Result<()>;

    /// Create a scratch directory for unpacking an archive.
    ///
    /// The storage owns the directory until [`Storage::commit`] takes it
    /// over or [`Storage::discard_scratch`] abandons it.
    fn make_scratch_dir(&self, prefix: &str) -> Result<PathBuf>;

    /// Abandon a scratch directory left over from a failed install.
    fn discard_scratch(&self, dir: &Path) -> Result<()>;

    /// Whether a package key is already taken.
    fn key_exists(&self, key: &str) -> Result<bool>;

    /// Publish the scratch directory under `key` by rename, not copy.
    ///
    /// Takes ownership of the scratch directory's content; the caller must
    /// not reuse it afterwards. Returns the resolver bound to the package's
    /// final directory.
    fn commit(&self, scratch: PathBuf, key: &str, pkg: &Package) -> Result<Box<dyn PackageResolver>>;

    /// Append the freshly installed package to both listings.
    fn record_installed(&self, pkg: &Package) -> Result<()>;

    /// Remove a package: listing entries first, then the physical directory,
    /// so a crash mid-removal reads as "not installed" rather than leaving a
    /// dangling listing entry.
    fn remove(&self, pkg: &Package) -> Result<()>;
}

/// Resolves relative paths inside one installed package.
#[cfg_attr(test, mockall::automock)]
pub trait PackageResolver: Send + Sync {
    /// Directory name of the package within the repository, once bound.
    fn dir_name(&self) -> Option<String>;

    /// Base directory of the package content, when one exists.
    fn content_base(&self) -> Option<PathBuf>;

    /// Resolve a path relative to the package root.
    fn resolve_resource(&self, path: &str) -> Result<Content>;

    /// Resolve a path relative to the content directory, falling back to
    /// the package root. [`Error::NotFound`] names every location tried.
    fn resolve_component(&self, path: &str) -> Result<Content>;
}
