//! Repository storage on the local file system.
//!
//! Layout under the repository root:
//!
//! ```text
//! <root>/.meta/packages.json    structured listing
//! <root>/.meta/packages.txt     line-oriented listing
//! <root>/<key>/                 one directory per installed package
//! <root>/<key>/content/         content dir (or <root>/<key>/<abbrev>/, legacy)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::listing::{ListedPackage, PackagesJsonFile, PackagesTxtFile};
use super::{Content, PackageResolver, Storage};
use crate::error::{Error, Result};
use crate::interact::InteractionStrategy;
use crate::package::Package;

/// Name of the private metadata directory under the repository root.
pub const PRIVATE_DIR: &str = ".meta";

/// Name of the current-style content directory inside a package.
pub const CONTENT_DIR: &str = "content";

/// Storage rooted at a repository directory on the local file system.
pub struct FileSystemStorage {
    root: PathBuf,
    private_dir: PathBuf,
    txt_file: PackagesTxtFile,
    json_file: PackagesJsonFile,
    error_if_no_content_dir: bool,
}

impl FileSystemStorage {
    /// Open a storage rooted at an existing repository directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            return Err(Error::storage(format!(
                "the repository root directory does not exist: {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(Error::storage(format!(
                "the repository root is not a directory: {}",
                root.display()
            )));
        }
        let private_dir = root.join(PRIVATE_DIR);
        fs::create_dir_all(&private_dir).map_err(|e| {
            Error::storage_io(
                format!("failed to create the private directory {}", private_dir.display()),
                e,
            )
        })?;
        let txt_file = PackagesTxtFile::new(private_dir.join("packages.txt"));
        let json_file = PackagesJsonFile::new(private_dir.join("packages.json"));
        Ok(FileSystemStorage {
            root,
            private_dir,
            txt_file,
            json_file,
            error_if_no_content_dir: true,
        })
    }

    /// Create the on-disk layout for a brand new repository and open it.
    ///
    /// The target must not exist yet, or be an empty directory.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.exists() {
            if !root.is_dir() {
                return Err(Error::storage(format!(
                    "file exists and is not a directory: {}",
                    root.display()
                )));
            }
            let mut entries = fs::read_dir(&root).map_err(|e| {
                Error::storage_io(format!("failed to read {}", root.display()), e)
            })?;
            if entries.next().is_some() {
                return Err(Error::storage(format!(
                    "directory exists and is not empty: {}",
                    root.display()
                )));
            }
        } else {
            fs::create_dir_all(&root).map_err(|e| {
                Error::storage_io(format!("failed to create {}", root.display()), e)
            })?;
        }
        Self::new(root)
    }

    /// The repository root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a package without any content directory is an error
    /// (the default) or tolerated.
    pub fn set_error_if_no_content_dir(&mut self, value: bool) {
        self.error_if_no_content_dir = value;
    }

    /// Locate the content directory of a package: either `content/`
    /// (current) or a directory named after the abbrev (legacy). Exactly
    /// one must exist.
    fn content_dir_for(&self, pkg_dir: &Path, abbrev: &str) -> Result<Option<PathBuf>> {
        let legacy = pkg_dir.join(abbrev);
        let current = pkg_dir.join(CONTENT_DIR);
        let legacy_exists = legacy.exists();
        let current_exists = current.exists();
        debug!(
            "content dir {:?} (exists: {current_exists}), legacy {:?} (exists: {legacy_exists})",
            current, legacy
        );

        match (current_exists, legacy_exists) {
            (false, false) => {
                if self.error_if_no_content_dir {
                    Err(Error::storage(format!(
                        "none of the content dirs exist: '{}' and '{}'",
                        current.display(),
                        legacy.display()
                    )))
                } else {
                    Ok(None)
                }
            }
            (true, true) => Err(Error::storage(format!(
                "both content dirs exist: '{}' and '{}'",
                current.display(),
                legacy.display()
            ))),
            (true, false) => {
                if !current.is_dir() {
                    return Err(Error::storage(format!(
                        "content dir is not a directory: '{}'",
                        current.display()
                    )));
                }
                Ok(Some(current))
            }
            (false, true) => {
                if !legacy.is_dir() {
                    return Err(Error::storage(format!(
                        "content dir is not a directory: '{}'",
                        legacy.display()
                    )));
                }
                warn!("package uses legacy content dir: '{}'", legacy.display());
                Ok(Some(legacy))
            }
        }
    }
}

impl Storage for FileSystemStorage {
    fn is_read_only(&self) -> bool {
        false
    }

    #[tracing::instrument(skip(self))]
    fn make_resolver(
        &self,
        dir_name: Option<String>,
        abbrev: Option<String>,
    ) -> Result<Box<dyn PackageResolver>> {
        let pkg_dir = dir_name.as_deref().map(|d| self.root.join(d));
        let content_dir = match (&pkg_dir, &abbrev) {
            (Some(dir), Some(abbrev)) => self.content_dir_for(dir, abbrev)?,
            _ => None,
        };
        Ok(Box::new(FileSystemResolver {
            dir_name,
            pkg_dir,
            content_dir,
        }))
    }

    fn installed_directories(&self) -> Result<Vec<String>> {
        self.txt_file.directories()
    }

    fn before_install(&self, _force: bool, _interact: &dyn InteractionStrategy) -> Result<()> {
        // writable storage, nothing to veto
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn make_scratch_dir(&self, prefix: &str) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(&self.private_dir)
            .map_err(|e| {
                Error::storage_io(
                    format!("failed to create a scratch dir in {}", self.private_dir.display()),
                    e,
                )
            })?;
        // from here on the directory's lifetime is managed by commit/discard
        Ok(dir.keep())
    }

    #[tracing::instrument(skip(self))]
    fn discard_scratch(&self, dir: &Path) -> Result<()> {
        if dir.exists() {
            fs::remove_dir_all(dir).map_err(|e| {
                Error::storage_io(format!("failed to discard scratch dir {}", dir.display()), e)
            })?;
        }
        Ok(())
    }

    fn key_exists(&self, key: &str) -> Result<bool> {
        Ok(self.root.join(key).exists())
    }

    #[tracing::instrument(skip(self, pkg))]
    fn commit(
        &self,
        scratch: PathBuf,
        key: &str,
        pkg: &Package,
    ) -> Result<Box<dyn PackageResolver>> {
        let dest = self.root.join(key);
        fs::rename(&scratch, &dest).map_err(|e| {
            Error::storage_io(
                format!(
                    "failed to publish {} as {}",
                    scratch.display(),
                    dest.display()
                ),
                e,
            )
        })?;
        self.make_resolver(Some(key.to_string()), Some(pkg.abbrev().to_string()))
    }

    fn record_installed(&self, pkg: &Package) -> Result<()> {
        let dir = installed_dir_of(pkg)?;
        self.json_file.add(ListedPackage {
            name: pkg.name().to_string(),
            version: pkg.version_str().to_string(),
            dir: dir.clone(),
        })?;
        self.txt_file.add(&dir)
    }

    #[tracing::instrument(skip(self, pkg))]
    fn remove(&self, pkg: &Package) -> Result<()> {
        let dir = installed_dir_of(pkg)?;
        // listing entries first, physical directory second
        self.json_file.remove_by_dir(&dir)?;
        self.txt_file.remove(&dir)?;
        let path = self.root.join(&dir);
        if path.exists() {
            fs::remove_dir_all(&path).map_err(|e| {
                Error::storage_io(format!("failed to delete {}", path.display()), e)
            })?;
        }
        Ok(())
    }
}

fn installed_dir_of(pkg: &Package) -> Result<String> {
    pkg.resolver()
        .dir_name()
        .ok_or_else(|| {
            Error::storage(format!(
                "the package has not been stored in this repository: {}",
                pkg.name()
            ))
        })
}

/// Resolver bound to one package directory on the file system.
struct FileSystemResolver {
    dir_name: Option<String>,
    pkg_dir: Option<PathBuf>,
    content_dir: Option<PathBuf>,
}

impl FileSystemResolver {
    fn try_open_within(&self, path: &str, dir: &Path) -> Result<Option<Content>> {
        debug!("trying to resolve '{path}' within {:?}", dir);
        let file = dir.join(path);
        if !file.exists() {
            return Ok(None);
        }
        match fs::File::open(&file) {
            Ok(f) => Ok(Some(Content::new(file.display().to_string(), Box::new(f)))),
            Err(e) => Err(Error::storage_io(
                format!("file '{}' exists but cannot be opened", file.display()),
                e,
            )),
        }
    }
}

impl PackageResolver for FileSystemResolver {
    fn dir_name(&self) -> Option<String> {
        self.dir_name.clone()
    }

    fn content_base(&self) -> Option<PathBuf> {
        self.content_dir.clone()
    }

    fn resolve_resource(&self, path: &str) -> Result<Content> {
        let dir = self.pkg_dir.as_ref().ok_or_else(|| {
            Error::storage("the resolver is not bound to a package directory".to_string())
        })?;
        self.try_open_within(path, dir)?.ok_or_else(|| Error::NotFound {
            path: path.to_string(),
            locations: vec![dir.display().to_string()],
        })
    }

    fn resolve_component(&self, path: &str) -> Result<Content> {
        if let Some(content_dir) = &self.content_dir
            && let Some(content) = self.try_open_within(path, content_dir)?
        {
            return Ok(content);
        }
        if let Some(pkg_dir) = &self.pkg_dir
            && let Some(content) = self.try_open_within(path, pkg_dir)?
        {
            return Ok(content);
        }
        let locations = [self.content_dir.as_ref(), self.pkg_dir.as_ref()]
            .into_iter()
            .flatten()
            .map(|d| d.display().to_string())
            .collect();
        Err(Error::NotFound {
            path: path.to_string(),
            locations,
        })
    }
}
