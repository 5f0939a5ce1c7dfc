//! The repository: the installed-package index and its lifecycle
//! operations.
//!
//! One repository instance is meant for single-process use. Install,
//! removal and reload are serialized by one mutation lock; resolution
//! reads share the index behind a reader/writer lock and never observe an
//! in-flight mutation.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

use log::{debug, warn};

use crate::archive::{ArchiveExtractor, ArchiveExtractorImpl, ArchiveSource};
use crate::error::{Error, Result};
use crate::extension::Extension;
use crate::interact::InteractionStrategy;
use crate::manifest::{JsonManifestParser, ManifestParser};
use crate::package::{Package, PackageIndex};
use crate::space::ContentSpace;
use crate::storage::{Content, Storage};

/// A repository of installed packages on top of a [`Storage`].
pub struct Repository<S: Storage> {
    storage: S,
    parser: Box<dyn ManifestParser>,
    extractor: Box<dyn ArchiveExtractor>,
    /// Extensions handed in at construction, registered by `init`.
    injected: Vec<Arc<dyn Extension>>,
    /// Registered extensions, in registration order.
    extensions: RwLock<Vec<Arc<dyn Extension>>>,
    index: RwLock<PackageIndex>,
    /// Serializes install, removal and reload.
    mutate: Mutex<()>,
}

impl<S: Storage> Repository<S> {
    /// A repository with the default descriptor parser and extractors and
    /// no extensions.
    pub fn new(storage: S) -> Self {
        Self::with_collaborators(
            storage,
            Box::new(JsonManifestParser),
            Box::new(ArchiveExtractorImpl::new()),
            Vec::new(),
        )
    }

    /// A repository with host-supplied collaborators.
    pub fn with_collaborators(
        storage: S,
        parser: Box<dyn ManifestParser>,
        extractor: Box<dyn ArchiveExtractor>,
        extensions: Vec<Arc<dyn Extension>>,
    ) -> Self {
        Repository {
            storage,
            parser,
            extractor,
            injected: extensions,
            extensions: RwLock::new(Vec::new()),
            index: RwLock::new(PackageIndex::new()),
            mutate: Mutex::new(()),
        }
    }

    /// The storage this repository is based upon.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Initialise the repository: register the injected extensions, then
    /// load every package the storage reports.
    ///
    /// Per-package load faults are collected and returned, never fatal;
    /// everything that did load stays usable.
    pub fn init(&self) -> Vec<Error> {
        let mut faults = Vec::new();
        for ext in &self.injected {
            if let Err(e) = self.register_extension(ext.clone()) {
                faults.push(e);
            }
        }
        let _guard = self.mutate.lock().unwrap();
        faults.extend(self.load_packages());
        faults
    }

    /// Clear the in-memory index and load again from storage. Extensions
    /// stay registered.
    pub fn reload(&self) -> Vec<Error> {
        let _guard = self.mutate.lock().unwrap();
        self.index.write().unwrap().clear();
        self.load_packages()
    }

    /// Register an extension. Idempotent by name: re-registering an
    /// existing name is a silent no-op. The first registration invokes the
    /// extension's `init` with the packages installed so far.
    pub fn register_extension(&self, ext: Arc<dyn Extension>) -> Result<()> {
        {
            let mut extensions = self.extensions.write().unwrap();
            if extensions.iter().any(|e| e.name() == ext.name()) {
                return Ok(());
            }
            extensions.push(ext.clone());
        }
        let index = self.index.read().unwrap();
        ext.init(&index).map_err(|e| Error::Extension {
            name: ext.name().to_string(),
            message: e.to_string(),
        })
    }

    /// A read view of the installed-package index.
    ///
    /// Hold the guard while resolving through a [`Package`] so the index
    /// cannot shift underneath.
    pub fn packages(&self) -> RwLockReadGuard<'_, PackageIndex> {
        self.index.read().unwrap()
    }

    /// A snapshot of all installed versions of one package.
    pub fn package_set(&self, name: &str) -> Option<Vec<Arc<Package>>> {
        let index = self.index.read().unwrap();
        index.get(name).map(|set| set.packages().to_vec())
    }

    /// A snapshot of every installed package.
    pub fn list_packages(&self) -> Vec<Arc<Package>> {
        let index = self.index.read().unwrap();
        index
            .sets()
            .flat_map(|set| set.packages().iter().cloned())
            .collect()
    }

    /// Resolve an href in the whole repository, taking the latest version
    /// of each installed package. No cross-package ordering is guaranteed
    /// when two unrelated packages declare the same href.
    pub fn resolve(&self, href: &str, space: ContentSpace) -> Result<Option<Content>> {
        debug!("repository, resolve in {space}: '{href}'");
        let index = self.index.read().unwrap();
        for set in index.sets() {
            if let Some(pkg) = set.latest()
                && let Some(content) = pkg.resolve(&index, href, space, true)?
            {
                return Ok(Some(content));
            }
        }
        Ok(None)
    }

    /// Install a package archive.
    ///
    /// With `force`, a same-name-and-version package already installed is
    /// replaced; without it, that situation fails with
    /// [`Error::AlreadyInstalled`] unless the interaction strategy answers
    /// the override question with yes.
    #[tracing::instrument(skip(self, source, interact))]
    pub fn install_package(
        &self,
        source: &dyn ArchiveSource,
        force: bool,
        interact: &dyn InteractionStrategy,
    ) -> Result<Arc<Package>> {
        if !source.is_valid() {
            return Err(Error::storage(format!(
                "package archive cannot be read ({})",
                source.uri()
            )));
        }
        if self.storage.is_read_only() {
            return Err(Error::storage(
                "the storage is read-only, package install not supported",
            ));
        }
        self.storage.before_install(force, interact)?;

        let scratch = self.storage.make_scratch_dir("install")?;
        match self.install_in_scratch(source, force, interact, &scratch) {
            Ok(pkg) => Ok(pkg),
            Err(e) => {
                // a failed install must not leave its scratch dir behind
                if let Err(cleanup) = self.storage.discard_scratch(&scratch) {
                    warn!("failed to discard scratch dir {scratch:?}: {cleanup}");
                }
                Err(e)
            }
        }
    }

    fn install_in_scratch(
        &self,
        source: &dyn ArchiveSource,
        force: bool,
        interact: &dyn InteractionStrategy,
        scratch: &Path,
    ) -> Result<Arc<Package>> {
        self.extractor.unpack(source, scratch)?;
        interact.log_info(&format!("Package unpacked to {}", scratch.display()));

        let manifest_path = scratch.join(self.parser.manifest_name());
        if !manifest_path.exists() {
            return Err(Error::Manifest(format!(
                "package descriptor does not exist in: {}",
                scratch.display()
            )));
        }
        let mut manifest = fs::File::open(&manifest_path).map_err(|e| {
            Error::storage_io(format!("failed to open {}", manifest_path.display()), e)
        })?;
        let mut pkg = self.parser.parse(&mut manifest, None, &self.storage)?;

        let guard = self.mutate.lock().unwrap();

        let previous = {
            let index = self.index.read().unwrap();
            index
                .get(pkg.name())
                .and_then(|set| set.version(pkg.version_str()))
                .cloned()
        };
        if let Some(previous) = previous {
            let prompt = format!("Force override {} - {}?", pkg.name(), pkg.version_str());
            if force || interact.ask(&prompt, false)? {
                self.storage.remove(&previous)?;
                self.index
                    .write()
                    .unwrap()
                    .remove(previous.name(), previous.version_str());
            } else {
                return Err(Error::AlreadyInstalled {
                    name: pkg.name().to_string(),
                    version: pkg.version_str().to_string(),
                });
            }
        }

        let key = self.find_free_key(pkg.abbrev(), pkg.version_str())?;
        let resolver = self.storage.commit(scratch.to_path_buf(), &key, &pkg)?;
        pkg.set_resolver(resolver);

        let pkg = Arc::new(pkg);
        self.index.write().unwrap().add(pkg.clone())?;
        self.storage.record_installed(&pkg)?;
        drop(guard);

        // a hook failure is reported but never rolls the install back
        for fault in self.notify_installed(&pkg) {
            warn!("extension install hook failed: {fault}");
        }
        Ok(pkg)
    }

    /// First free storage key for the package: the bare `abbrev-version`,
    /// then numeric suffixes up to `__99`.
    fn find_free_key(&self, abbrev: &str, version: &str) -> Result<String> {
        let base = format!("{abbrev}-{version}");
        if !self.storage.key_exists(&base)? {
            return Ok(base);
        }
        for i in 1..100u32 {
            let key = format!("{base}__{i}");
            if !self.storage.key_exists(&key)? {
                return Ok(key);
            }
        }
        Err(Error::storage(format!(
            "impossible to find a free package key in the repository, stopped at: {base}__99"
        )))
    }

    /// Remove an installed package, by name or by name and version.
    ///
    /// Returns false when the user vetoed the removal, or when the package
    /// is absent and `force` is set. A name-only removal with several
    /// versions installed fails with [`Error::AmbiguousRemoval`].
    #[tracing::instrument(skip(self, interact))]
    pub fn remove_package(
        &self,
        name: &str,
        version: Option<&str>,
        force: bool,
        interact: &dyn InteractionStrategy,
    ) -> Result<bool> {
        let prompt = match version {
            Some(v) => format!("Remove package {name}, version {v}?"),
            None => format!("Remove package {name}?"),
        };
        if !interact.ask(&prompt, true)? {
            return Ok(false);
        }

        let _guard = self.mutate.lock().unwrap();
        let target = {
            let index = self.index.read().unwrap();
            let Some(set) = index.get(name) else {
                if force {
                    return Ok(false);
                }
                return Err(Error::NotInstalled {
                    name: name.to_string(),
                    version: version.map(String::from),
                });
            };
            match version {
                Some(v) => match set.version(v) {
                    Some(pkg) => pkg.clone(),
                    None => {
                        if force {
                            return Ok(false);
                        }
                        return Err(Error::NotInstalled {
                            name: name.to_string(),
                            version: Some(v.to_string()),
                        });
                    }
                },
                None => {
                    if set.len() != 1 {
                        return Err(Error::AmbiguousRemoval {
                            name: name.to_string(),
                        });
                    }
                    match set.latest() {
                        Some(pkg) => pkg.clone(),
                        None => return Ok(false),
                    }
                }
            }
        };
        self.storage.remove(&target)?;
        self.index
            .write()
            .unwrap()
            .remove(target.name(), target.version_str());
        Ok(true)
    }

    /// Load every package the storage enumerates, collecting per-package
    /// faults. Expects the mutation lock to be held.
    fn load_packages(&self) -> Vec<Error> {
        let mut faults = Vec::new();
        let dirs = match self.storage.installed_directories() {
            Ok(dirs) => dirs,
            Err(e) => {
                faults.push(e);
                return faults;
            }
        };
        for dir in dirs {
            match self.load_one(&dir) {
                Ok(pkg) => faults.extend(self.notify_installed(&pkg)),
                Err(e) => faults.push(e),
            }
        }
        faults
    }

    fn load_one(&self, dir: &str) -> Result<Arc<Package>> {
        debug!("loading package from directory '{dir}'");
        let probe = self.storage.make_resolver(Some(dir.to_string()), None)?;
        let manifest = match probe.resolve_resource(self.parser.manifest_name()) {
            Ok(content) => content,
            Err(e) if e.is_not_found() => {
                return Err(Error::Manifest(format!(
                    "package descriptor does not exist in: {dir}"
                )));
            }
            Err(e) => return Err(e),
        };
        let pkg = self
            .parser
            .parse(&mut manifest.into_reader(), Some(dir), &self.storage)?;
        let pkg = Arc::new(pkg);
        self.index.write().unwrap().add(pkg.clone())?;
        Ok(pkg)
    }

    /// Announce a package to every registered extension; failures become
    /// collected faults.
    fn notify_installed(&self, pkg: &Arc<Package>) -> Vec<Error> {
        let extensions = self.extensions.read().unwrap().clone();
        let index = self.index.read().unwrap();
        extensions
            .iter()
            .filter_map(|ext| {
                ext.install(&index, pkg).err().map(|e| Error::Extension {
                    name: ext.name().to_string(),
                    message: e.to_string(),
                })
            })
            .collect()
    }
}
