//! Version sets and the installed-package index.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use super::Package;

/// All installed versions sharing one package name.
///
/// No two members ever share the same version value.
pub struct PackageSet {
    name: String,
    packages: Vec<Arc<Package>>,
}

impl PackageSet {
    pub fn new(name: impl Into<String>) -> Self {
        PackageSet {
            name: name.into(),
            packages: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a version to the set; fails if that version is already present.
    pub fn add(&mut self, pkg: Arc<Package>) -> Result<()> {
        if self.version(pkg.version_str()).is_some() {
            return Err(Error::AlreadyInstalled {
                name: self.name.clone(),
                version: pkg.version_str().to_string(),
            });
        }
        self.packages.push(pkg);
        Ok(())
    }

    /// Remove a version from the set, returning it when it was present.
    pub fn remove(&mut self, version: &str) -> Option<Arc<Package>> {
        let position = self.packages.iter().position(|p| p.version_str() == version)?;
        Some(self.packages.remove(position))
    }

    /// The member with the highest semantic version, if any.
    pub fn latest(&self) -> Option<&Arc<Package>> {
        self.packages.iter().max_by(|a, b| a.version().cmp(b.version()))
    }

    /// The member with exactly this version string, if any.
    pub fn version(&self, version: &str) -> Option<&Arc<Package>> {
        self.packages.iter().find(|p| p.version_str() == version)
    }

    pub fn packages(&self) -> &[Arc<Package>] {
        &self.packages
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// The in-memory index of installed packages, keyed by package name.
pub struct PackageIndex {
    sets: BTreeMap<String, PackageSet>,
}

impl PackageIndex {
    pub(crate) fn new() -> Self {
        PackageIndex {
            sets: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PackageSet> {
        self.sets.get(name)
    }

    pub fn sets(&self) -> impl Iterator<Item = &PackageSet> {
        self.sets.values()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.sets.clear();
    }

    /// Index a package into its set, creating the set if it is new.
    pub(crate) fn add(&mut self, pkg: Arc<Package>) -> Result<()> {
        self.sets
            .entry(pkg.name().to_string())
            .or_insert_with(|| PackageSet::new(pkg.name()))
            .add(pkg)
    }

    /// Drop a version, and its whole set once the last version is gone.
    pub(crate) fn remove(&mut self, name: &str, version: &str) -> Option<Arc<Package>> {
        let set = self.sets.get_mut(name)?;
        let removed = set.remove(version)?;
        if set.is_empty() {
            self.sets.remove(name);
        }
        Some(removed)
    }
}
