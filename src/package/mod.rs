//! Installed packages and their content-resolution logic.

mod set;

pub use set::{PackageIndex, PackageSet};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use log::debug;

use crate::deps::PackageDependency;
use crate::error::{Error, Result};
use crate::extension::PackageInfo;
use crate::space::ContentSpace;
use crate::storage::{Content, PackageResolver};
use crate::version::SemanticVersion;

/// One particular package, with one particular version.
///
/// A package owns exactly one resolver into its storage location, its
/// declared public-href maps per content space, and the metadata sidecars
/// extensions have attached to it.
pub struct Package {
    name: String,
    abbrev: String,
    version: SemanticVersion,
    title: Option<String>,
    home: Option<String>,
    pkg_deps: Vec<PackageDependency>,
    proc_deps: Vec<String>,
    public_uris: BTreeMap<ContentSpace, BTreeMap<String, String>>,
    // sidecars are asked in registration order, so no map here
    infos: RwLock<Vec<Arc<dyn PackageInfo>>>,
    resolver: Box<dyn PackageResolver>,
}

impl Package {
    pub fn new(
        name: impl Into<String>,
        abbrev: impl Into<String>,
        version: SemanticVersion,
        resolver: Box<dyn PackageResolver>,
    ) -> Self {
        Package {
            name: name.into(),
            abbrev: abbrev.into(),
            version,
            title: None,
            home: None,
            pkg_deps: Vec::new(),
            proc_deps: Vec::new(),
            public_uris: BTreeMap::new(),
            infos: RwLock::new(Vec::new()),
            resolver,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filesystem-safe short name, matching the content directory of
    /// legacy-layout packages.
    pub fn abbrev(&self) -> &str {
        &self.abbrev
    }

    pub fn version(&self) -> &SemanticVersion {
        &self.version
    }

    /// The version exactly as the descriptor declared it.
    pub fn version_str(&self) -> &str {
        self.version.as_str()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    pub fn home(&self) -> Option<&str> {
        self.home.as_deref()
    }

    pub fn set_home(&mut self, home: Option<String>) {
        self.home = home;
    }

    pub fn resolver(&self) -> &dyn PackageResolver {
        self.resolver.as_ref()
    }

    /// Rebind the package to its final storage location after commit.
    pub fn set_resolver(&mut self, resolver: Box<dyn PackageResolver>) {
        self.resolver = resolver;
    }

    pub fn package_deps(&self) -> &[PackageDependency] {
        &self.pkg_deps
    }

    pub fn add_package_dep(&mut self, dep: PackageDependency) {
        self.pkg_deps.push(dep);
    }

    pub fn processor_deps(&self) -> &[String] {
        &self.proc_deps
    }

    pub fn add_processor_dep(&mut self, name: impl Into<String>) {
        self.proc_deps.push(name.into());
    }

    /// Declare a public href mapping to a file relative to the content
    /// directory. Within one space an href maps to at most one file.
    pub fn add_public_uri(
        &mut self,
        space: ContentSpace,
        href: &str,
        relative: &str,
    ) -> Result<()> {
        debug!(
            "package '{}', add URI in {space}: '{href}', mapped to '{relative}'",
            self.name
        );
        let map = self.public_uris.entry(space).or_default();
        if map.contains_key(href) {
            return Err(Error::DuplicateUri {
                href: href.to_string(),
                space,
            });
        }
        map.insert(href.to_string(), relative.to_string());
        Ok(())
    }

    /// The sidecar registered under `name`, if any.
    pub fn get_info(&self, name: &str) -> Option<Arc<dyn PackageInfo>> {
        self.infos
            .read()
            .unwrap()
            .iter()
            .find(|info| info.name() == name)
            .cloned()
    }

    /// Attach a sidecar; fails if one is already registered under its name.
    pub fn add_info(&self, info: Arc<dyn PackageInfo>) -> Result<()> {
        let mut infos = self.infos.write().unwrap();
        if infos.iter().any(|i| i.name() == info.name()) {
            return Err(Error::Extension {
                name: info.name().to_string(),
                message: "sidecar already set".to_string(),
            });
        }
        infos.push(info);
        Ok(())
    }

    /// Attach a sidecar, replacing any previous one under the same name.
    pub fn set_info(&self, info: Arc<dyn PackageInfo>) {
        let mut infos = self.infos.write().unwrap();
        if let Some(existing) = infos.iter_mut().find(|i| i.name() == info.name()) {
            *existing = info;
        } else {
            infos.push(info);
        }
    }

    /// Resolve an href in this package alone: sidecars first, in
    /// registration order, then the package's own declared map.
    fn resolve_local(&self, href: &str, space: ContentSpace) -> Result<Option<Content>> {
        let infos = self.infos.read().unwrap().clone();
        for info in &infos {
            if let Some(content) = info.resolve(href, space)? {
                return Ok(Some(content));
            }
        }

        let Some(map) = self.public_uris.get(&space) else {
            debug!("package '{}', no URI in {space}", self.name);
            return Ok(None);
        };
        let Some(relative) = map.get(href) else {
            debug!("package '{}', not in {space}: '{href}'", self.name);
            return Ok(None);
        };
        debug!(
            "package '{}', resolved '{href}' in {space} to '{relative}'",
            self.name
        );
        match self.resolver.resolve_component(relative) {
            Ok(content) => Ok(Some(content)),
            // the descriptor declares a file the storage does not have
            Err(Error::NotFound { .. }) => Err(Error::storage(format!(
                "component '{relative}' is declared by package '{}' but missing from storage",
                self.name
            ))),
            Err(e) => Err(e),
        }
    }

    /// Resolve an href in this package, and — when `transitive` — in its
    /// declared dependencies, in declaration order.
    ///
    /// A dependency contributes only the latest installed version of the
    /// named package, and only when the declared constraint accepts that
    /// version. Absence is a normal `Ok(None)` at every level.
    pub fn resolve(
        &self,
        index: &PackageIndex,
        href: &str,
        space: ContentSpace,
        transitive: bool,
    ) -> Result<Option<Content>> {
        let mut visited = Vec::new();
        self.resolve_inner(index, href, space, transitive, &mut visited)
    }

    fn resolve_inner(
        &self,
        index: &PackageIndex,
        href: &str,
        space: ContentSpace,
        transitive: bool,
        visited: &mut Vec<String>,
    ) -> Result<Option<Content>> {
        debug!(
            "package '{}', resolve in {space}: '{href}' (transitive: {transitive})",
            self.name
        );
        if let Some(content) = self.resolve_local(href, space)? {
            return Ok(Some(content));
        }
        if !transitive {
            return Ok(None);
        }
        visited.push(self.name.clone());
        for dep in &self.pkg_deps {
            // dependency cycles terminate here
            if visited.iter().any(|name| *name == dep.name) {
                continue;
            }
            let Some(target) = resolve_dependency(index, dep)? else {
                // an unsatisfied dependency is skipped, not an error
                continue;
            };
            if let Some(content) = target.resolve_inner(index, href, space, true, visited)? {
                return Ok(Some(content));
            }
        }
        Ok(None)
    }
}

/// The latest installed version of the depended-on package, if the
/// dependency's constraint accepts it.
fn resolve_dependency<'a>(
    index: &'a PackageIndex,
    dep: &PackageDependency,
) -> Result<Option<&'a Arc<Package>>> {
    let Some(set) = index.get(&dep.name) else {
        return Ok(None);
    };
    let Some(latest) = set.latest() else {
        return Ok(None);
    };
    match &dep.constraint {
        None => Ok(Some(latest)),
        Some(constraint) => {
            if constraint.is_compatible(latest.version_str())? {
                Ok(Some(latest))
            } else {
                Ok(None)
            }
        }
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("name", &self.name)
            .field("abbrev", &self.abbrev)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
