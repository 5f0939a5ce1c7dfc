//! Package descriptor parsing.
//!
//! The descriptor format is a collaborator concern: hosts plug their own
//! `ManifestParser` when their packages carry a different format. The
//! default parser reads a JSON descriptor, `pkg.json`, from the package
//! top level.

use std::io::Read;

use serde::Deserialize;

use crate::deps::{DependencyConstraint, PackageDependency};
use crate::error::{Error, Result};
use crate::package::Package;
use crate::space::ContentSpace;
use crate::storage::Storage;
use crate::version::SemanticVersion;

/// File name of the default JSON descriptor.
pub const MANIFEST_NAME: &str = "pkg.json";

/// Turns a package descriptor into a [`Package`] bound to a storage.
pub trait ManifestParser: Send + Sync {
    /// File name of the descriptor at the package top level.
    fn manifest_name(&self) -> &str;

    /// Parse a descriptor. `dir_hint` is the storage directory the package
    /// already lives in, when known; without it the package is left unbound
    /// until the install commits it.
    fn parse(
        &self,
        manifest: &mut dyn Read,
        dir_hint: Option<&str>,
        storage: &dyn Storage,
    ) -> Result<Package>;
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    name: String,
    abbrev: String,
    version: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    home: Option<String>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    #[serde(default)]
    processors: Vec<RawProcessor>,
    #[serde(default)]
    components: Vec<RawComponent>,
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    name: String,
    #[serde(default)]
    versions: Option<String>,
    #[serde(default)]
    semver: Option<String>,
    #[serde(default, rename = "semver-min")]
    semver_min: Option<String>,
    #[serde(default, rename = "semver-max")]
    semver_max: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProcessor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawComponent {
    space: String,
    href: String,
    file: String,
}

/// The default descriptor parser.
pub struct JsonManifestParser;

impl ManifestParser for JsonManifestParser {
    fn manifest_name(&self) -> &str {
        MANIFEST_NAME
    }

    fn parse(
        &self,
        manifest: &mut dyn Read,
        dir_hint: Option<&str>,
        storage: &dyn Storage,
    ) -> Result<Package> {
        let raw: RawManifest = serde_json::from_reader(manifest)
            .map_err(|e| Error::Manifest(format!("invalid package descriptor: {e}")))?;

        validate_required("name", &raw.name)?;
        validate_required("abbrev", &raw.abbrev)?;
        validate_required("version", &raw.version)?;
        validate_abbrev(&raw.abbrev)?;
        let version = SemanticVersion::parse(&raw.version)?;

        let abbrev_hint = dir_hint.is_some().then(|| raw.abbrev.clone());
        let resolver = storage.make_resolver(dir_hint.map(String::from), abbrev_hint)?;

        let mut pkg = Package::new(raw.name, raw.abbrev, version, resolver);
        pkg.set_title(raw.title);
        pkg.set_home(raw.home);

        for dep in raw.dependencies {
            let constraint = DependencyConstraint::from_attributes(
                dep.versions.as_deref(),
                dep.semver.as_deref(),
                dep.semver_min.as_deref(),
                dep.semver_max.as_deref(),
            )?;
            pkg.add_package_dep(PackageDependency {
                name: dep.name,
                constraint,
            });
        }
        for processor in raw.processors {
            pkg.add_processor_dep(processor.name);
        }
        for component in raw.components {
            let space: ContentSpace = component.space.parse()?;
            pkg.add_public_uri(space, &component.href, &component.file)?;
        }
        Ok(pkg)
    }
}

fn validate_required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Manifest(format!("{field} is required")));
    }
    Ok(())
}

/// The abbrev names a directory, so it must be a single path segment.
fn validate_abbrev(abbrev: &str) -> Result<()> {
    if abbrev.contains(['/', '\\']) || abbrev == "." || abbrev == ".." {
        return Err(Error::Manifest(format!(
            "abbrev is not filesystem-safe: '{abbrev}'"
        )));
    }
    Ok(())
}
