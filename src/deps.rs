//! Dependency declarations and version constraints.

use crate::error::Result;
use crate::version::SemanticVersion;

/// A declared dependency of one package on another.
///
/// `constraint` is absent when the descriptor declares no version
/// attributes, in which case any installed version is acceptable.
#[derive(Debug, Clone)]
pub struct PackageDependency {
    pub name: String,
    pub constraint: Option<DependencyConstraint>,
}

/// A version constraint attached to a dependency declaration.
///
/// Closed set of variants dispatched by pattern match. All semver bounds
/// are inclusive; the pre-release precedence of [`SemanticVersion`] applies
/// throughout, so a release candidate can exceed a pre-release upper bound
/// even at the same numeric triple.
#[derive(Debug, Clone)]
pub enum DependencyConstraint {
    /// Literal membership in an explicit version list; no parsing at all.
    ExactList(Vec<String>),
    /// Exact semantic-version equality (build metadata ignored).
    Exact(SemanticVersion),
    /// Inclusive lower bound.
    Min(SemanticVersion),
    /// Inclusive upper bound.
    Max(SemanticVersion),
    /// Inclusive range.
    Range {
        min: SemanticVersion,
        max: SemanticVersion,
    },
}

impl DependencyConstraint {
    pub fn exact_list<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DependencyConstraint::ExactList(versions.into_iter().map(Into::into).collect())
    }

    pub fn exact(version: &str) -> Result<Self> {
        Ok(DependencyConstraint::Exact(SemanticVersion::parse(version)?))
    }

    pub fn min(version: &str) -> Result<Self> {
        Ok(DependencyConstraint::Min(SemanticVersion::parse(version)?))
    }

    pub fn max(version: &str) -> Result<Self> {
        Ok(DependencyConstraint::Max(SemanticVersion::parse(version)?))
    }

    pub fn range(min: &str, max: &str) -> Result<Self> {
        Ok(DependencyConstraint::Range {
            min: SemanticVersion::parse(min)?,
            max: SemanticVersion::parse(max)?,
        })
    }

    /// Build a constraint from the four descriptor attributes.
    ///
    /// `versions` is a whitespace-separated literal list; `semver` alone is
    /// an exact match; one or both bounds select min/max/range. All absent
    /// means unconstrained, so `None` is returned.
    pub fn from_attributes(
        versions: Option<&str>,
        semver: Option<&str>,
        semver_min: Option<&str>,
        semver_max: Option<&str>,
    ) -> Result<Option<Self>> {
        if let Some(list) = versions {
            return Ok(Some(Self::exact_list(list.split_whitespace())));
        }
        if let Some(version) = semver {
            return Ok(Some(Self::exact(version)?));
        }
        match (semver_min, semver_max) {
            (Some(min), Some(max)) => Ok(Some(Self::range(min, max)?)),
            (Some(min), None) => Ok(Some(Self::min(min)?)),
            (None, Some(max)) => Ok(Some(Self::max(max)?)),
            (None, None) => Ok(None),
        }
    }

    /// Test whether a candidate version satisfies this constraint.
    ///
    /// Semver-based variants fail with [`Error::MalformedVersion`] when the
    /// candidate does not parse; the exact-list variant never parses.
    pub fn is_compatible(&self, candidate: &str) -> Result<bool> {
        match self {
            DependencyConstraint::ExactList(list) => Ok(list.iter().any(|v| v == candidate)),
            DependencyConstraint::Exact(target) => {
                Ok(SemanticVersion::parse(candidate)? == *target)
            }
            DependencyConstraint::Min(min) => Ok(SemanticVersion::parse(candidate)? >= *min),
            DependencyConstraint::Max(max) => Ok(SemanticVersion::parse(candidate)? <= *max),
            DependencyConstraint::Range { min, max } => {
                let candidate = SemanticVersion::parse(candidate)?;
                Ok(candidate >= *min && candidate <= *max)
            }
        }
    }
}
