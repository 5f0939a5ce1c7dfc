//! Semantic version parsing and ordering for packages.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A parsed semantic version: a numeric triple with an optional pre-release
/// identifier sequence and optional build metadata.
///
/// Build metadata is kept for display but ignored by the ordering and by
/// equality, so `1.2.3` and `1.2.3+nightly` compare equal. A release version
/// always outranks any pre-release of the same triple.
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    raw: String,
    major: u64,
    minor: u64,
    patch: u64,
    prerelease: Vec<Identifier>,
}

/// One dot-separated pre-release identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Identifier {
    Number(u64),
    Text(String),
}

impl SemanticVersion {
    /// Parse a version string.
    ///
    /// All three numeric components are required; fails with
    /// [`Error::MalformedVersion`] when one is missing or non-numeric, or
    /// when a pre-release or build identifier is empty.
    pub fn parse(input: &str) -> Result<Self> {
        let malformed = || Error::MalformedVersion(input.to_string());

        let (version, build) = match input.split_once('+') {
            Some((v, b)) => (v, Some(b)),
            None => (input, None),
        };
        if let Some(build) = build
            && (build.is_empty() || build.split('.').any(str::is_empty))
        {
            return Err(malformed());
        }

        let (triple, pre) = match version.split_once('-') {
            Some((t, p)) => (t, Some(p)),
            None => (version, None),
        };

        let mut numbers = triple.split('.');
        let major = parse_component(numbers.next(), input)?;
        let minor = parse_component(numbers.next(), input)?;
        let patch = parse_component(numbers.next(), input)?;
        if numbers.next().is_some() {
            return Err(malformed());
        }

        let prerelease = match pre {
            None => Vec::new(),
            Some(pre) => pre
                .split('.')
                .map(|id| {
                    if id.is_empty() {
                        return Err(malformed());
                    }
                    if id.bytes().all(|b| b.is_ascii_digit()) {
                        // digit runs too long for u64 fall back to text ordering
                        Ok(id
                            .parse::<u64>()
                            .map_or_else(|_| Identifier::Text(id.to_string()), Identifier::Number))
                    } else {
                        Ok(Identifier::Text(id.to_string()))
                    }
                })
                .collect::<Result<Vec<_>>>()?,
        };

        Ok(SemanticVersion {
            raw: input.to_string(),
            major,
            minor,
            patch,
            prerelease,
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Whether this version carries pre-release identifiers.
    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// The original version text, unchanged.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn parse_component(component: Option<&str>, input: &str) -> Result<u64> {
    let component = component.ok_or_else(|| Error::MalformedVersion(input.to_string()))?;
    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::MalformedVersion(input.to_string()));
    }
    component
        .parse()
        .map_err(|_| Error::MalformedVersion(input.to_string()))
}

fn compare_prerelease(a: &[Identifier], b: &[Identifier]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        // a release outranks any pre-release of the same triple
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            for (x, y) in a.iter().zip(b) {
                let ord = match (x, y) {
                    (Identifier::Number(m), Identifier::Number(n)) => m.cmp(n),
                    // numeric identifiers rank below alphanumeric ones
                    (Identifier::Number(_), Identifier::Text(_)) => Ordering::Less,
                    (Identifier::Text(_), Identifier::Number(_)) => Ordering::Greater,
                    (Identifier::Text(s), Identifier::Text(t)) => s.cmp(t),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.len().cmp(&b.len())
        }
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| compare_prerelease(&self.prerelease, &other.prerelease))
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for SemanticVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SemanticVersion::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        SemanticVersion::parse(s).unwrap()
    }

    #[test]
    fn test_parse_plain_triple() {
        let version = v("1.2.3");
        assert_eq!(version.major(), 1);
        assert_eq!(version.minor(), 2);
        assert_eq!(version.patch(), 3);
        assert!(!version.is_prerelease());
        assert_eq!(version.to_string(), "1.2.3");
    }

    #[test]
    fn test_parse_prerelease_and_build() {
        let version = v("1.0.0-RC1+build.5");
        assert!(version.is_prerelease());
        assert_eq!(version.as_str(), "1.0.0-RC1+build.5");
    }

    #[test]
    fn test_parse_rejects_missing_components() {
        for input in ["1", "1.2", "", "1.2.3.4"] {
            assert!(
                matches!(
                    SemanticVersion::parse(input),
                    Err(Error::MalformedVersion(_))
                ),
                "expected malformed: {input:?}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_non_numeric_components() {
        for input in ["a.2.3", "1.b.3", "1.2.c", "1..3", "-1.2.3"] {
            assert!(
                matches!(
                    SemanticVersion::parse(input),
                    Err(Error::MalformedVersion(_))
                ),
                "expected malformed: {input:?}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_empty_identifiers() {
        assert!(SemanticVersion::parse("1.2.3-").is_err());
        assert!(SemanticVersion::parse("1.2.3-rc..1").is_err());
        assert!(SemanticVersion::parse("1.2.3+").is_err());
    }

    #[test]
    fn test_order_on_numeric_triple() {
        assert!(v("1.0.0") < v("1.0.1"));
        assert!(v("1.0.9") < v("1.1.0"));
        assert!(v("1.9.9") < v("2.0.0"));
    }

    #[test]
    fn test_order_is_transitive() {
        let a = v("1.0.0-alpha");
        let b = v("1.0.0");
        let c = v("1.0.1");
        assert!(a < b && b < c);
        assert!(a < c);
    }

    #[test]
    fn test_release_outranks_prerelease_of_same_triple() {
        assert!(v("1.0.0-RC1") < v("1.0.0"));
        assert!(v("1.0.0-SNAPSHOT") < v("1.0.0"));
    }

    #[test]
    fn test_prerelease_identifier_precedence() {
        // numeric below alphanumeric, numerics compare numerically
        assert!(v("1.0.0-1") < v("1.0.0-alpha"));
        assert!(v("1.0.0-2") < v("1.0.0-10"));
        // alphanumerics compare lexically
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
        // fewer identifiers is lower when the common prefix is equal
        assert!(v("1.0.0-alpha") < v("1.0.0-alpha.1"));
    }

    #[test]
    fn test_equality_ignores_build_metadata() {
        assert_eq!(v("1.2.3"), v("1.2.3+nightly"));
        assert_eq!(v("1.2.3+a"), v("1.2.3+b"));
        assert_eq!(v("1.0.0-rc.1"), v("1.0.0-rc.1+x"));
    }

    #[test]
    fn test_max_selection() {
        let mut versions = vec![v("1.0.0"), v("0.9.0"), v("1.0.0-RC2"), v("1.0.1-alpha")];
        versions.sort();
        assert_eq!(versions.last().unwrap().as_str(), "1.0.1-alpha");
    }
}
