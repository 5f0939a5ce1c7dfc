//! Content spaces: the named resource categories hrefs are resolved in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A resource category within which public hrefs are declared and resolved.
///
/// A package maps hrefs to files per space, so the same href can name a
/// query module and a stylesheet without clashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSpace {
    /// Query modules.
    Query,
    /// Transformation stylesheets.
    Transform,
    /// Processing pipelines.
    Pipeline,
    /// Schema documents.
    Schema,
    /// Grammar definitions.
    Grammar,
    /// Anything addressed as an opaque resource.
    Resource,
}

impl ContentSpace {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSpace::Query => "query",
            ContentSpace::Transform => "transform",
            ContentSpace::Pipeline => "pipeline",
            ContentSpace::Schema => "schema",
            ContentSpace::Grammar => "grammar",
            ContentSpace::Resource => "resource",
        }
    }
}

impl fmt::Display for ContentSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentSpace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "query" => Ok(ContentSpace::Query),
            "transform" => Ok(ContentSpace::Transform),
            "pipeline" => Ok(ContentSpace::Pipeline),
            "schema" => Ok(ContentSpace::Schema),
            "grammar" => Ok(ContentSpace::Grammar),
            "resource" => Ok(ContentSpace::Resource),
            other => Err(Error::Manifest(format!("unknown content space: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_str() {
        for space in [
            ContentSpace::Query,
            ContentSpace::Transform,
            ContentSpace::Pipeline,
            ContentSpace::Schema,
            ContentSpace::Grammar,
            ContentSpace::Resource,
        ] {
            assert_eq!(space.as_str().parse::<ContentSpace>().unwrap(), space);
        }
    }

    #[test]
    fn test_unknown_space_is_a_manifest_error() {
        assert!(matches!(
            "stylesheet".parse::<ContentSpace>(),
            Err(Error::Manifest(_))
        ));
    }
}
