//! Error taxonomy for repository, package and storage operations.
//!
//! `NotFound` is the one recoverable variant: the storage layer raises it
//! when a path does not resolve, and the package/repository layers convert
//! it back into an empty result wherever absence is a normal answer.

use std::io;

use thiserror::Error;

use crate::space::ContentSpace;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A version string could not be parsed as a semantic version.
    #[error("Malformed version: {0}")]
    MalformedVersion(String),

    /// The package descriptor is missing, unreadable or invalid.
    #[error("Invalid package descriptor: {0}")]
    Manifest(String),

    /// An href was registered twice within the same content space.
    #[error("Public URI already exists in this package: {href} (space {space})")]
    DuplicateUri { href: String, space: ContentSpace },

    /// The same name and version is already installed.
    #[error("Same version of the package is already installed: {name}, {version}")]
    AlreadyInstalled { name: String, version: String },

    /// A name-only removal matched more than one installed version.
    #[error("The package has several versions installed: {name}")]
    AmbiguousRemoval { name: String },

    /// The named package (or the named version of it) is not installed.
    #[error("The package is not installed: {name}{}", .version.as_deref().map(|v| format!(", version {v}")).unwrap_or_default())]
    NotInstalled { name: String, version: Option<String> },

    /// A path did not resolve in any of the locations that were tried.
    #[error("Could not locate '{path}' in: {}", .locations.join(", "))]
    NotFound { path: String, locations: Vec<String> },

    /// I/O failure, permission problem or key-space exhaustion in storage.
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// A registered extension hook failed.
    #[error("Extension '{name}' failed: {message}")]
    Extension { name: String, message: String },
}

impl Error {
    /// Storage fault without an underlying I/O cause.
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Storage fault wrapping an I/O error.
    pub fn storage_io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Storage {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Whether this is the recoverable "does not resolve" signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_all_locations() {
        let err = Error::NotFound {
            path: "mod/lib.xq".into(),
            locations: vec!["/repo/pkg/content".into(), "/repo/pkg".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("mod/lib.xq"));
        assert!(msg.contains("/repo/pkg/content"));
        assert!(msg.contains("/repo/pkg"));
    }

    #[test]
    fn test_not_installed_message_with_and_without_version() {
        let err = Error::NotInstalled {
            name: "http://example.org/lib".into(),
            version: None,
        };
        assert!(!err.to_string().contains("version"));

        let err = Error::NotInstalled {
            name: "http://example.org/lib".into(),
            version: Some("1.2.0".into()),
        };
        assert!(err.to_string().contains("version 1.2.0"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(
            Error::NotFound {
                path: "x".into(),
                locations: vec![]
            }
            .is_not_found()
        );
        assert!(!Error::storage("boom").is_not_found());
    }
}
