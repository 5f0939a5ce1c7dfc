//! The two redundant installed-package listings in the private metadata
//! directory.
//!
//! `packages.txt` holds one directory name per line and is what fast
//! enumeration reads; `packages.json` carries the full (name, version,
//! directory) records. Both are rewritten on every install and removal,
//! with no cross-file transaction.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One record of the structured listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ListedPackage {
    pub name: String,
    pub version: String,
    pub dir: String,
}

/// Line-oriented listing of installed directory names.
pub(crate) struct PackagesTxtFile {
    path: PathBuf,
}

impl PackagesTxtFile {
    pub fn new(path: PathBuf) -> Self {
        PackagesTxtFile { path }
    }

    /// All listed directory names; an absent file reads as empty.
    pub fn directories(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| {
            Error::storage_io(format!("failed to read {}", self.path.display()), e)
        })?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    pub fn add(&self, dir: &str) -> Result<()> {
        let mut dirs = self.directories()?;
        if !dirs.iter().any(|d| d == dir) {
            dirs.push(dir.to_string());
        }
        self.write(&dirs)
    }

    pub fn remove(&self, dir: &str) -> Result<()> {
        let mut dirs = self.directories()?;
        dirs.retain(|d| d != dir);
        self.write(&dirs)
    }

    fn write(&self, dirs: &[String]) -> Result<()> {
        let mut text = dirs.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        write_atomically(&self.path, text.as_bytes())
    }
}

/// Structured listing with one record per installed package.
pub(crate) struct PackagesJsonFile {
    path: PathBuf,
}

impl PackagesJsonFile {
    pub fn new(path: PathBuf) -> Self {
        PackagesJsonFile { path }
    }

    /// All listed records; an absent file reads as empty.
    pub fn packages(&self) -> Result<Vec<ListedPackage>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| {
            Error::storage_io(format!("failed to read {}", self.path.display()), e)
        })?;
        serde_json::from_str(&text)
            .map_err(|e| Error::storage(format!("corrupt listing {}: {e}", self.path.display())))
    }

    pub fn add(&self, entry: ListedPackage) -> Result<()> {
        let mut packages = self.packages()?;
        packages.retain(|p| p.dir != entry.dir);
        packages.push(entry);
        self.write(&packages)
    }

    pub fn remove_by_dir(&self, dir: &str) -> Result<()> {
        let mut packages = self.packages()?;
        packages.retain(|p| p.dir != dir);
        self.write(&packages)
    }

    fn write(&self, packages: &[ListedPackage]) -> Result<()> {
        let text = serde_json::to_string_pretty(packages)
            .map_err(|e| Error::storage(format!("failed to serialize package listing: {e}")))?;
        write_atomically(&self.path, text.as_bytes())
    }
}

/// Rewrite a listing through a temporary file in the same directory, so a
/// crash never leaves a half-written listing behind.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::storage(format!("listing has no parent directory: {}", path.display())))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
        Error::storage_io(format!("failed to create temp file in {}", parent.display()), e)
    })?;
    tmp.write_all(contents)
        .map_err(|e| Error::storage_io(format!("failed to write {}", path.display()), e))?;
    tmp.persist(path)
        .map_err(|e| Error::storage_io(format!("failed to replace {}", path.display()), e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(name: &str, version: &str, dir: &str) -> ListedPackage {
        ListedPackage {
            name: name.into(),
            version: version.into(),
            dir: dir.into(),
        }
    }

    #[test]
    fn test_txt_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let txt = PackagesTxtFile::new(dir.path().join("packages.txt"));
        assert!(txt.directories().unwrap().is_empty());
    }

    #[test]
    fn test_txt_add_and_remove() {
        let dir = tempdir().unwrap();
        let txt = PackagesTxtFile::new(dir.path().join("packages.txt"));

        txt.add("functx-1.0.0").unwrap();
        txt.add("crypto-0.5.0").unwrap();
        assert_eq!(txt.directories().unwrap(), vec!["functx-1.0.0", "crypto-0.5.0"]);

        // adding the same directory twice keeps a single line
        txt.add("functx-1.0.0").unwrap();
        assert_eq!(txt.directories().unwrap().len(), 2);

        txt.remove("functx-1.0.0").unwrap();
        assert_eq!(txt.directories().unwrap(), vec!["crypto-0.5.0"]);
    }

    #[test]
    fn test_txt_ignores_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packages.txt");
        fs::write(&path, "a-1.0.0\n\n  \nb-2.0.0\n").unwrap();
        let txt = PackagesTxtFile::new(path);
        assert_eq!(txt.directories().unwrap(), vec!["a-1.0.0", "b-2.0.0"]);
    }

    #[test]
    fn test_json_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let json = PackagesJsonFile::new(dir.path().join("packages.json"));
        assert!(json.packages().unwrap().is_empty());
    }

    #[test]
    fn test_json_add_and_remove() {
        let dir = tempdir().unwrap();
        let json = PackagesJsonFile::new(dir.path().join("packages.json"));

        json.add(entry("http://example.org/functx", "1.0.0", "functx-1.0.0"))
            .unwrap();
        json.add(entry("http://example.org/crypto", "0.5.0", "crypto-0.5.0"))
            .unwrap();
        assert_eq!(json.packages().unwrap().len(), 2);

        json.remove_by_dir("functx-1.0.0").unwrap();
        let packages = json.packages().unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].dir, "crypto-0.5.0");
    }

    #[test]
    fn test_json_add_replaces_record_for_same_dir() {
        let dir = tempdir().unwrap();
        let json = PackagesJsonFile::new(dir.path().join("packages.json"));

        json.add(entry("http://example.org/functx", "1.0.0", "functx-1.0.0"))
            .unwrap();
        json.add(entry("http://example.org/other", "2.0.0", "functx-1.0.0"))
            .unwrap();

        let packages = json.packages().unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "http://example.org/other");
    }

    #[test]
    fn test_json_corrupt_file_is_a_storage_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packages.json");
        fs::write(&path, "not json").unwrap();
        let json = PackagesJsonFile::new(path);
        assert!(matches!(json.packages(), Err(Error::Storage { .. })));
    }
}
