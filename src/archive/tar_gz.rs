//! Extractor for .tar.gz archives.

use std::path::Path;

use flate2::read::GzDecoder;
use log::debug;
use tar::Archive;

use super::{ArchiveExtractor, ArchiveSource};
use crate::error::{Error, Result};

pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, uri: &str) -> bool {
        let name = uri.to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    #[tracing::instrument(skip(self, source))]
    fn unpack(&self, source: &dyn ArchiveSource, dest: &Path) -> Result<()> {
        debug!("extracting tar.gz archive to {:?}", dest);
        let reader = source.open()?;
        let decoder = GzDecoder::new(reader);
        let mut archive = Archive::new(decoder);
        archive.set_preserve_permissions(true);

        let mut unpacked = 0usize;
        let entries = archive.entries().map_err(|e| {
            Error::storage_io(format!("failed to read tar archive {}", source.uri()), e)
        })?;
        for entry in entries {
            let mut entry = entry.map_err(|e| {
                Error::storage_io(format!("failed to read tar entry in {}", source.uri()), e)
            })?;
            // unpack_in refuses paths escaping the destination
            let accepted = entry.unpack_in(dest).map_err(|e| {
                Error::storage_io(format!("failed to extract entry into {}", dest.display()), e)
            })?;
            if accepted {
                unpacked += 1;
            } else {
                debug!("skipping entry with invalid path");
            }
        }
        if unpacked == 0 {
            return Err(Error::storage(format!("archive is empty: {}", source.uri())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::BytesSource;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs;
    use tar::Builder;
    use tempfile::tempdir;

    fn create_test_archive(files: &[(&str, &str)]) -> Vec<u8> {
        let enc = GzEncoder::new(Vec::new(), Compression::default());
        let mut tar = Builder::new(enc);

        let mut header = tar::Header::new_gnu();
        for (name, content) in files {
            header.set_path(name).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append(&header, content.as_bytes()).unwrap();
        }

        tar.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_can_handle_tar_gz() {
        assert!(TarGzExtractor.can_handle("pkg.tar.gz"));
        assert!(TarGzExtractor.can_handle("pkg.tgz"));
        assert!(TarGzExtractor.can_handle("PKG.TAR.GZ"));
        assert!(!TarGzExtractor.can_handle("pkg.zip"));
    }

    #[test]
    fn test_unpack_preserves_layout() {
        let dir = tempdir().unwrap();
        let bytes = create_test_archive(&[
            ("pkg.json", "{}"),
            ("content/lib.xq", "module body"),
        ]);
        let source = BytesSource::new("test.tar.gz", bytes);

        TarGzExtractor.unpack(&source, dir.path()).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("pkg.json")).unwrap(), "{}");
        assert_eq!(
            fs::read_to_string(dir.path().join("content/lib.xq")).unwrap(),
            "module body"
        );
    }

    #[test]
    fn test_unpack_empty_archive_is_an_error() {
        let dir = tempdir().unwrap();
        let source = BytesSource::new("test.tar.gz", create_test_archive(&[]));
        assert!(TarGzExtractor.unpack(&source, dir.path()).is_err());
    }

    #[test]
    fn test_unpack_corrupted_archive_is_an_error() {
        let dir = tempdir().unwrap();
        let source = BytesSource::new("test.tar.gz", b"corrupted data".to_vec());
        assert!(TarGzExtractor.unpack(&source, dir.path()).is_err());
    }
}
