//! Extractor for .zip archives.

use std::fs;
use std::path::Path;

use log::debug;
use zip::ZipArchive;

use super::{ArchiveExtractor, ArchiveSource};
use crate::error::{Error, Result};

pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn can_handle(&self, uri: &str) -> bool {
        uri.to_lowercase().ends_with(".zip")
    }

    #[tracing::instrument(skip(self, source))]
    fn unpack(&self, source: &dyn ArchiveSource, dest: &Path) -> Result<()> {
        debug!("extracting zip archive to {:?}", dest);
        let reader = source.open()?;
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::storage(format!("failed to parse zip archive {}: {e}", source.uri())))?;
        if archive.len() == 0 {
            return Err(Error::storage(format!("archive is empty: {}", source.uri())));
        }

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| Error::storage(format!("failed to read zip entry {i}: {e}")))?;

            let Some(entry_path) = entry.enclosed_name() else {
                debug!("skipping entry with invalid path");
                continue;
            };
            let full_path = dest.join(entry_path);

            if entry.is_dir() {
                fs::create_dir_all(&full_path).map_err(|e| {
                    Error::storage_io(format!("failed to create {}", full_path.display()), e)
                })?;
            } else {
                if let Some(parent) = full_path.parent() {
                    fs::create_dir_all(parent).map_err(|e| {
                        Error::storage_io(format!("failed to create {}", parent.display()), e)
                    })?;
                }
                let mut dest_file = fs::File::create(&full_path).map_err(|e| {
                    Error::storage_io(format!("failed to create {}", full_path.display()), e)
                })?;
                std::io::copy(&mut entry, &mut dest_file).map_err(|e| {
                    Error::storage_io(format!("failed to extract {}", full_path.display()), e)
                })?;

                // carry over file permissions from the archive metadata
                #[cfg(unix)]
                if let Some(mode) = entry.unix_mode() {
                    use std::os::unix::fs::PermissionsExt;
                    if let Err(e) =
                        fs::set_permissions(&full_path, fs::Permissions::from_mode(mode))
                    {
                        debug!("failed to set permissions on {:?}: {e}", full_path);
                    }
                }
            }
        }
        Ok(())
    }
}
