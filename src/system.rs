//! External collaborators: mounting and archive extraction.
//!
//! Every call blocks until the underlying process or extraction has
//! finished, so a caller never has more than one of these in flight.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use std::process::Command;

use flate2::read::GzDecoder;

use crate::error::Error;

/// Host operations the bootstrapper depends on.
pub trait SystemOps {
    fn mount(&self, device: &Path, mount_point: &Path) -> Result<(), Error>;

    /// Unpack a gzip-compressed tarball into `dest`.
    fn extract_archive(&self, archive: &Path, dest: &Path) -> Result<(), Error>;
}

/// [`SystemOps`] on the running host: `mount(8)` as a child process
/// and in-process tarball extraction.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSystem;

impl SystemOps for HostSystem {
    fn mount(&self, device: &Path, mount_point: &Path) -> Result<(), Error> {
        tracing::debug!("mount {} {}", device.display(), mount_point.display());
        let mount_err = |reason: String| Error::Mount {
            device: device.to_path_buf(),
            mount_point: mount_point.to_path_buf(),
            reason,
        };

        let status = Command::new("mount")
            .arg(device)
            .arg(mount_point)
            .status()
            .map_err(|e| mount_err(format!("failed to run mount: {e}")))?;

        if !status.success() {
            return Err(mount_err(format!("mount exited with {status}")));
        }
        Ok(())
    }

    fn extract_archive(&self, archive: &Path, dest: &Path) -> Result<(), Error> {
        unpack_tgz(archive, dest)
    }
}

/// Unpack `archive` (`.tgz`) into `dest`, preserving permissions.
pub fn unpack_tgz(archive: &Path, dest: &Path) -> Result<(), Error> {
    let extract_err = |reason: String| Error::Extraction {
        archive: archive.to_path_buf(),
        code: None,
        reason,
    };

    fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;
    let file = File::open(archive).map_err(|e| extract_err(e.to_string()))?;

    let mut unpacker = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    unpacker.set_preserve_permissions(true);
    unpacker
        .unpack(dest)
        .map_err(|e| extract_err(e.to_string()))?;

    tracing::debug!("extracted {} into {}", archive.display(), dest.display());
    Ok(())
}
