//! Disk space probe backed by `statvfs(3)`.
//!
//! Sizes are reported as `f64` bytes. A failed query is an
//! [`Error::Stat`], never a silent zero, so callers can tell an empty
//! filesystem from one that could not be inspected.

use std::io;
use std::path::Path;

use crate::error::Error;

/// The subset of `struct statvfs` the probe needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceStats {
    pub fragment_size: u64,
    pub block_size: u64,
    pub blocks: u64,
    pub blocks_available: u64,
}

impl SpaceStats {
    /// Query statistics for the filesystem containing `path`.
    pub fn query(path: &Path) -> Result<Self, Error> {
        let stat = rustix::fs::statvfs(path).map_err(|errno| Error::Stat {
            path: path.to_path_buf(),
            source: io::Error::from(errno),
        })?;

        Ok(Self {
            fragment_size: stat.f_frsize,
            block_size: stat.f_bsize,
            blocks: stat.f_blocks,
            blocks_available: stat.f_bavail,
        })
    }

    /// Fragment size, or block size on filesystems that report no fragment size.
    pub fn unit(&self) -> f64 {
        if self.fragment_size != 0 {
            self.fragment_size as f64
        } else {
            self.block_size as f64
        }
    }

    /// Bytes available to unprivileged users.
    pub fn available_bytes(&self) -> f64 {
        self.blocks_available as f64 * self.unit()
    }

    /// Capacity of the filesystem.
    pub fn total_bytes(&self) -> f64 {
        self.blocks as f64 * self.unit()
    }
}

/// Free space on the filesystem containing `path`.
pub fn available_bytes(path: &Path) -> Result<f64, Error> {
    Ok(SpaceStats::query(path)?.available_bytes())
}

/// Space the filesystem containing `path` occupies on its device.
///
/// This is the block count times the block unit, not a sum of file sizes.
pub fn used_bytes(path: &Path) -> Result<f64, Error> {
    total_bytes(path)
}

/// Capacity of the filesystem containing `path`.
pub fn total_bytes(path: &Path) -> Result<f64, Error> {
    Ok(SpaceStats::query(path)?.total_bytes())
}

/// Fail with [`Error::InsufficientSpace`] unless `required` bytes fit on the
/// filesystem containing `path`.
pub fn ensure_space(path: &Path, required: u64) -> Result<(), Error> {
    let available = available_bytes(path)?;
    if required as f64 > available {
        return Err(Error::InsufficientSpace {
            path: path.to_path_buf(),
            required,
            available,
        });
    }
    Ok(())
}
