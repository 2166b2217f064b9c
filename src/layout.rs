//! Storage location resolver for the mounted data partition.
//!
//! The partition has a fixed layout:
//!
//! ```text
//! <mount point>/
//!     images/     one file per installed image
//!     data/       per-image writable directory, plus the `default` marker
//!     shared/     system-wide configuration extracted from the boot archive
//!     tmp/        scratch space and the image store lock
//! ```

use std::path::{Path, PathBuf};

use crate::error::Error;

/// Directories created on a fresh data partition, parents first.
pub const LAYOUT_DIRS: &[&str] = &[
    "images",
    "data",
    "shared",
    "shared/etc",
    "shared/etc/default",
    "tmp",
];

/// Name of the default-image marker inside `data/`.
pub const DEFAULT_MARKER: &str = "default";

const LOCK_FILENAME: &str = ".image-store.lock";

/// A mounted data partition rooted at its mount point.
#[derive(Debug, Clone)]
pub struct DataPartition {
    root: PathBuf,
}

impl DataPartition {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn shared_dir(&self) -> PathBuf {
        self.root.join("shared")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    /// Path of a file below `shared/`, e.g. `etc/timezone`.
    pub fn shared_path(&self, rel: &str) -> PathBuf {
        self.shared_dir().join(rel)
    }

    /// Image file for `name` under `images/`.
    pub fn image_path(&self, name: &str) -> Result<PathBuf, Error> {
        validate_image_name(name)?;
        Ok(self.images_dir().join(name))
    }

    /// Data directory for `name` under `data/`. It may not exist.
    pub fn data_path(&self, name: &str) -> Result<PathBuf, Error> {
        validate_image_name(name)?;
        Ok(self.data_dir().join(name))
    }

    pub fn marker_path(&self) -> PathBuf {
        self.data_dir().join(DEFAULT_MARKER)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.tmp_dir().join(LOCK_FILENAME)
    }
}

/// Check that `name` can be used as an image file name.
///
/// Names are a single visible path component. `default` is reserved because
/// its data directory would collide with the marker file.
pub fn validate_image_name(name: &str) -> Result<(), Error> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.contains('/') || name.contains('\0') {
        Some("name must be a single path component")
    } else if name.starts_with('.') {
        Some("name must not start with '.'")
    } else if name == DEFAULT_MARKER {
        Some("name is reserved for the default-image marker")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
