//! Image mutator: rename, clone and delete installed images.
//!
//! Every mutation runs under the image store lock and leaves the default
//! image register consistent with the catalog. Sub-steps that fail after
//! the point of no return are reported per path, not rolled back.

use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::Path;

use walkdir::WalkDir;

use crate::catalog::{self, Catalog};
use crate::default_image;
use crate::diskspace;
use crate::error::{Error, OperationReport};
use crate::layout::DataPartition;
use crate::lock::StoreLock;

/// Entry point for catalog queries and mutations on one data partition.
#[derive(Debug, Clone)]
pub struct ImageManager {
    partition: DataPartition,
}

impl ImageManager {
    pub fn new(partition: DataPartition) -> Self {
        Self { partition }
    }

    pub fn partition(&self) -> &DataPartition {
        &self.partition
    }

    pub fn list_images(&self) -> Result<Catalog, Error> {
        catalog::list_images(&self.partition)
    }

    pub fn default_image(&self) -> Result<Option<String>, Error> {
        default_image::get_default(&self.partition)
    }

    pub fn set_default(&self, name: Option<&str>) -> Result<(), Error> {
        let _lock = StoreLock::acquire(&self.partition)?;
        default_image::set_default(&self.partition, name)
    }

    /// Rename an image and its data directory.
    ///
    /// If `old` is the default, the marker moves to `new` first and is moved
    /// back should the image file itself fail to rename.
    pub fn rename(&self, old: &str, new: &str) -> Result<OperationReport, Error> {
        let old_image = self.partition.image_path(old)?;
        let new_image = self.partition.image_path(new)?;
        let old_data = self.partition.data_path(old)?;
        let new_data = self.partition.data_path(new)?;
        let _lock = StoreLock::acquire(&self.partition)?;

        if fs::symlink_metadata(&new_image).is_ok() {
            return Err(Error::AlreadyExists(new.to_string()));
        }

        let was_default = self.default_image()?.as_deref() == Some(old);
        if was_default {
            default_image::set_default(&self.partition, Some(new))?;
        }

        let mut report = OperationReport::new();
        if let Err(e) = fs::rename(&old_image, &new_image) {
            report.push(Error::io(&old_image, e));
            if was_default {
                report.record(default_image::set_default(&self.partition, Some(old)));
            }
        }

        if old_data.exists() {
            if let Err(e) = fs::rename(&old_data, &new_data) {
                report.push(Error::io(&old_data, e));
            }
        }

        if report.is_clean() {
            tracing::info!("renamed image '{old}' to '{new}'");
        } else {
            tracing::warn!("renamed image '{old}' to '{new}' with errors");
        }
        Ok(report)
    }

    /// Clone an image by hard-linking its file, optionally copying its data.
    ///
    /// The link shares storage with `old`; only the data copy consumes space
    /// and is checked against the free space on the partition first.
    pub fn clone_image(
        &self,
        old: &str,
        new: &str,
        include_data: bool,
    ) -> Result<OperationReport, Error> {
        let old_image = self.partition.image_path(old)?;
        let new_image = self.partition.image_path(new)?;
        let old_data = self.partition.data_path(old)?;
        let new_data = self.partition.data_path(new)?;
        let _lock = StoreLock::acquire(&self.partition)?;

        let copy_data = include_data && old_data.is_dir();
        if copy_data {
            let required = dir_size(&old_data)?;
            match diskspace::ensure_space(self.partition.root(), required) {
                Err(Error::Stat { path, source }) => {
                    tracing::warn!(
                        "cannot check free space on {}: {source}; copying anyway",
                        path.display()
                    );
                }
                other => other?,
            }
        }

        fs::hard_link(&old_image, &new_image).map_err(|source| Error::Link {
            from: old_image.clone(),
            to: new_image.clone(),
            source,
        })?;

        let mut report = OperationReport::new();
        if copy_data {
            copy_tree(&old_data, &new_data, &mut report);
        }

        if report.is_clean() {
            tracing::info!("cloned image '{old}' to '{new}'");
        } else {
            tracing::warn!("cloned image '{old}' to '{new}' with errors");
        }
        Ok(report)
    }

    /// Delete an image and its data directory.
    ///
    /// Deleting the default picks the first remaining image in catalog order
    /// as the new default, or clears it when none remain. An empty name is a
    /// no-op.
    pub fn delete(&self, name: &str) -> Result<OperationReport, Error> {
        let mut report = OperationReport::new();
        if name.is_empty() {
            return Ok(report);
        }

        let image = self.partition.image_path(name)?;
        let data = self.partition.data_path(name)?;
        let _lock = StoreLock::acquire(&self.partition)?;

        let was_default = self.default_image()?.as_deref() == Some(name);

        match fs::remove_dir_all(&data) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => report.push(Error::io(&data, e)),
        }

        if let Err(e) = fs::remove_file(&image) {
            report.push(Error::io(&image, e));
        }

        if was_default && !image.exists() {
            let replacement = self
                .list_images()
                .map(|images| catalog::first_image(&images).map(str::to_string));
            match replacement {
                Ok(replacement) => {
                    report.record(default_image::set_default(
                        &self.partition,
                        replacement.as_deref(),
                    ));
                    match replacement {
                        Some(r) => tracing::info!("default image is now '{r}'"),
                        None => tracing::info!("no images left, default cleared"),
                    }
                }
                Err(e) => report.push(e),
            }
        }

        if report.is_clean() {
            tracing::info!("deleted image '{name}'");
        } else {
            tracing::warn!("delete of image '{name}' finished with errors");
        }
        Ok(report)
    }
}

/// Total size of the regular files below `path`.
fn dir_size(path: &Path) -> Result<u64, Error> {
    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|e| Error::io(path, e.into()))?;
        if entry.file_type().is_file() {
            let metadata = entry.metadata().map_err(|e| Error::io(entry.path(), e.into()))?;
            total += metadata.len();
        }
    }
    Ok(total)
}

/// Recursively copy `src` into `dst`, preserving symlinks and permissions.
///
/// Keeps going after a failed entry; each failure lands on `report`.
/// Directory permissions are applied last so read-only directories can
/// still be filled.
fn copy_tree(src: &Path, dst: &Path, report: &mut OperationReport) {
    let copy_err = |path: &Path, source: io::Error| Error::Copy {
        path: path.to_path_buf(),
        source,
    };
    let mut dir_perms = Vec::new();

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(src).to_path_buf();
                report.push(copy_err(&path, e.into()));
                continue;
            }
        };

        let src_path = entry.path();
        let Ok(rel) = src_path.strip_prefix(src) else {
            continue;
        };
        let dst_path = dst.join(rel);
        let file_type = entry.file_type();

        let result = if file_type.is_dir() {
            fs::create_dir_all(&dst_path).and_then(|()| {
                let perms = fs::metadata(src_path)?.permissions();
                dir_perms.push((dst_path.clone(), perms));
                Ok(())
            })
        } else if file_type.is_symlink() {
            fs::read_link(src_path).and_then(|target| symlink(target, &dst_path))
        } else {
            fs::copy(src_path, &dst_path).map(|_| ())
        };

        if let Err(e) = result {
            report.push(copy_err(src_path, e));
        }
    }

    for (path, perms) in dir_perms.into_iter().rev() {
        if let Err(e) = fs::set_permissions(&path, perms) {
            report.push(Error::io(path, e));
        }
    }
}
