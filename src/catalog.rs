//! Image catalog: enumerate installed images and derive display names.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use serde::Serialize;

use crate::error::Error;
use crate::layout::DataPartition;

/// Conventional suffix stripped from image names for display.
pub const IMAGE_SUFFIX: &str = ".img";

const SQUASHFS_MAGIC: u32 = 0x7371_7368;
const SQUASHFS_MAGIC_SWAP: u32 = 0x6873_7173;

/// Installed images keyed by raw file name, valued by display name.
///
/// Iteration is lexicographic by raw name. Default re-selection after a
/// delete relies on this order.
pub type Catalog = BTreeMap<String, String>;

/// On-disk format of an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    SquashFs,
    Unknown,
}

/// List the regular files directly under `images/`.
///
/// A missing `images/` directory is an empty catalog. Directories, special
/// files, symlinks and hidden entries are skipped.
pub fn list_images(partition: &DataPartition) -> Result<Catalog, Error> {
    let dir = partition.images_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Catalog::new()),
        Err(e) => return Err(Error::io(&dir, e)),
    };

    let mut images = Catalog::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(&dir, e))?;
        let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            tracing::debug!("skipping non UTF-8 image name {:?}", entry.file_name());
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let display = friendly_name(&name);
        images.insert(name, display);
    }

    Ok(images)
}

/// Whether `name` is an entry [`list_images`] would report.
///
/// Symlinks are not followed, so a link in `images/` is never an image.
pub fn contains_image(partition: &DataPartition, name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    fs::symlink_metadata(partition.images_dir().join(name))
        .map(|meta| meta.file_type().is_file())
        .unwrap_or(false)
}

/// First image in catalog order, if any.
pub fn first_image(catalog: &Catalog) -> Option<&str> {
    catalog.keys().next().map(String::as_str)
}

/// Derive a human-readable name from a raw image file name.
///
/// Underscores become spaces, anything up to the last `/` is dropped (names
/// downloaded from a URL embed it), and trailing `.img` suffixes are removed.
/// Applying it to its own output changes nothing.
pub fn friendly_name(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let mut name = match spaced.rfind('/') {
        Some(pos) => &spaced[pos + 1..],
        None => spaced.as_str(),
    };

    while name.len() > IMAGE_SUFFIX.len() {
        match name.strip_suffix(IMAGE_SUFFIX) {
            Some(stem) => name = stem,
            None => break,
        }
    }

    name.to_string()
}

/// Detect the image format from its leading magic bytes.
pub fn image_format(path: &Path) -> Result<ImageFormat, Error> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(ImageFormat::Unknown),
        Err(e) => return Err(Error::io(path, e)),
    }

    match u32::from_le_bytes(magic) {
        SQUASHFS_MAGIC | SQUASHFS_MAGIC_SWAP => Ok(ImageFormat::SquashFs),
        _ => Ok(ImageFormat::Unknown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn temp_partition() -> (TempDir, DataPartition) {
        let temp = TempDir::new().unwrap();
        let partition = DataPartition::new(temp.path());
        fs::create_dir_all(partition.images_dir()).unwrap();
        (temp, partition)
    }

    #[test]
    fn test_friendly_name_basic() {
        assert_eq!(friendly_name("raspbian.img"), "raspbian");
        assert_eq!(friendly_name("my_os.img"), "my os");
        assert_eq!(friendly_name("plain"), "plain");
    }

    #[test]
    fn test_friendly_name_keeps_last_url_segment() {
        assert_eq!(
            friendly_name("http://example.com/images/Debian_12.img"),
            "Debian 12"
        );
    }

    #[test]
    fn test_friendly_name_is_idempotent() {
        let samples = [
            "raspbian.img",
            "my_os.img",
            "double.img.img",
            ".img",
            "a/b/c_d.img",
            "noext",
            "image.img.xz",
            "",
            "trailing/",
        ];
        for raw in samples {
            let once = friendly_name(raw);
            assert_eq!(friendly_name(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_friendly_name_never_empties_a_bare_suffix() {
        assert_eq!(friendly_name(".img"), ".img");
        assert_eq!(friendly_name("x.img"), "x");
    }

    #[test]
    fn test_list_images_only_regular_files() {
        let (_temp, partition) = temp_partition();
        let images = partition.images_dir();

        fs::write(images.join("raspbian.img"), b"a").unwrap();
        fs::write(images.join("my_os.img"), b"b").unwrap();
        fs::write(images.join(".partial"), b"c").unwrap();
        fs::create_dir(images.join("subdir")).unwrap();
        symlink(images.join("raspbian.img"), images.join("alias.img")).unwrap();

        let catalog = list_images(&partition).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog["raspbian.img"], "raspbian");
        assert_eq!(catalog["my_os.img"], "my os");
        assert_eq!(first_image(&catalog), Some("my_os.img"));
    }

    #[test]
    fn test_contains_image_agrees_with_catalog() {
        let (_temp, partition) = temp_partition();
        let images = partition.images_dir();

        fs::write(images.join("real.img"), b"a").unwrap();
        fs::write(images.join(".hidden.img"), b"b").unwrap();
        fs::create_dir(images.join("dir.img")).unwrap();
        symlink(images.join("real.img"), images.join("alias.img")).unwrap();
        symlink(images.join("missing.img"), images.join("dangling.img")).unwrap();

        let catalog = list_images(&partition).unwrap();
        for name in ["real.img", ".hidden.img", "dir.img", "alias.img", "dangling.img", "none.img"] {
            assert_eq!(
                contains_image(&partition, name),
                catalog.contains_key(name),
                "membership differs for {name}"
            );
        }
    }

    #[test]
    fn test_list_images_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let partition = DataPartition::new(temp.path().join("nowhere"));

        let catalog = list_images(&partition).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(first_image(&catalog), None);
    }

    #[test]
    fn test_image_format_detects_squashfs() {
        let (_temp, partition) = temp_partition();
        let squash = partition.images_dir().join("sq.img");
        let swapped = partition.images_dir().join("sq-be.img");
        let other = partition.images_dir().join("other.img");
        let tiny = partition.images_dir().join("tiny.img");

        fs::write(&squash, b"hsqs\0\0\0\0").unwrap();
        fs::write(&swapped, b"sqsh\0\0\0\0").unwrap();
        fs::write(&other, b"\x7fELF\0\0").unwrap();
        fs::write(&tiny, b"hs").unwrap();

        assert_eq!(image_format(&squash).unwrap(), ImageFormat::SquashFs);
        assert_eq!(image_format(&swapped).unwrap(), ImageFormat::SquashFs);
        assert_eq!(image_format(&other).unwrap(), ImageFormat::Unknown);
        assert_eq!(image_format(&tiny).unwrap(), ImageFormat::Unknown);
    }
}
