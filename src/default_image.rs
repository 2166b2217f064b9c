//! Default image register, persisted as a marker file in `data/`.
//!
//! The marker holds the raw image name with no delimiter. A missing marker,
//! or one that names an image no longer in the catalog, means "no default".

use std::fs;
use std::io;

use crate::catalog::contains_image;
use crate::error::Error;
use crate::layout::{validate_image_name, DataPartition};

const MARKER_TMP: &str = ".default.tmp";

/// Read the current default image.
///
/// Stale or malformed markers are reported as `None`, never as an error.
pub fn get_default(partition: &DataPartition) -> Result<Option<String>, Error> {
    let marker = partition.marker_path();
    let bytes = match fs::read(&marker) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(&marker, e)),
    };

    let Ok(raw) = String::from_utf8(bytes) else {
        tracing::debug!("ignoring non UTF-8 default marker");
        return Ok(None);
    };
    let name = raw.trim_end_matches(['\n', '\r']);

    if validate_image_name(name).is_err() {
        tracing::debug!("ignoring malformed default marker {name:?}");
        return Ok(None);
    }
    if !contains_image(partition, name) {
        tracing::debug!("default marker names missing image '{name}'");
        return Ok(None);
    }

    Ok(Some(name.to_string()))
}

/// Persist `name` as the default image, or clear the marker with `None`.
///
/// The new marker is written next to the old one and renamed into place.
pub fn set_default(partition: &DataPartition, name: Option<&str>) -> Result<(), Error> {
    let marker = partition.marker_path();

    let Some(name) = name else {
        return match fs::remove_file(&marker) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(&marker, e)),
        };
    };

    validate_image_name(name)?;

    let data_dir = partition.data_dir();
    fs::create_dir_all(&data_dir).map_err(|e| Error::io(&data_dir, e))?;

    let tmp = data_dir.join(MARKER_TMP);
    fs::write(&tmp, name.as_bytes()).map_err(|e| Error::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, &marker) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::io(&marker, e));
    }

    tracing::debug!("default image set to '{name}'");
    Ok(())
}
