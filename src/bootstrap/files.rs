//! Configuration files seeded into `shared/` during bootstrap.
//!
//! Each writer is independent; the bootstrapper runs them all and reports
//! failures individually.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

use crate::error::Error;

pub const TIMEZONE_FILE: &str = "etc/timezone";
pub const KEYBOARD_FILE: &str = "etc/default/keyboard";
pub const WIFI_DIR: &str = "etc/wpa_supplicant";
pub const WIFI_FILE: &str = "etc/wpa_supplicant/wpa_supplicant.conf";
pub const INTERFACES_FILE: &str = "etc/network/interfaces";
pub const RESOLV_CONF_FILE: &str = "etc/resolv.conf";

/// Interface that takes the static address when `ipv4=` ends in `/wlan0`.
pub const WIFI_INTERFACE: &str = "wlan0";

/// Write `content` to `shared/<path>`, creating parent directories.
pub fn write_shared(shared: &Path, path: &str, content: &str) -> Result<(), Error> {
    let full_path = shared.join(path);
    if let Some(parent) = full_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(&full_path, content).map_err(|e| Error::io(&full_path, e))?;
    Ok(())
}

pub fn write_timezone(shared: &Path, timezone: &str) -> Result<(), Error> {
    write_shared(shared, TIMEZONE_FILE, &format!("{timezone}\n"))
}

/// Shell-sourced keyboard config, as read by console-setup.
pub fn keyboard_config(layout: &str) -> String {
    format!(
        "XKBMODEL=\"pc105\"\n\
         XKBLAYOUT=\"{layout}\"\n\
         XKBVARIANT=\"\"\n\
         XKBOPTIONS=\"\"\n"
    )
}

pub fn write_keyboard(shared: &Path, layout: &str) -> Result<(), Error> {
    write_shared(shared, KEYBOARD_FILE, &keyboard_config(layout))
}

/// Copy Wi-Fi credentials into `shared/`, readable by the owner only.
pub fn install_wifi_credentials(shared: &Path, src: &Path) -> Result<(), Error> {
    let dir = shared.join(WIFI_DIR);
    fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

    let copy_err = |source: io::Error| Error::Copy {
        path: src.to_path_buf(),
        source,
    };
    let mut input = File::open(src).map_err(copy_err)?;

    // open() leaves the mode of an existing file alone.
    let dst = shared.join(WIFI_FILE);
    if dst.exists() {
        fs::set_permissions(&dst, fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::io(&dst, e))?;
    }
    let mut output = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&dst)
        .map_err(|e| Error::io(&dst, e))?;
    io::copy(&mut input, &mut output).map_err(copy_err)?;
    Ok(())
}

/// `interfaces(5)` leaving `iface` to the static setup and enabling loopback.
pub fn interfaces_config(iface: &str) -> String {
    format!(
        "# Static network configuration handled by the boot manager\n\
         iface {iface} inet manual\n\
         \n\
         auto lo\n\
         iface lo inet loopback\n"
    )
}

pub fn resolv_conf(dns: &str) -> String {
    format!("nameserver {dns}\n")
}

pub fn write_static_network(shared: &Path, iface: &str, dns: &str) -> Result<(), Error> {
    write_shared(shared, INTERFACES_FILE, &interfaces_config(iface))?;
    write_shared(shared, RESOLV_CONF_FILE, &resolv_conf(dns))
}
