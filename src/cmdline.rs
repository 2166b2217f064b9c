//! Kernel command line parsing.
//!
//! The boot parameter line is a single line of space-separated `key=value`
//! tokens. Only a handful of keys matter here: `datadev`, `ipv4` and `dns`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub const PROC_CMDLINE: &str = "/proc/cmdline";

/// Parsed boot parameters, in command line order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootParams {
    params: Vec<(String, String)>,
}

impl BootParams {
    /// Parse a command line. Tokens without `=` are kept as flags with an
    /// empty value.
    pub fn parse(line: &str) -> Self {
        let params = line
            .split_whitespace()
            .map(|token| match token.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (token.to_string(), String::new()),
            })
            .collect();
        Self { params }
    }

    pub fn read_from(path: &Path) -> Result<Self, Error> {
        let line = fs::read_to_string(path).map_err(|source| Error::BootParams {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(line.trim()))
    }

    pub fn from_proc() -> Result<Self, Error> {
        Self::read_from(Path::new(PROC_CMDLINE))
    }

    /// Value of the first occurrence of `key`, if present and non-empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn datadev(&self) -> Option<&str> {
        self.get("datadev")
    }

    pub fn ipv4(&self) -> Option<&str> {
        self.get("ipv4")
    }

    pub fn dns(&self) -> Option<&str> {
        self.get("dns")
    }

    /// True when the static address is meant for the wireless interface.
    pub fn static_wifi(&self) -> bool {
        self.ipv4().is_some_and(|v| v.ends_with("/wlan0"))
    }
}

/// Resolve a `datadev` value such as `mmcblk0p2` to its device node.
pub fn device_path(dev: &str) -> PathBuf {
    let path = Path::new(dev);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        Path::new("/dev").join(dev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_known_keys() {
        let params = BootParams::parse(
            "console=tty1 datadev=mmcblk0p2 ipv4=192.168.1.50/255.255.255.0/192.168.1.1 dns=1.1.1.1 quiet",
        );

        assert_eq!(params.datadev(), Some("mmcblk0p2"));
        assert_eq!(params.ipv4(), Some("192.168.1.50/255.255.255.0/192.168.1.1"));
        assert_eq!(params.dns(), Some("1.1.1.1"));
        assert_eq!(params.get("quiet"), None);
        assert!(!params.static_wifi());
    }

    #[test]
    fn test_key_must_match_whole_token() {
        let params = BootParams::parse("nodns=9.9.9.9 xdatadev=sda1");
        assert_eq!(params.dns(), None);
        assert_eq!(params.datadev(), None);
    }

    #[test]
    fn test_first_occurrence_wins_and_empty_is_absent() {
        let params = BootParams::parse("dns= dns=8.8.4.4 datadev=sda1 datadev=sdb1");
        assert_eq!(params.dns(), None);
        assert_eq!(params.datadev(), Some("sda1"));
    }

    #[test]
    fn test_value_may_contain_equals() {
        let params = BootParams::parse("root=PARTUUID=abcd-02");
        assert_eq!(params.get("root"), Some("PARTUUID=abcd-02"));
    }

    #[test]
    fn test_static_wifi() {
        let params = BootParams::parse("ipv4=192.168.1.50/wlan0");
        assert!(params.static_wifi());
    }

    #[test]
    fn test_read_from_file_trims() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cmdline");
        fs::write(&path, "datadev=sda2 dns=9.9.9.9\n").unwrap();

        let params = BootParams::read_from(&path).unwrap();
        assert_eq!(params.dns(), Some("9.9.9.9"));

        let missing = BootParams::read_from(&temp.path().join("nope"));
        assert!(matches!(missing, Err(Error::BootParams { .. })));
    }

    #[test]
    fn test_device_path() {
        assert_eq!(device_path("mmcblk0p2"), PathBuf::from("/dev/mmcblk0p2"));
        assert_eq!(device_path("/dev/sda1"), PathBuf::from("/dev/sda1"));
    }
}
