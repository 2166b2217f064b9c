//! Partition bootstrapper: one-time preparation of a fresh data partition.
//!
//! Only the mount is fatal. Every later step is best-effort and reports its
//! failure on the returned [`OperationReport`]; the boot continues into a
//! degraded environment rather than none at all.

pub mod files;

use std::fs;
use std::path::{Path, PathBuf};

use crate::cmdline::BootParams;
use crate::config::ManagerConfig;
use crate::error::{Error, OperationReport};
use crate::layout::{DataPartition, LAYOUT_DIRS};
use crate::system::SystemOps;

/// Boot-time inputs consumed once while bootstrapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootConfigSnapshot {
    pub timezone: Option<String>,
    pub keyboard_layout: Option<String>,
    /// Wi-Fi credentials found on the boot medium.
    pub wifi_credentials: Option<PathBuf>,
    /// Raw `ipv4=` boot parameter.
    pub static_ipv4: Option<String>,
    /// The static address belongs to the wireless interface.
    pub static_wifi: bool,
    pub dns: Option<String>,
}

impl BootConfigSnapshot {
    /// Gather the snapshot from configuration and the kernel command line.
    pub fn from_sources(config: &ManagerConfig, params: &BootParams) -> Self {
        let wifi = config.wifi_credentials_path();
        Self {
            timezone: config.timezone.clone(),
            keyboard_layout: config.keyboard_layout.clone(),
            wifi_credentials: wifi.is_file().then_some(wifi),
            static_ipv4: params.ipv4().map(str::to_string),
            static_wifi: params.static_wifi(),
            dns: params.dns().map(str::to_string),
        }
    }
}

pub struct Bootstrapper<'a, S: SystemOps> {
    config: &'a ManagerConfig,
    system: S,
}

impl<'a, S: SystemOps> Bootstrapper<'a, S> {
    pub fn new(config: &'a ManagerConfig, system: S) -> Self {
        Self { config, system }
    }

    /// Mount `device` and lay out the data partition.
    ///
    /// Returns `Err` only when the mount fails, in which case nothing has
    /// been written.
    pub fn initialize(
        &self,
        device: &Path,
        snapshot: &BootConfigSnapshot,
    ) -> Result<OperationReport, Error> {
        let mount_point = &self.config.mount_point;
        self.system.mount(device, mount_point)?;
        tracing::info!(
            "mounted {} on {}, bootstrapping data partition",
            device.display(),
            mount_point.display()
        );

        let partition = DataPartition::new(mount_point);
        let mut report = OperationReport::new();

        create_layout(&partition, &mut report);

        let shared = partition.shared_dir();
        report.record(
            self.system
                .extract_archive(&self.config.shared_archive_path(), &shared),
        );

        if let Some(timezone) = &snapshot.timezone {
            report.record(files::write_timezone(&shared, timezone));
        }

        if let Some(layout) = &snapshot.keyboard_layout {
            report.record(files::write_keyboard(&shared, layout));
        }

        if let Some(credentials) = &snapshot.wifi_credentials {
            report.record(files::install_wifi_credentials(&shared, credentials));
        }

        if snapshot.static_ipv4.is_some() {
            let dns = snapshot
                .dns
                .as_deref()
                .unwrap_or(self.config.fallback_dns.as_str());
            let iface = if snapshot.static_wifi {
                files::WIFI_INTERFACE
            } else {
                self.config.network_interface.as_str()
            };
            report.record(files::write_static_network(&shared, iface, dns));
        }

        if report.is_clean() {
            tracing::info!("data partition ready at {}", mount_point.display());
        } else {
            tracing::warn!(
                "data partition bootstrapped with {} error(s)",
                report.errors().len()
            );
        }
        Ok(report)
    }
}

fn create_layout(partition: &DataPartition, report: &mut OperationReport) {
    for dir in LAYOUT_DIRS {
        let path = partition.root().join(dir);
        if let Err(e) = fs::create_dir(&path) {
            if e.kind() != std::io::ErrorKind::AlreadyExists {
                report.push(Error::io(path, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Records calls; writes a marker file instead of extracting.
    #[derive(Default)]
    struct FakeSystem {
        fail_mount: bool,
        fail_extract: bool,
        calls: RefCell<Vec<String>>,
    }

    impl SystemOps for &FakeSystem {
        fn mount(&self, device: &Path, mount_point: &Path) -> Result<(), Error> {
            self.calls
                .borrow_mut()
                .push(format!("mount {}", device.display()));
            if self.fail_mount {
                return Err(Error::Mount {
                    device: device.to_path_buf(),
                    mount_point: mount_point.to_path_buf(),
                    reason: "mount exited with exit status: 32".into(),
                });
            }
            fs::create_dir_all(mount_point).unwrap();
            Ok(())
        }

        fn extract_archive(&self, archive: &Path, dest: &Path) -> Result<(), Error> {
            self.calls.borrow_mut().push("extract".into());
            if self.fail_extract {
                return Err(Error::Extraction {
                    archive: archive.to_path_buf(),
                    code: Some(1),
                    reason: "gzip: stdin: not in gzip format".into(),
                });
            }
            fs::write(dest.join("extracted"), b"").unwrap();
            Ok(())
        }
    }

    fn temp_config() -> (TempDir, ManagerConfig) {
        let temp = TempDir::new().unwrap();
        let config = ManagerConfig {
            mount_point: temp.path().join("mnt"),
            boot_dir: temp.path().join("boot"),
            ..ManagerConfig::default()
        };
        fs::create_dir_all(&config.boot_dir).unwrap();
        (temp, config)
    }

    #[test]
    fn test_mount_failure_skips_everything() {
        let (_temp, config) = temp_config();
        let system = FakeSystem {
            fail_mount: true,
            ..Default::default()
        };

        let result = Bootstrapper::new(&config, &system)
            .initialize(Path::new("/dev/sda2"), &BootConfigSnapshot::default());

        assert!(matches!(result, Err(Error::Mount { .. })));
        assert_eq!(*system.calls.borrow(), vec!["mount /dev/sda2".to_string()]);
        assert!(!config.mount_point.join("images").exists());
    }

    #[test]
    fn test_full_bootstrap_writes_all_files() {
        let (_temp, config) = temp_config();
        fs::write(config.wifi_credentials_path(), "network={}\n").unwrap();
        let params = BootParams::parse("datadev=sda2 ipv4=10.0.0.5/255.0.0.0/10.0.0.1 dns=1.1.1.1");
        let config = ManagerConfig {
            timezone: Some("Europe/Amsterdam".into()),
            keyboard_layout: Some("us".into()),
            ..config
        };
        let snapshot = BootConfigSnapshot::from_sources(&config, &params);
        let system = FakeSystem::default();

        let report = Bootstrapper::new(&config, &system)
            .initialize(Path::new("/dev/sda2"), &snapshot)
            .unwrap();
        assert!(report.is_clean(), "{:?}", report.errors());

        let partition = DataPartition::new(&config.mount_point);
        for dir in LAYOUT_DIRS {
            assert!(partition.root().join(dir).is_dir(), "{dir} missing");
        }
        assert!(partition.shared_path("extracted").exists());
        assert_eq!(
            fs::read_to_string(partition.shared_path(files::TIMEZONE_FILE)).unwrap(),
            "Europe/Amsterdam\n"
        );
        assert!(fs::read_to_string(partition.shared_path(files::KEYBOARD_FILE))
            .unwrap()
            .contains("XKBLAYOUT=\"us\""));

        let wifi = partition.shared_path(files::WIFI_FILE);
        let mode = fs::metadata(&wifi).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        assert_eq!(
            fs::read_to_string(partition.shared_path(files::RESOLV_CONF_FILE)).unwrap(),
            "nameserver 1.1.1.1\n"
        );
        assert!(fs::read_to_string(partition.shared_path(files::INTERFACES_FILE))
            .unwrap()
            .contains("iface eth0 inet manual\n"));
    }

    #[test]
    fn test_static_ip_without_dns_uses_fallback() {
        let (_temp, config) = temp_config();
        let params = BootParams::parse("ipv4=192.168.1.50/wlan0");
        let snapshot = BootConfigSnapshot::from_sources(&config, &params);
        let system = FakeSystem::default();

        Bootstrapper::new(&config, &system)
            .initialize(Path::new("/dev/sda2"), &snapshot)
            .unwrap();

        let partition = DataPartition::new(&config.mount_point);
        let resolv = fs::read_to_string(partition.shared_path(files::RESOLV_CONF_FILE)).unwrap();
        assert!(resolv.contains("nameserver 8.8.8.8"));
        let ifaces = fs::read_to_string(partition.shared_path(files::INTERFACES_FILE)).unwrap();
        assert!(ifaces.contains("iface wlan0 inet manual\n"));
        assert!(!ifaces.contains("eth0"));
    }

    #[test]
    fn test_optional_files_absent_without_inputs() {
        let (_temp, config) = temp_config();
        let snapshot = BootConfigSnapshot::from_sources(&config, &BootParams::default());
        assert_eq!(snapshot, BootConfigSnapshot::default());

        let system = FakeSystem::default();
        Bootstrapper::new(&config, &system)
            .initialize(Path::new("/dev/sda2"), &snapshot)
            .unwrap();

        let partition = DataPartition::new(&config.mount_point);
        assert!(!partition.shared_path(files::TIMEZONE_FILE).exists());
        assert!(!partition.shared_path(files::KEYBOARD_FILE).exists());
        assert!(!partition.shared_path(files::WIFI_FILE).exists());
        assert!(!partition.shared_path(files::INTERFACES_FILE).exists());
        assert!(!partition.shared_path(files::RESOLV_CONF_FILE).exists());
    }

    #[test]
    fn test_extraction_failure_is_reported_and_bootstrap_continues() {
        let (_temp, config) = temp_config();
        let snapshot = BootConfigSnapshot {
            timezone: Some("UTC".into()),
            ..Default::default()
        };
        let system = FakeSystem {
            fail_extract: true,
            ..Default::default()
        };

        let report = Bootstrapper::new(&config, &system)
            .initialize(Path::new("/dev/sda2"), &snapshot)
            .unwrap();

        assert_eq!(report.errors().len(), 1);
        assert!(matches!(
            report.errors()[0],
            Error::Extraction { code: Some(1), .. }
        ));
        let partition = DataPartition::new(&config.mount_point);
        assert!(partition.shared_path(files::TIMEZONE_FILE).is_file());
    }

    #[test]
    fn test_rerun_on_existing_layout_is_clean() {
        let (_temp, config) = temp_config();
        let system = FakeSystem::default();
        let bootstrapper = Bootstrapper::new(&config, &system);

        bootstrapper
            .initialize(Path::new("/dev/sda2"), &BootConfigSnapshot::default())
            .unwrap();
        let report = bootstrapper
            .initialize(Path::new("/dev/sda2"), &BootConfigSnapshot::default())
            .unwrap();

        assert!(report.is_clean());
    }
}
