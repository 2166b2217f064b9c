//! Data partition and OS image lifecycle management for SBC boot menus.
//!
//! A single-board computer boots a small menu that keeps its installable OS
//! images on a dedicated data partition. This crate is the core behind that
//! menu:
//!
//! - **Bootstrap** - Mount a fresh data partition, lay it out and seed shared
//!   configuration (timezone, keyboard, Wi-Fi, static network)
//! - **Catalog** - Enumerate installed images and derive display names
//! - **Default register** - Persist which image boots automatically
//! - **Mutations** - Rename, clone and delete images while keeping the
//!   default register consistent
//! - **Disk space** - Query free and total space before installs and clones
//!
//! # Architecture
//!
//! ```text
//! sbc-bootmgr (binary)
//!     │
//!     ├── config ───────── ManagerConfig (TOML, explicit value)
//!     ├── cmdline ──────── BootParams (datadev=, ipv4=, dns=)
//!     │
//!     ├── bootstrap ────── Bootstrapper<S: SystemOps>
//!     │                      └── files (timezone, keyboard, wpa, network)
//!     │
//!     └── mutator ──────── ImageManager
//!             ├── catalog        list_images, friendly_name
//!             ├── default_image  get_default, set_default
//!             ├── diskspace      statvfs probe
//!             └── lock           StoreLock (one mutation at a time)
//!
//! layout ── DataPartition: images/ data/ shared/ tmp/
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use sbc_bootmgr::{DataPartition, ImageManager};
//!
//! let manager = ImageManager::new(DataPartition::new("/mnt"));
//! for (name, display) in manager.list_images()? {
//!     println!("{name}: {display}");
//! }
//! manager.delete("old_os.img")?;
//! # Ok::<(), sbc_bootmgr::Error>(())
//! ```

pub mod bootstrap;
pub mod catalog;
pub mod cmdline;
pub mod config;
pub mod default_image;
pub mod diskspace;
pub mod error;
pub mod keyboard;
pub mod layout;
pub mod lock;
pub mod mutator;
pub mod preflight;
pub mod system;

pub use bootstrap::{BootConfigSnapshot, Bootstrapper};
pub use catalog::{friendly_name, list_images, Catalog, ImageFormat};
pub use cmdline::BootParams;
pub use config::ManagerConfig;
pub use error::{Error, OperationReport};
pub use layout::DataPartition;
pub use mutator::ImageManager;
pub use system::{HostSystem, SystemOps};
