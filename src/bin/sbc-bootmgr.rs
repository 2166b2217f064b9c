use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use sbc_bootmgr::bootstrap::{BootConfigSnapshot, Bootstrapper};
use sbc_bootmgr::catalog::{image_format, ImageFormat};
use sbc_bootmgr::cmdline::{device_path, BootParams};
use sbc_bootmgr::config::{load_config_or_default, ManagerConfig, DEFAULT_CONFIG_PATH};
use sbc_bootmgr::keyboard::{detect_keyboard_backend, KeyboardSwitcher};
use sbc_bootmgr::{diskspace, preflight, DataPartition, HostSystem, ImageManager, OperationReport};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "SBC_BOOTMGR_CONFIG";

fn usage() -> &'static str {
    "Usage:\n  sbc-bootmgr init [device]\n  sbc-bootmgr list [--json]\n  sbc-bootmgr default\n  sbc-bootmgr default set <name>\n  sbc-bootmgr default clear\n  sbc-bootmgr rename <old> <new>\n  sbc-bootmgr clone <old> <new> [--with-data]\n  sbc-bootmgr delete <name>\n  sbc-bootmgr space [path]"
}

#[derive(Serialize)]
struct ImageRow<'a> {
    name: &'a str,
    display_name: &'a str,
    format: ImageFormat,
    default: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config_or_default(&config_path)?;
    let manager = ImageManager::new(DataPartition::new(&config.mount_point));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["init"] => init(&config, None),
        ["init", device] => init(&config, Some(*device)),
        ["list"] => list(&manager, false),
        ["list", "--json"] => list(&manager, true),
        ["default"] => {
            match manager.default_image()? {
                Some(name) => println!("{name}"),
                None => println!("(none)"),
            }
            Ok(())
        }
        ["default", "set", name] => Ok(manager.set_default(Some(*name))?),
        ["default", "clear"] => Ok(manager.set_default(None)?),
        ["rename", old, new] => finish("rename", manager.rename(old, new)?),
        ["clone", old, new] => finish("clone", manager.clone_image(old, new, false)?),
        ["clone", old, new, "--with-data"] => {
            finish("clone", manager.clone_image(old, new, true)?)
        }
        ["delete", name] => finish("delete", manager.delete(name)?),
        ["space"] => space(&config.mount_point),
        ["space", path] => space(Path::new(path)),
        _ => bail!(usage()),
    }
}

fn init(config: &ManagerConfig, device: Option<&str>) -> Result<()> {
    preflight::check_host_tools()?;

    let params = BootParams::from_proc()?;
    let device = match device.or(params.datadev()) {
        Some(dev) => device_path(dev),
        None => bail!("no device given and no datadev= boot parameter"),
    };

    let mut snapshot = BootConfigSnapshot::from_sources(config, &params);
    if let Some(layout) = snapshot.keyboard_layout.as_deref() {
        let mut keyboard = KeyboardSwitcher::new(detect_keyboard_backend());
        if let Err(e) = keyboard.set_layout(layout) {
            tracing::warn!("{e}");
        }
        snapshot.keyboard_layout = keyboard.current().map(str::to_string);
    }

    let report = Bootstrapper::new(config, HostSystem)
        .initialize(&device, &snapshot)
        .with_context(|| format!("initializing data partition on '{}'", device.display()))?;
    finish("init", report)
}

fn list(manager: &ImageManager, json: bool) -> Result<()> {
    let images = manager.list_images()?;
    let default = manager.default_image()?;

    if json {
        let partition = manager.partition();
        let mut rows = Vec::with_capacity(images.len());
        for (name, display_name) in &images {
            rows.push(ImageRow {
                name,
                display_name,
                format: image_format(&partition.image_path(name)?)?,
                default: default.as_deref() == Some(name.as_str()),
            });
        }
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for (name, display_name) in &images {
        let marker = if default.as_deref() == Some(name.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {display_name}  ({name})");
    }
    Ok(())
}

fn space(path: &Path) -> Result<()> {
    let available = diskspace::available_bytes(path)?;
    let total = diskspace::total_bytes(path)?;
    println!(
        "{}: {:.0} MiB free of {:.0} MiB",
        path.display(),
        available / (1024.0 * 1024.0),
        total / (1024.0 * 1024.0)
    );
    Ok(())
}

fn finish(operation: &str, report: OperationReport) -> Result<()> {
    if report.is_clean() {
        return Ok(());
    }
    let errors = report
        .into_errors()
        .iter()
        .map(|e| format!("  {e}"))
        .collect::<Vec<_>>()
        .join("\n");
    bail!("{operation} completed with errors:\n{errors}")
}
