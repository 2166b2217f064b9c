//! Console keyboard layout switching.
//!
//! Not every board has a way to change the live keymap. The backend is
//! picked once at startup: `loadkeys` when it is installed, otherwise a
//! no-op that only remembers the layout for the bootstrap snapshot.

use std::path::PathBuf;
use std::process::Command;

use crate::error::Error;

/// Capability to apply a keyboard layout to the running console.
pub trait KeyboardBackend {
    fn name(&self) -> &'static str;

    fn apply_layout(&self, layout: &str) -> Result<(), Error>;
}

/// Backend for platforms without a switchable keymap.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopKeyboard;

impl KeyboardBackend for NoopKeyboard {
    fn name(&self) -> &'static str {
        "none"
    }

    fn apply_layout(&self, layout: &str) -> Result<(), Error> {
        tracing::debug!("no keyboard backend, not applying layout '{layout}'");
        Ok(())
    }
}

/// Backend that runs `loadkeys <layout>`.
#[derive(Debug, Clone)]
pub struct LoadkeysKeyboard {
    program: PathBuf,
}

impl LoadkeysKeyboard {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl KeyboardBackend for LoadkeysKeyboard {
    fn name(&self) -> &'static str {
        "loadkeys"
    }

    fn apply_layout(&self, layout: &str) -> Result<(), Error> {
        let output = Command::new(&self.program)
            .arg(layout)
            .output()
            .map_err(|e| Error::Keyboard {
                layout: layout.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::Keyboard {
                layout: layout.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Pick the best available backend on this host.
pub fn detect_keyboard_backend() -> Box<dyn KeyboardBackend> {
    match which::which("loadkeys") {
        Ok(program) => Box::new(LoadkeysKeyboard::new(program)),
        Err(_) => Box::new(NoopKeyboard),
    }
}

/// Tracks the selected layout and applies changes through a backend.
pub struct KeyboardSwitcher {
    backend: Box<dyn KeyboardBackend>,
    current: Option<String>,
}

impl KeyboardSwitcher {
    pub fn new(backend: Box<dyn KeyboardBackend>) -> Self {
        Self {
            backend,
            current: None,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Switch to `layout`. Returns `false` when it was already active.
    ///
    /// The layout is recorded even if the backend fails to apply it, so the
    /// data partition still gets the user's choice.
    pub fn set_layout(&mut self, layout: &str) -> Result<bool, Error> {
        if self.current.as_deref() == Some(layout) {
            return Ok(false);
        }
        self.current = Some(layout.to_string());
        tracing::info!("keyboard layout '{layout}' via {}", self.backend.name());
        self.backend.apply_layout(layout)?;
        Ok(true)
    }
}
