//! Run configuration for a bramble test session.
//!
//! A [`Configuration`] is assembled by the test author before a run and is
//! treated as immutable once handed to [`Runner`](crate::lifecycle::Runner).
//! When both `serial` and `device_name` are set, the serial wins during
//! device resolution.

use std::path::PathBuf;

use crate::poll::WaitOptions;

/// Settings controlling device selection, installation, and defaults.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Explicit serial of the target device. Takes precedence over
    /// `device_name` when both are set.
    pub serial: Option<String>,

    /// Name of the target device (emulator/device name as reported by the
    /// device listing). Only consulted when `serial` is unset.
    pub device_name: Option<String>,

    /// When true, an already-installed application is uninstalled and
    /// reinstalled during [`Runner::start`](crate::lifecycle::Runner::start).
    pub should_reinstall_app: bool,

    /// Directory that receives the per-run operation log.
    pub logs_directory: PathBuf,

    /// Wait settings used when a caller polls without explicit options.
    pub default_wait: WaitOptions,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            serial: None,
            device_name: None,
            should_reinstall_app: false,
            logs_directory: PathBuf::from("logs"),
            default_wait: WaitOptions::default(),
        }
    }
}
