//! Interface to the Android command-line tools (`adb`, `aapt`).
//!
//! This module provides the [`DeviceCommands`] trait, the seam through which
//! the rest of the crate talks to devices, and [`Adb`], the implementation
//! that shells out to the real tools. Tests substitute a fake implementation
//! of the trait; nothing above this module ever spawns a command directly.
//!
//! # Requirements
//!
//! The Android SDK platform tools must be on `PATH` for `adb`, and the build
//! tools for `aapt`.
//!
//! # Example
//!
//! ```no_run
//! use bramble_core::adb::{Adb, DeviceCommands};
//!
//! # async fn example() -> Result<(), bramble_core::adb::AdbError> {
//! let devices = Adb.devices().await?;
//! for device in &devices {
//!     println!("{} [{}]", device.serial, device.state);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors raised at the device command-line boundary.
///
/// Tool failures are wrapped, never swallowed: the message carries whatever
/// the tool printed so the diagnosis reaches the caller intact.
#[derive(Error, Debug)]
pub enum AdbError {
    /// A tool exited unsuccessfully or reported a failure in its output.
    #[error("{tool} command failed: {message}")]
    CommandFailed {
        /// The tool that was invoked (`adb`, `aapt`).
        tool: &'static str,
        /// The failure text reported by the tool.
        message: String,
    },

    /// The tool could not be spawned at all.
    #[error("failed to run {tool}: {source}")]
    Io {
        /// The tool that was invoked.
        tool: &'static str,
        /// The underlying spawn/read error.
        source: std::io::Error,
    },

    /// The tool ran but its output did not contain what was asked for.
    #[error("unexpected {tool} output: {message}")]
    UnexpectedOutput {
        /// The tool that was invoked.
        tool: &'static str,
        /// What was missing or malformed.
        message: String,
    },
}

/// One row of the device listing.
///
/// The state is kept as the raw token reported by the listing (`device`,
/// `offline`, `unauthorized`, ...). It is observed, not cached; callers
/// re-query rather than hold on to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Unique serial identifying the device instance.
    pub serial: String,

    /// Raw state token from the listing.
    pub state: String,

    /// Device name from the listing's `device:` (or `model:`) field, when
    /// the listing provides one.
    pub name: Option<String>,
}

impl DeviceInfo {
    /// True when the device is attached and ready for commands.
    pub fn is_online(&self) -> bool {
        self.state == "device"
    }
}

/// The Android command-line boundary consumed by the resolver and lifecycle
/// manager.
///
/// All methods issue one tool invocation and return its parsed result; no
/// state is cached between calls. Implementations must be safe to share
/// behind an `Arc`.
#[async_trait]
pub trait DeviceCommands: Send + Sync {
    /// Lists currently attached devices, freshly queried.
    async fn devices(&self) -> Result<Vec<DeviceInfo>, AdbError>;

    /// Returns whether `package` is installed on the device with `serial`.
    async fn is_installed(&self, serial: &str, package: &str) -> Result<bool, AdbError>;

    /// Installs the artifact at `apk` on the device with `serial`.
    async fn install(&self, serial: &str, apk: &Path) -> Result<(), AdbError>;

    /// Uninstalls `package` from the device with `serial`.
    async fn uninstall(&self, serial: &str, package: &str) -> Result<(), AdbError>;

    /// Reads the package name out of an application artifact.
    async fn package_name(&self, apk: &Path) -> Result<String, AdbError>;
}

/// Real implementation of [`DeviceCommands`] over the `adb` and `aapt` CLIs.
pub struct Adb;

#[async_trait]
impl DeviceCommands for Adb {
    async fn devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
        let output = exec("adb", &["devices", "-l"]).await?;
        Ok(parse_devices_output(&output))
    }

    async fn is_installed(&self, serial: &str, package: &str) -> Result<bool, AdbError> {
        let output = exec(
            "adb",
            &["-s", serial, "shell", "pm", "list", "packages", package],
        )
        .await?;
        Ok(package_listed(&output, package))
    }

    async fn install(&self, serial: &str, apk: &Path) -> Result<(), AdbError> {
        let apk = apk.to_string_lossy();
        let output = exec("adb", &["-s", serial, "install", apk.as_ref()]).await?;
        // Older adb versions report install failures on stdout with a zero
        // exit code.
        if output.contains("Failure") {
            return Err(AdbError::CommandFailed {
                tool: "adb",
                message: output.trim().to_string(),
            });
        }
        Ok(())
    }

    async fn uninstall(&self, serial: &str, package: &str) -> Result<(), AdbError> {
        let output = exec("adb", &["-s", serial, "uninstall", package]).await?;
        if output.contains("Failure") {
            return Err(AdbError::CommandFailed {
                tool: "adb",
                message: format!("uninstall {package}: {}", output.trim()),
            });
        }
        Ok(())
    }

    async fn package_name(&self, apk: &Path) -> Result<String, AdbError> {
        let apk = apk.to_string_lossy();
        let output = exec("aapt", &["dump", "badging", apk.as_ref()]).await?;
        parse_badging_package(&output).ok_or_else(|| AdbError::UnexpectedOutput {
            tool: "aapt",
            message: format!("no package name in badging for {apk}"),
        })
    }
}

/// Runs a tool to completion and returns its stdout.
///
/// A non-zero exit wraps the tool's stderr (falling back to stdout) into
/// [`AdbError::CommandFailed`].
async fn exec(tool: &'static str, args: &[&str]) -> Result<String, AdbError> {
    debug!(tool, ?args, "running device command");
    let output = Command::new(tool)
        .args(args)
        .output()
        .await
        .map_err(|source| AdbError::Io { tool, source })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(AdbError::CommandFailed { tool, message });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses `adb devices -l` output into device rows.
///
/// Exposed for testing against captured listings.
pub fn parse_devices_output(output: &str) -> Vec<DeviceInfo> {
    output
        .lines()
        .skip(1) // "List of devices attached" header
        .filter_map(parse_device_line)
        .collect()
}

fn parse_device_line(line: &str) -> Option<DeviceInfo> {
    let mut fields = line.split_whitespace();
    let serial = fields.next()?.to_string();
    let state = fields.next()?.to_string();

    let mut name = None;
    let mut model = None;
    for field in fields {
        if let Some(value) = field.strip_prefix("device:") {
            name = Some(value.to_string());
        } else if let Some(value) = field.strip_prefix("model:") {
            model = Some(value.to_string());
        }
    }

    Some(DeviceInfo {
        serial,
        state,
        name: name.or(model),
    })
}

/// Returns whether `pm list packages` output contains `package` exactly.
///
/// `pm list packages <q>` substring-matches, so `com.example.app` also lists
/// `com.example.app.test`; the comparison here must be exact.
pub fn package_listed(output: &str, package: &str) -> bool {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .any(|listed| listed == package)
}

/// Extracts the package name from `aapt dump badging` output.
pub fn parse_badging_package(output: &str) -> Option<String> {
    let line = output
        .lines()
        .find(|line| line.starts_with("package:"))?;
    let start = line.find("name='")? + "name='".len();
    let rest = &line[start..];
    let end = rest.find('\'')?;
    Some(rest[..end].to_string())
}
