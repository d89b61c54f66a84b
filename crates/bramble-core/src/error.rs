//! Crate-level error type with an operational/timeout kind discriminator.
//!
//! Subsystems keep their own `thiserror` enums ([`AdbError`], [`ProvisionError`],
//! [`BridgeError`]) and this module wraps them into a single [`Error`] so that
//! callers of the high-level API handle one type. The one thing callers
//! routinely need to distinguish is a polling deadline expiring from everything
//! else, so [`Error::kind`] exposes exactly that split instead of a deep
//! error taxonomy.
//!
//! # Example
//!
//! ```
//! use bramble_core::error::{Error, ErrorKind};
//!
//! let err = Error::WaitTimeout("login button never appeared".to_string());
//! assert_eq!(err.kind(), ErrorKind::Timeout);
//! assert_eq!(err.to_string(), "login button never appeared");
//! ```

use std::path::PathBuf;

use thiserror::Error;

use crate::adb::AdbError;
use crate::bridge::BridgeError;
use crate::bundle::ProvisionError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The two failure categories callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Anything that went wrong while talking to the device, the helper
    /// process, or the filesystem. Carries a diagnosis naming the offending
    /// identifier.
    Operational,

    /// A polling deadline elapsed. Raised only by the wait engine, carrying
    /// the caller-supplied message verbatim.
    Timeout,
}

/// Unified error for all bramble operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The application artifact does not exist or is not an `.apk` file.
    #[error("invalid path to apk file: {}", .0.display())]
    InvalidApk(PathBuf),

    /// A configured serial was not present (or not online) in the device list.
    #[error("{0} not found in the device list, installation failed")]
    SerialNotFound(String),

    /// A configured device name did not match any online device.
    #[error("device '{0}' is not running, no online device matched it")]
    DeviceNotRunning(String),

    /// Neither a serial nor a device name was configured.
    #[error("could not determine device serial; set serial or device name in configuration")]
    NoDeviceConfigured,

    /// A query produced no elements but one was requested.
    #[error("no element matched the query '{0}'")]
    ElementNotFound(String),

    /// A produced artifact (test server, screenshot) could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// The path that could not be written.
        path: PathBuf,
        /// The underlying filesystem error.
        source: std::io::Error,
    },

    /// Runtime bundle provisioning failed.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// A device command-line invocation failed.
    #[error(transparent)]
    Adb(#[from] AdbError),

    /// The helper-process bridge failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// A `wait_for` deadline elapsed. The message is the caller-supplied
    /// failure message, unmodified.
    #[error("{0}")]
    WaitTimeout(String),
}

impl Error {
    /// Returns which of the two failure categories this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::WaitTimeout(_) => ErrorKind::Timeout,
            _ => ErrorKind::Operational,
        }
    }

    /// Shorthand for `kind() == ErrorKind::Timeout`.
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}
