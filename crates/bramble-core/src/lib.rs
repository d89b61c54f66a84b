//! # bramble-core
//!
//! Core library for automated UI testing of Android applications.
//!
//! Given an application artifact and a [`Configuration`](config::Configuration),
//! this crate resolves a target device over adb, installs the application
//! together with a generated test-server companion, opens a command bridge
//! to a long-lived helper process that inspects and drives the on-device UI
//! tree, and exposes query/action/poll primitives to the test author.
//!
//! ## Modules
//!
//! - [`lifecycle`] - [`Runner`](lifecycle::Runner): validate, set up, and start an application
//! - [`application`] - The bound [`Application`](application::Application) handle
//! - [`bridge`] - Session management for the on-device helper process
//! - [`protocol`] - Framed wire envelope spoken to the helper
//! - [`elements`] - Element snapshots, queries, and pre-order tree walks
//! - [`resolver`] - Device resolution from a loose configuration
//! - [`poll`] - Deadline polling for eventually-true conditions
//! - [`adb`] - The Android command-line tool boundary
//! - [`bundle`] - Provisioning of the embedded runtime support bundle
//! - [`config`] - Run configuration
//! - [`session_log`] - Per-run operation log
//! - [`error`] - Crate error with the operational/timeout kind split
//!
//! ## External Dependencies
//!
//! The Android SDK platform tools (`adb`) and build tools (`aapt`) must be
//! installed and on `PATH`. Devices are never booted by this crate; the
//! target device or emulator must already be running.
//!
//! ## Example
//!
//! ```no_run
//! use bramble_core::config::Configuration;
//! use bramble_core::lifecycle::Runner;
//! use bramble_core::poll::WaitOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bramble_core::error::Error> {
//!     let config = Configuration {
//!         serial: Some("emulator-5554".to_string()),
//!         ..Default::default()
//!     };
//!
//!     let mut runner = Runner::new("build/app-debug.apk", config)?;
//!     runner.setup().await?;
//!     let app = runner.start().await?;
//!
//!     // Wait for the login button, then press it.
//!     let options = WaitOptions {
//!         failure_message: "login button never appeared".to_string(),
//!         ..Default::default()
//!     };
//!     app.wait_for(
//!         || async { Ok(app.query("button marked:'Log in'").await?.len() == 1) },
//!         &options,
//!     )
//!     .await?;
//!     app.query("button marked:'Log in'").await?.first()?.touch().await?;
//!
//!     app.close().await?;
//!     Ok(())
//! }
//! ```

pub mod adb;
pub mod application;
pub mod bridge;
pub mod bundle;
pub mod config;
pub mod elements;
pub mod error;
pub mod lifecycle;
pub mod poll;
pub mod protocol;
pub mod resolver;
pub mod session_log;
