//! The Application handle returned by a successful start.
//!
//! An [`Application`] is bound to exactly one device serial for its lifetime
//! and exclusively owns its bridge session. Every operation it performs is
//! one serialized round-trip through the bridge and is appended to the
//! per-run session log.

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::bridge::WrapperBridge;
use crate::config::Configuration;
use crate::elements::{TreeWalk, UIElements};
use crate::error::{Error, Result};
use crate::poll::{self, WaitOptions, WaitOutcome};
use crate::session_log::SessionLog;

/// A running, instrumented application on one device.
pub struct Application {
    package_name: String,
    installed_on_serial: String,
    bridge: WrapperBridge,
    log: SessionLog,
    default_wait: WaitOptions,
}

impl Application {
    pub(crate) fn new(
        package_name: String,
        installed_on_serial: String,
        bridge: WrapperBridge,
        configuration: &Configuration,
    ) -> Self {
        let log = SessionLog::create(&configuration.logs_directory);
        info!(
            package = package_name,
            serial = installed_on_serial,
            run_id = %log.run_id(),
            "application started"
        );
        Self {
            package_name,
            installed_on_serial,
            bridge,
            log,
            default_wait: configuration.default_wait.clone(),
        }
    }

    /// Package name of the application under test.
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Serial of the device this application was installed on. Set once at
    /// start and never changes.
    pub fn installed_on_serial(&self) -> &str {
        &self.installed_on_serial
    }

    /// Evaluates a selector against the current UI, immediately.
    ///
    /// The returned [`UIElements`] are a snapshot: they do not update when
    /// the UI changes afterwards.
    pub async fn query(&self, selector: &str) -> Result<UIElements> {
        let result = self.bridge.query(selector).await;
        self.log_outcome("query", Some(selector), &result);
        result
    }

    /// Walks the live UI tree in pre-order, root at depth 0.
    pub async fn inspect(&self) -> Result<TreeWalk> {
        let result = self.bridge.inspect().await;
        self.log_outcome("inspect", None, &result);
        result
    }

    /// Polls `condition` until it succeeds or `options` runs out of time.
    ///
    /// See [`poll::wait_for`] for the exact retry semantics.
    pub async fn wait_for<F, Fut>(&self, condition: F, options: &WaitOptions) -> Result<WaitOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let result = poll::wait_for(condition, options).await;
        self.log_outcome("wait_for", Some(&options.failure_message), &result);
        result
    }

    /// [`wait_for`](Self::wait_for) with the configuration's default wait
    /// options.
    pub async fn wait_with_defaults<F, Fut>(&self, condition: F) -> Result<WaitOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let options = self.default_wait.clone();
        self.wait_for(condition, &options).await
    }

    /// Captures the screen into `target_dir` as the next sequentially
    /// numbered `<name_prefix>_<n>.png`.
    pub async fn take_screenshot(&self, target_dir: &Path, name_prefix: &str) -> Result<PathBuf> {
        let result = self.screenshot_inner(target_dir, name_prefix).await;
        self.log_outcome("take_screenshot", Some(name_prefix), &result);
        result
    }

    async fn screenshot_inner(&self, target_dir: &Path, name_prefix: &str) -> Result<PathBuf> {
        let bytes = self.bridge.take_screenshot().await?;

        fs::create_dir_all(target_dir).map_err(|source| Error::Write {
            path: target_dir.to_path_buf(),
            source,
        })?;
        let index = next_screenshot_index(target_dir, name_prefix);
        let path = target_dir.join(format!("{name_prefix}_{index}.png"));
        fs::write(&path, bytes).map_err(|source| Error::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Reads a shared-preferences file of the application under test.
    pub async fn read_preferences(&self, file_name: &str) -> Result<HashMap<String, String>> {
        let result = self.bridge.read_preferences(file_name).await;
        self.log_outcome("read_preferences", Some(file_name), &result);
        result
    }

    /// Ends the session and terminates the helper process.
    ///
    /// Dropping the Application releases the helper too; `close` just makes
    /// the teardown explicit and synchronous.
    pub async fn close(mut self) -> Result<()> {
        let result = self.bridge.close().await;
        self.log_outcome("close", None, &result);
        result
    }

    fn log_outcome<T>(&self, operation: &str, detail: Option<&str>, result: &Result<T>) {
        let error = result.as_ref().err().map(|e| e.to_string());
        self.log.record(operation, detail, error.as_deref());
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("package_name", &self.package_name)
            .field("installed_on_serial", &self.installed_on_serial)
            .field("bridge", &self.bridge)
            .finish()
    }
}

/// Next free index for `<prefix>_<n>.png` in `dir`. Numbering starts at 0
/// and continues past the highest existing capture.
fn next_screenshot_index(dir: &Path, prefix: &str) -> u32 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let stem = name
                .strip_prefix(prefix)?
                .strip_prefix('_')?
                .strip_suffix(".png")?;
            stem.parse::<u32>().ok()
        })
        .max()
        .map_or(0, |max| max + 1)
}
