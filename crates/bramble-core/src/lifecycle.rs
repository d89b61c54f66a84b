//! Application lifecycle: from an artifact and a configuration to a running,
//! bridged [`Application`](crate::application::Application).
//!
//! [`Runner`] orchestrates the full startup sequence:
//!
//! 1. **Validate** the application artifact (exists, `.apk` extension)
//! 2. **Provision** the runtime bundle and generate the test-server
//!    companion artifact into `test_servers/` beside the application
//! 3. **Resolve** the target device (see [`crate::resolver`])
//! 4. **Reconcile** the installed state, honoring the reinstall flag
//! 5. **Open** the bridge session and hand back an [`Application`]
//!
//! Any install or uninstall failure aborts the startup; no partially
//! initialized Application is ever returned. Resolver failures propagate
//! unchanged so callers can match on the specific diagnosis.
//!
//! # Example
//!
//! ```no_run
//! use bramble_core::config::Configuration;
//! use bramble_core::lifecycle::Runner;
//!
//! # async fn example() -> Result<(), bramble_core::error::Error> {
//! let config = Configuration {
//!     serial: Some("emulator-5554".to_string()),
//!     ..Default::default()
//! };
//! let mut runner = Runner::new("build/app-debug.apk", config)?;
//! runner.setup().await?;
//! let app = runner.start().await?;
//! assert_eq!(app.installed_on_serial(), "emulator-5554");
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::adb::{Adb, DeviceCommands};
use crate::application::Application;
use crate::bridge::{HelperLauncher, ProcessLauncher, WrapperBridge};
use crate::bundle;
use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::resolver;

/// Checks that `path` names an existing `.apk` file.
pub(crate) fn validate_artifact(path: &Path) -> Result<()> {
    let is_apk = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("apk"));
    if !is_apk || !path.is_file() {
        return Err(Error::InvalidApk(path.to_path_buf()));
    }
    Ok(())
}

/// Package name of the generated test-server companion.
fn companion_package(package: &str) -> String {
    format!("{package}.test")
}

/// Outcome of [`Runner::setup`], cached for [`Runner::start`].
#[derive(Debug, Clone)]
struct Prepared {
    package: String,
    test_server: PathBuf,
}

/// Drives one application through setup and start.
pub struct Runner {
    apk: PathBuf,
    configuration: Configuration,
    commands: Arc<dyn DeviceCommands>,
    launcher: Arc<dyn HelperLauncher>,
    prepared: Option<Prepared>,
}

impl Runner {
    /// Creates a runner over the real `adb`/`aapt` tools and the bundled
    /// helper executable.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidApk`] when the artifact is missing or not an `.apk`.
    pub fn new(apk_path: impl Into<PathBuf>, configuration: Configuration) -> Result<Self> {
        Self::with_collaborators(
            apk_path,
            configuration,
            Arc::new(Adb),
            Arc::new(ProcessLauncher),
        )
    }

    /// Creates a runner with explicit collaborators, for substituting fakes.
    pub fn with_collaborators(
        apk_path: impl Into<PathBuf>,
        configuration: Configuration,
        commands: Arc<dyn DeviceCommands>,
        launcher: Arc<dyn HelperLauncher>,
    ) -> Result<Self> {
        let apk = apk_path.into();
        validate_artifact(&apk)?;
        Ok(Self {
            apk,
            configuration,
            commands,
            launcher,
            prepared: None,
        })
    }

    /// The configuration this runner was created with.
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Provisions the runtime bundle and generates the test-server
    /// companion artifact.
    ///
    /// Idempotent: a second call returns without redoing the work.
    pub async fn setup(&mut self) -> Result<()> {
        self.ensure_setup().await.map(|_| ())
    }

    async fn ensure_setup(&mut self) -> Result<Prepared> {
        if let Some(prepared) = &self.prepared {
            return Ok(prepared.clone());
        }

        let runtime_dir = bundle::ensure(env!("CARGO_PKG_VERSION"))?;
        let package = self.commands.package_name(&self.apk).await?;
        let test_server = generate_test_server(&self.apk, &package, &runtime_dir)?;
        info!(package, test_server = %test_server.display(), "runner set up");

        let prepared = Prepared {
            package,
            test_server,
        };
        self.prepared = Some(prepared.clone());
        Ok(prepared)
    }

    /// Resolves a device, reconciles the installed application state, opens
    /// the bridge session, and returns the bound [`Application`].
    ///
    /// Runs [`setup`](Self::setup) first when it has not happened yet.
    ///
    /// # Errors
    ///
    /// - The resolver diagnoses ([`Error::SerialNotFound`],
    ///   [`Error::DeviceNotRunning`], [`Error::NoDeviceConfigured`]),
    ///   propagated unchanged
    /// - [`Error::Adb`] when an install or uninstall fails, fatal for the
    ///   whole call
    /// - [`Error::Bridge`] when the helper session cannot be opened
    pub async fn start(&mut self) -> Result<Application> {
        let prepared = self.ensure_setup().await?;
        let serial = resolver::resolve(self.commands.as_ref(), &self.configuration).await?;
        info!(serial, package = prepared.package, "starting application");

        self.reconcile_install(&serial, &prepared).await?;

        let mut bridge = WrapperBridge::with_launcher(
            self.apk.clone(),
            prepared.package.clone(),
            serial.clone(),
            self.launcher.clone(),
        );
        bridge.setup().await?;

        Ok(Application::new(
            prepared.package,
            serial,
            bridge,
            &self.configuration,
        ))
    }

    /// Brings the device to "application and companion installed".
    ///
    /// With the application already installed and the reinstall flag off, no
    /// uninstall is ever issued; with the flag on, both packages are removed
    /// before installing fresh copies.
    async fn reconcile_install(&self, serial: &str, prepared: &Prepared) -> Result<()> {
        let commands = self.commands.as_ref();
        let package = &prepared.package;
        let companion = companion_package(package);

        let installed = commands.is_installed(serial, package).await?;

        if installed && !self.configuration.should_reinstall_app {
            debug!(serial, package, "application already installed");
            if !commands.is_installed(serial, &companion).await? {
                commands.install(serial, &prepared.test_server).await?;
            }
            return Ok(());
        }

        if installed {
            debug!(serial, package, "reinstall requested, uninstalling");
            commands.uninstall(serial, package).await?;
            if commands.is_installed(serial, &companion).await? {
                commands.uninstall(serial, &companion).await?;
            }
        }

        commands.install(serial, &self.apk).await?;
        commands.install(serial, &prepared.test_server).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("apk", &self.apk)
            .field("prepared", &self.prepared.is_some())
            .finish()
    }
}

/// Writes the test-server companion for this run into `test_servers/`
/// beside the application artifact, replacing any previous one so the
/// directory holds exactly one companion per run.
fn generate_test_server(apk: &Path, package: &str, runtime_dir: &Path) -> Result<PathBuf> {
    let parent = match apk.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let dir = parent.join("test_servers");
    fs::create_dir_all(&dir).map_err(|source| Error::Write {
        path: dir.clone(),
        source,
    })?;

    // Drop companions from earlier runs.
    if let Ok(entries) = fs::read_dir(&dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "apk") {
                let _ = fs::remove_file(path);
            }
        }
    }

    let target = dir.join(format!("{package}-test-server.apk"));
    let template = bundle::server_template(runtime_dir);
    fs::copy(&template, &target).map_err(|source| Error::Write {
        path: target.clone(),
        source,
    })?;

    debug!(target = %target.display(), "test server generated");
    Ok(target)
}
