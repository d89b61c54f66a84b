//! Shared fakes for integration tests: a scripted in-memory helper process
//! and a recording implementation of the device command boundary.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use bramble_core::adb::{AdbError, DeviceCommands, DeviceInfo};
use bramble_core::bridge::{BridgeError, BridgeSession, HelperLauncher, LaunchContext};
use bramble_core::protocol::{decode_request, encode_response, read_frame_length, Response};

/// Starts a mock helper task that answers each incoming request with the
/// next scripted response, recording request names into `seen`.
///
/// When the script runs out the task returns, dropping its end of the
/// stream, so the session sees EOF on the next request.
pub fn scripted_session(
    responses: Vec<Response>,
    seen: Arc<Mutex<Vec<String>>>,
) -> BridgeSession {
    let (client, mut server) = tokio::io::duplex(256 * 1024);

    tokio::spawn(async move {
        for response in responses {
            let mut header = [0u8; 4];
            if server.read_exact(&mut header).await.is_err() {
                return;
            }
            let len = read_frame_length(&header) as usize;
            let mut payload = vec![0u8; len];
            if server.read_exact(&mut payload).await.is_err() {
                return;
            }
            let request = decode_request(&payload).expect("mock received malformed request");
            seen.lock().unwrap().push(request.name().to_string());

            let frame = encode_response(&response).expect("mock response encodes");
            if server.write_all(&frame).await.is_err() {
                return;
            }
            let _ = server.flush().await;
        }
    });

    BridgeSession::from_stream(client)
}

/// A [`HelperLauncher`] that hands out one scripted session.
///
/// A second launch attempt fails, which doubles as an assertion that setup
/// runs at most once.
pub struct ScriptedLauncher {
    script: Mutex<Option<Vec<Response>>>,
    /// Names of the requests the mock helper has served, in order.
    pub seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLauncher {
    pub fn new(script: Vec<Response>) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn seen_requests(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HelperLauncher for ScriptedLauncher {
    async fn launch(&self, _context: &LaunchContext) -> Result<BridgeSession, BridgeError> {
        let script = self
            .script
            .lock()
            .unwrap()
            .take()
            .ok_or(BridgeError::NotOpen)?;
        Ok(scripted_session(script, self.seen.clone()))
    }
}

/// Recording fake of the device command boundary.
///
/// One simulated device listing, one package universe, and a call trace the
/// test can assert on.
pub struct RecordingCommands {
    devices: Vec<DeviceInfo>,
    package: String,
    installed: Mutex<HashSet<String>>,
    /// Flat trace of install/uninstall invocations, in order.
    pub calls: Mutex<Vec<String>>,
    fail_install: bool,
}

impl RecordingCommands {
    pub fn new(devices: Vec<DeviceInfo>, package: &str) -> Self {
        Self {
            devices,
            package: package.to_string(),
            installed: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            fail_install: false,
        }
    }

    pub fn with_installed(self, packages: &[&str]) -> Self {
        {
            let mut installed = self.installed.lock().unwrap();
            for package in packages {
                installed.insert((*package).to_string());
            }
        }
        self
    }

    pub fn failing_installs(mut self) -> Self {
        self.fail_install = true;
        self
    }

    pub fn call_trace(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Maps an artifact path onto the package it would install. The mock
    /// recognizes the generated companion by its file name.
    fn package_for(&self, apk: &Path) -> String {
        let name = apk.file_name().map(|n| n.to_string_lossy().to_string());
        if name.is_some_and(|n| n.contains("test-server")) {
            format!("{}.test", self.package)
        } else {
            self.package.clone()
        }
    }
}

pub fn online_device(serial: &str, name: Option<&str>) -> DeviceInfo {
    DeviceInfo {
        serial: serial.to_string(),
        state: "device".to_string(),
        name: name.map(str::to_string),
    }
}

#[async_trait]
impl DeviceCommands for RecordingCommands {
    async fn devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
        Ok(self.devices.clone())
    }

    async fn is_installed(&self, _serial: &str, package: &str) -> Result<bool, AdbError> {
        Ok(self.installed.lock().unwrap().contains(package))
    }

    async fn install(&self, _serial: &str, apk: &Path) -> Result<(), AdbError> {
        if self.fail_install {
            return Err(AdbError::CommandFailed {
                tool: "adb",
                message: "INSTALL_FAILED_INSUFFICIENT_STORAGE".to_string(),
            });
        }
        let package = self.package_for(apk);
        self.calls.lock().unwrap().push(format!("install {package}"));
        self.installed.lock().unwrap().insert(package);
        Ok(())
    }

    async fn uninstall(&self, _serial: &str, package: &str) -> Result<(), AdbError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("uninstall {package}"));
        self.installed.lock().unwrap().remove(package);
        Ok(())
    }

    async fn package_name(&self, _apk: &Path) -> Result<String, AdbError> {
        Ok(self.package.clone())
    }
}
