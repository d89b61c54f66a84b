//! Device resolution: turning a loose configuration into exactly one serial.
//!
//! Resolution re-queries the device listing on every call. Device state
//! changes underneath this process (emulators stop, cables drop), so a
//! cached listing would silently route commands at the wrong device.

use tracing::debug;

use crate::adb::DeviceCommands;
use crate::config::Configuration;
use crate::error::{Error, Result};

/// Resolves the configuration to the serial of one running device.
///
/// Precedence: an explicit `serial` wins over `device_name`; with neither
/// set, resolution fails. In every failing case the error names the
/// identifier that could not be matched.
///
/// # Errors
///
/// - [`Error::SerialNotFound`] when the configured serial is absent from the
///   listing or not online
/// - [`Error::DeviceNotRunning`] when no online device matches the
///   configured name
/// - [`Error::NoDeviceConfigured`] when the configuration names nothing
/// - [`Error::Adb`] when the listing itself cannot be obtained
pub async fn resolve(commands: &dyn DeviceCommands, config: &Configuration) -> Result<String> {
    let devices = commands.devices().await?;
    debug!(count = devices.len(), "resolved device listing");

    if let Some(serial) = &config.serial {
        return if devices.iter().any(|d| &d.serial == serial && d.is_online()) {
            Ok(serial.clone())
        } else {
            Err(Error::SerialNotFound(serial.clone()))
        };
    }

    if let Some(name) = &config.device_name {
        return devices
            .iter()
            .find(|d| d.is_online() && d.name.as_deref() == Some(name.as_str()))
            .map(|d| d.serial.clone())
            .ok_or_else(|| Error::DeviceNotRunning(name.clone()));
    }

    Err(Error::NoDeviceConfigured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::{AdbError, DeviceInfo};
    use async_trait::async_trait;
    use std::path::Path;
    use std::result::Result;

    struct FakeCommands {
        devices: Vec<DeviceInfo>,
    }

    #[async_trait]
    impl DeviceCommands for FakeCommands {
        async fn devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
            Ok(self.devices.clone())
        }

        async fn is_installed(&self, _serial: &str, _package: &str) -> Result<bool, AdbError> {
            Ok(false)
        }

        async fn install(&self, _serial: &str, _apk: &Path) -> Result<(), AdbError> {
            Ok(())
        }

        async fn uninstall(&self, _serial: &str, _package: &str) -> Result<(), AdbError> {
            Ok(())
        }

        async fn package_name(&self, _apk: &Path) -> Result<String, AdbError> {
            Ok("com.example.app".to_string())
        }
    }

    fn device(serial: &str, state: &str, name: Option<&str>) -> DeviceInfo {
        DeviceInfo {
            serial: serial.to_string(),
            state: state.to_string(),
            name: name.map(str::to_string),
        }
    }

    fn config(serial: Option<&str>, name: Option<&str>) -> Configuration {
        Configuration {
            serial: serial.map(str::to_string),
            device_name: name.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn serial_resolves_when_online() {
        let commands = FakeCommands {
            devices: vec![device("emulator-5554", "device", Some("emu64x"))],
        };

        let serial = resolve(&commands, &config(Some("emulator-5554"), None))
            .await
            .unwrap();
        assert_eq!(serial, "emulator-5554");
    }

    #[tokio::test]
    async fn serial_absent_from_listing_fails() {
        let commands = FakeCommands {
            devices: vec![device("emulator-5554", "device", None)],
        };

        let err = resolve(&commands, &config(Some("emulator-x"), None))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "emulator-x not found in the device list, installation failed"
        );
    }

    #[tokio::test]
    async fn serial_present_but_offline_fails() {
        let commands = FakeCommands {
            devices: vec![device("emulator-5554", "offline", None)],
        };

        let err = resolve(&commands, &config(Some("emulator-5554"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SerialNotFound(ref s) if s == "emulator-5554"));
    }

    #[tokio::test]
    async fn device_name_resolves_to_matching_online_device() {
        let commands = FakeCommands {
            devices: vec![
                device("emulator-5554", "offline", Some("pixel_9")),
                device("emulator-5556", "device", Some("pixel_9")),
            ],
        };

        let serial = resolve(&commands, &config(None, Some("pixel_9")))
            .await
            .unwrap();
        assert_eq!(serial, "emulator-5556");
    }

    #[tokio::test]
    async fn device_name_with_no_online_match_fails() {
        let commands = FakeCommands {
            devices: vec![device("emulator-5554", "offline", Some("pixel_9"))],
        };

        let err = resolve(&commands, &config(None, Some("pixel_9")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeviceNotRunning(ref n) if n == "pixel_9"));
        assert!(err.to_string().contains("pixel_9"));
    }

    #[tokio::test]
    async fn nothing_configured_fails() {
        let commands = FakeCommands { devices: vec![] };

        let err = resolve(&commands, &config(None, None)).await.unwrap_err();
        assert!(matches!(err, Error::NoDeviceConfigured));
    }

    #[tokio::test]
    async fn serial_takes_precedence_over_device_name() {
        // The name would match, but the bogus serial must decide the outcome.
        let commands = FakeCommands {
            devices: vec![device("emulator-5554", "device", Some("pixel_9"))],
        };

        let err = resolve(&commands, &config(Some("emulator-x"), Some("pixel_9")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SerialNotFound(_)));
    }
}
