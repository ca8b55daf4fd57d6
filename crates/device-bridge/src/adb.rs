//! adb client
//!
//! Shells out to the SDK's adb binary for device listing, installs,
//! launches and port forwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use droidrun_core::{Device, DeviceKind, DeviceState, PortMapping};
use droidrun_sdk::Sdk;
use tokio::process::Command;
use tracing::{debug, info};

/// Polling cadence for `sys.boot_completed`.
const BOOT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Boot polls before giving up.
const BOOT_WAIT_ATTEMPTS: u32 = 300;
/// Polling cadence while waiting for an app process to exit.
const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// adb errors
#[derive(Debug, thiserror::Error)]
pub enum AdbError {
    #[error("adb not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("adb command failed: {0}")]
    CommandFailed(String),
    #[error("install of {apk} on {serial} failed: {reason}")]
    InstallFailed {
        apk: String,
        serial: String,
        reason: String,
    },
    #[error("launch failed: {0}")]
    LaunchFailed(String),
    #[error("device {0} did not finish booting in time")]
    BootTimeout(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// adb client bound to one SDK install.
pub struct AdbClient {
    adb: PathBuf,
}

impl AdbClient {
    /// Client for the given SDK.
    pub fn new(sdk: &Sdk) -> Self {
        Self::with_adb(sdk.adb_path())
    }

    /// Client for an explicit adb binary.
    pub fn with_adb(adb: PathBuf) -> Self {
        Self { adb }
    }

    async fn output(&self, args: &[&str]) -> Result<std::process::Output, AdbError> {
        if !self.adb.exists() {
            return Err(AdbError::NotFound(self.adb.clone()));
        }
        debug!("adb {:?}", args);
        Ok(Command::new(&self.adb).args(args).output().await?)
    }

    async fn run(&self, args: &[&str]) -> Result<String, AdbError> {
        let output = self.output(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdbError::CommandFailed(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn run_for_device(&self, serial: &str, args: &[&str]) -> Result<String, AdbError> {
        let mut full_args = vec!["-s", serial];
        full_args.extend(args);
        self.run(&full_args).await
    }

    /// Connected devices, with running virtual entries asked for the AVD
    /// they were booted from.
    pub async fn devices(&self) -> Result<Vec<Device>, AdbError> {
        let output = self.run(&["devices", "-l"]).await?;
        let mut devices = parse_devices(&output);
        for device in &mut devices {
            if device.is_virtual() && device.is_usable() {
                // A console query failure leaves the AVD id unknown.
                device.avd_id = self.avd_name(&device.serial).await.ok();
            }
        }
        Ok(devices)
    }

    /// The AVD id a running emulator was booted from.
    pub async fn avd_name(&self, serial: &str) -> Result<String, AdbError> {
        let output = self.run_for_device(serial, &["emu", "avd", "name"]).await?;
        parse_avd_name(&output)
            .ok_or_else(|| AdbError::CommandFailed(format!("no AVD name from {serial}")))
    }

    /// Poll `sys.boot_completed` until the device reports fully booted.
    /// Transient shell failures count as not booted yet.
    pub async fn wait_for_boot(&self, serial: &str) -> Result<(), AdbError> {
        for _ in 0..BOOT_WAIT_ATTEMPTS {
            match self
                .run_for_device(serial, &["shell", "getprop", "sys.boot_completed"])
                .await
            {
                Ok(output) if output.trim() == "1" => return Ok(()),
                Ok(_) => {}
                Err(err) => debug!("boot probe on {serial}: {err}"),
            }
            tokio::time::sleep(BOOT_POLL_INTERVAL).await;
        }
        Err(AdbError::BootTimeout(serial.to_string()))
    }

    /// Map a device port onto a host port (`adb reverse`).
    pub async fn reverse(&self, serial: &str, mapping: &PortMapping) -> Result<(), AdbError> {
        let device = format!("tcp:{}", mapping.device);
        let host = format!("tcp:{}", mapping.host);
        self.run_for_device(serial, &["reverse", &device, &host])
            .await?;
        Ok(())
    }

    /// Remove a reverse mapping.
    pub async fn unreverse(&self, serial: &str, mapping: &PortMapping) -> Result<(), AdbError> {
        let device = format!("tcp:{}", mapping.device);
        self.run_for_device(serial, &["reverse", "--remove", &device])
            .await?;
        Ok(())
    }

    /// Install the APK, uninstalling first when the installed version is
    /// incompatible with the new one.
    pub async fn install(&self, serial: &str, apk: &Path, app_id: &str) -> Result<(), AdbError> {
        match self.try_install(serial, apk).await {
            Err(AdbError::InstallFailed { reason, .. }) if needs_uninstall(&reason) => {
                info!("incompatible install on {serial}, uninstalling {app_id} first");
                self.uninstall(serial, app_id).await?;
                self.try_install(serial, apk).await
            }
            result => result,
        }
    }

    async fn try_install(&self, serial: &str, apk: &Path) -> Result<(), AdbError> {
        let path = apk.to_string_lossy();
        let output = self.output(&["-s", serial, "install", "-r", &path]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Older adb reports install failures on stdout with exit code 0.
        if !output.status.success() || stdout.contains("Failure") {
            let reason = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(AdbError::InstallFailed {
                apk: apk.display().to_string(),
                serial: serial.to_string(),
                reason: reason.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Uninstall a package.
    pub async fn uninstall(&self, serial: &str, app_id: &str) -> Result<(), AdbError> {
        self.run_for_device(serial, &["uninstall", app_id]).await?;
        Ok(())
    }

    /// Start an activity and wait for the launch to be acknowledged.
    pub async fn start_activity(
        &self,
        serial: &str,
        app_id: &str,
        activity: &str,
    ) -> Result<(), AdbError> {
        let component = format!("{app_id}/{activity}");
        let output = self
            .run_for_device(serial, &["shell", "am", "start", "-W", "-n", &component])
            .await?;
        // am reports failures on stdout with a zero exit code.
        if output.contains("Error") {
            return Err(AdbError::LaunchFailed(output.trim().to_string()));
        }
        Ok(())
    }

    /// Block until the app's process goes away. `pidof` exits non-zero
    /// with empty stderr once the process is gone; stderr output means
    /// the transport itself failed.
    pub async fn wait_for_close(&self, serial: &str, app_id: &str) -> Result<(), AdbError> {
        loop {
            let output = self
                .output(&["-s", serial, "shell", "pidof", app_id])
                .await?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    return Ok(());
                }
                return Err(AdbError::CommandFailed(stderr.to_string()));
            }
            tokio::time::sleep(CLOSE_POLL_INTERVAL).await;
        }
    }

    /// Force-stop the application.
    pub async fn force_stop(&self, serial: &str, app_id: &str) -> Result<(), AdbError> {
        self.run_for_device(serial, &["shell", "am", "force-stop", app_id])
            .await?;
        Ok(())
    }
}

// Install failures an uninstall-then-retry can clear.
fn needs_uninstall(reason: &str) -> bool {
    reason.contains("INSTALL_FAILED_VERSION_DOWNGRADE")
        || reason.contains("INSTALL_FAILED_UPDATE_INCOMPATIBLE")
}

/// Parse `adb devices -l` output into device records.
fn parse_devices(output: &str) -> Vec<Device> {
    let mut devices = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        // Header plus daemon startup notices.
        if line.is_empty() || line.starts_with('*') || line.starts_with("List of devices") {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(serial), Some(state)) = (parts.next(), parts.next()) else {
            continue;
        };
        let mut model = None;
        let mut product = None;
        let mut transport_id = None;
        for part in parts {
            if let Some(value) = part.strip_prefix("model:") {
                model = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("product:") {
                product = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("transport_id:") {
                transport_id = Some(value.to_string());
            }
        }
        let kind = if serial.starts_with("emulator-") {
            DeviceKind::Virtual
        } else {
            DeviceKind::Hardware
        };
        devices.push(Device {
            serial: serial.to_string(),
            state: DeviceState::from(state),
            kind,
            avd_id: None,
            model,
            product,
            transport_id,
        });
    }
    devices
}

/// First line of `adb emu avd name` output; the trailing `OK` is console
/// chatter.
fn parse_avd_name(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .filter(|line| *line != "OK")
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICES_OUTPUT: &str = "\
List of devices attached
* daemon not running; starting now at tcp:5037
* daemon started successfully
emulator-5554          device product:sdk_gphone64_x86_64 model:sdk_gphone64_x86_64 device:emu64xa transport_id:1
98301FFAZ000TL         device usb:1-4 product:raven model:Pixel_6_Pro device:raven transport_id:2
0a388e93               unauthorized usb:1-1 transport_id:3

";

    #[test]
    fn parses_device_listing() {
        let devices = parse_devices(DEVICES_OUTPUT);
        assert_eq!(devices.len(), 3);

        assert_eq!(devices[0].serial, "emulator-5554");
        assert_eq!(devices[0].kind, DeviceKind::Virtual);
        assert_eq!(devices[0].state, DeviceState::Online);
        assert_eq!(devices[0].model.as_deref(), Some("sdk_gphone64_x86_64"));
        assert_eq!(devices[0].transport_id.as_deref(), Some("1"));

        assert_eq!(devices[1].serial, "98301FFAZ000TL");
        assert_eq!(devices[1].kind, DeviceKind::Hardware);
        assert_eq!(devices[1].product.as_deref(), Some("raven"));

        assert_eq!(devices[2].state, DeviceState::Unauthorized);
        assert!(devices[2].model.is_none());
    }

    #[test]
    fn parses_avd_name_from_console_output() {
        assert_eq!(
            parse_avd_name("Pixel_7_API_34\r\nOK\n"),
            Some("Pixel_7_API_34".to_string())
        );
        assert_eq!(parse_avd_name("OK\n"), None);
        assert_eq!(parse_avd_name(""), None);
    }

    #[test]
    fn downgrade_and_incompatible_failures_trigger_uninstall() {
        assert!(needs_uninstall("[INSTALL_FAILED_VERSION_DOWNGRADE]"));
        assert!(needs_uninstall(
            "Failure [INSTALL_FAILED_UPDATE_INCOMPATIBLE: signatures do not match]"
        ));
        assert!(!needs_uninstall("[INSTALL_FAILED_INSUFFICIENT_STORAGE]"));
    }

    #[tokio::test]
    async fn missing_adb_binary_is_reported() {
        let client = AdbClient::with_adb(PathBuf::from("/nonexistent/adb"));
        let err = client.devices().await.unwrap_err();
        assert!(matches!(err, AdbError::NotFound(_)));
    }
}
