//! Device, virtual-device and run-input types
//!
//! The value types shared between the selector, the orchestrator and the
//! device bridge: connected devices as adb reports them, installed virtual
//! device definitions, port mappings and the application identity extracted
//! from an APK.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RunError;

/// The connection state of a device as reported by adb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    /// Device is connected and responsive.
    Online,
    /// Device is connected but not responding.
    Offline,
    /// Device is connected but has not authorized this host.
    Unauthorized,
    /// Device is in bootloader mode.
    Bootloader,
    /// Device is in recovery mode.
    Recovery,
    /// State string not recognized.
    Unknown,
}

impl DeviceState {
    /// String representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Online => "online",
            DeviceState::Offline => "offline",
            DeviceState::Unauthorized => "unauthorized",
            DeviceState::Bootloader => "bootloader",
            DeviceState::Recovery => "recovery",
            DeviceState::Unknown => "unknown",
        }
    }

    /// Whether the device can accept installs and shell commands.
    pub fn is_usable(&self) -> bool {
        matches!(self, DeviceState::Online)
    }
}

impl From<&str> for DeviceState {
    fn from(s: &str) -> Self {
        match s {
            "device" | "online" => DeviceState::Online,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            "bootloader" => DeviceState::Bootloader,
            "recovery" => DeviceState::Recovery,
            _ => DeviceState::Unknown,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a device is physical hardware or an emulator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// A physical device connected over USB or the network.
    Hardware,
    /// A running emulator instance.
    Virtual,
}

/// A connected Android device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// adb serial, e.g. `emulator-5554` or `R58M1234ABC`.
    pub serial: String,
    /// Connection state.
    pub state: DeviceState,
    /// Hardware or virtual.
    pub kind: DeviceKind,
    /// For virtual devices, the id of the AVD this instance was booted
    /// from, when it could be determined.
    pub avd_id: Option<String>,
    /// Device model, when reported.
    pub model: Option<String>,
    /// Device product name, when reported.
    pub product: Option<String>,
    /// adb transport id, when reported.
    pub transport_id: Option<String>,
}

impl Device {
    /// Whether this device can be deployed to right now.
    pub fn is_usable(&self) -> bool {
        self.state.is_usable()
    }

    /// Whether this device is an emulator instance.
    pub fn is_virtual(&self) -> bool {
        self.kind == DeviceKind::Virtual
    }

    /// Human-readable name for confirmation lines.
    pub fn display_name(&self) -> String {
        match &self.model {
            Some(model) => format!("{} ({})", self.serial, model),
            None => self.serial.clone(),
        }
    }
}

/// An installed Android Virtual Device definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvdInfo {
    /// AVD id, e.g. `Pixel_7_API_34`.
    pub id: String,
    /// Directory holding the AVD's images and config.
    pub path: PathBuf,
    /// Display name from the AVD config, when set.
    pub name: Option<String>,
    /// Target platform, e.g. `android-34`.
    pub target: Option<String>,
    /// ABI of the system image, e.g. `arm64-v8a`.
    pub abi: Option<String>,
}

impl AvdInfo {
    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// A device-port to host-port forwarding rule.
///
/// Both sides are kept as strings; adb accepts non-numeric specs and the
/// mapping is never interpreted locally. Equality is field-wise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    /// Port on the device side.
    pub device: String,
    /// Port on the host side.
    pub host: String,
}

impl FromStr for PortMapping {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let device = parts.next().unwrap_or("");
        let host = parts.next().unwrap_or("");
        if device.is_empty() || host.is_empty() || parts.next().is_some() {
            return Err(RunError::BadInput(format!(
                "invalid forward specification '{s}': expected <device port>:<host port>"
            )));
        }
        Ok(PortMapping {
            device: device.to_string(),
            host: host.to_string(),
        })
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.host)
    }
}

/// Application identity extracted from the APK, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    /// Application id (manifest `package`), e.g. `com.example.app`.
    pub app_id: String,
    /// Name of the activity to launch, absolute or relative to the
    /// application id (`.MainActivity`).
    pub activity: String,
}

impl ApplicationInfo {
    /// The `<appId>/<activity>` component string understood by `am start`.
    pub fn component(&self) -> String {
        format!("{}/{}", self.app_id, self.activity)
    }
}
