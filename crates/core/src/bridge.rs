//! The device bridge capability seam
//!
//! [`DeviceBridge`] is the command-level interface the selector and
//! orchestrator drive; the production implementation shells out to the SDK
//! binaries (`adb`, `emulator`) while tests substitute in-memory fakes.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::device::{AvdInfo, Device, PortMapping};

/// Failure of one bridge operation.
///
/// The operation label gives the phase context; the message carries the
/// backend detail (serials, paths, process output).
#[derive(Error, Debug)]
#[error("{op} failed: {message}")]
pub struct BridgeError {
    /// Which operation failed, e.g. `install package`.
    pub op: &'static str,
    /// Backend detail.
    pub message: String,
}

impl BridgeError {
    /// Wrap a backend failure under an operation label.
    pub fn op(op: &'static str, err: impl std::fmt::Display) -> Self {
        BridgeError {
            op,
            message: err.to_string(),
        }
    }
}

/// Command-level operations against devices and emulators.
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Currently connected devices. Virtual entries are enriched with the
    /// id of the AVD they were booted from where determinable.
    async fn devices(&self) -> Result<Vec<Device>, BridgeError>;

    /// Installed virtual device definitions.
    async fn virtual_devices(&self) -> Result<Vec<AvdInfo>, BridgeError>;

    /// Boot an emulator for the given AVD and wait until it is
    /// connectable. The new device is returned; the emulator process
    /// outlives the caller.
    async fn boot_virtual_device(&self, avd_id: &str) -> Result<Device, BridgeError>;

    /// Block until the device reports boot complete.
    async fn wait_for_boot(&self, device: &Device) -> Result<(), BridgeError>;

    /// Establish a device-port to host-port forward.
    async fn forward_ports(&self, device: &Device, mapping: &PortMapping)
        -> Result<(), BridgeError>;

    /// Remove a previously established forward.
    async fn unforward_ports(
        &self,
        device: &Device,
        mapping: &PortMapping,
    ) -> Result<(), BridgeError>;

    /// Install the package, replacing an existing install of the same
    /// application id.
    async fn install_package(
        &self,
        device: &Device,
        apk: &Path,
        app_id: &str,
    ) -> Result<(), BridgeError>;

    /// Start the given activity and wait for the start to be acknowledged.
    async fn start_activity(
        &self,
        device: &Device,
        app_id: &str,
        activity: &str,
    ) -> Result<(), BridgeError>;

    /// Block until the application process has exited.
    async fn wait_for_close(&self, device: &Device, app_id: &str) -> Result<(), BridgeError>;

    /// Force-stop the application.
    async fn force_stop(&self, device: &Device, app_id: &str) -> Result<(), BridgeError>;
}

/// A point-in-time snapshot of what could be deployed to.
#[derive(Debug, Clone, Default)]
pub struct DeviceInventory {
    /// Connected devices.
    pub devices: Vec<Device>,
    /// Installed virtual device definitions.
    pub avds: Vec<AvdInfo>,
}

impl DeviceInventory {
    /// Take a snapshot through the bridge.
    pub async fn snapshot<B>(bridge: &B) -> Result<Self, BridgeError>
    where
        B: DeviceBridge + ?Sized,
    {
        let devices = bridge.devices().await?;
        let avds = bridge.virtual_devices().await?;
        Ok(DeviceInventory { devices, avds })
    }
}
