//! The adb-backed bridge
//!
//! Binds the run pipeline's device operations to the SDK tools.

use std::path::Path;

use async_trait::async_trait;
use droidrun_core::{AvdInfo, BridgeError, Device, DeviceBridge, PortMapping};
use droidrun_sdk::Sdk;

use crate::adb::AdbClient;
use crate::avd::AvdManager;
use crate::emulator::EmulatorLauncher;

/// The production [`DeviceBridge`]: adb for device commands, the emulator
/// binary for boots, the AVD home for definitions.
pub struct AdbDeviceBridge {
    adb: AdbClient,
    avds: AvdManager,
    emulator: EmulatorLauncher,
}

impl AdbDeviceBridge {
    /// Bridge over the given SDK install.
    pub fn new(sdk: &Sdk) -> Self {
        Self {
            adb: AdbClient::new(sdk),
            avds: AvdManager::new(sdk),
            emulator: EmulatorLauncher::new(sdk),
        }
    }
}

#[async_trait]
impl DeviceBridge for AdbDeviceBridge {
    async fn devices(&self) -> Result<Vec<Device>, BridgeError> {
        self.adb
            .devices()
            .await
            .map_err(|e| BridgeError::op("device listing", e))
    }

    async fn virtual_devices(&self) -> Result<Vec<AvdInfo>, BridgeError> {
        self.avds
            .list_avds()
            .await
            .map_err(|e| BridgeError::op("AVD listing", e))
    }

    async fn boot_virtual_device(&self, avd_id: &str) -> Result<Device, BridgeError> {
        self.emulator
            .boot(&self.adb, avd_id)
            .await
            .map_err(|e| BridgeError::op("emulator boot", e))
    }

    async fn wait_for_boot(&self, device: &Device) -> Result<(), BridgeError> {
        self.adb
            .wait_for_boot(&device.serial)
            .await
            .map_err(|e| BridgeError::op("boot wait", e))
    }

    async fn forward_ports(
        &self,
        device: &Device,
        mapping: &PortMapping,
    ) -> Result<(), BridgeError> {
        self.adb
            .reverse(&device.serial, mapping)
            .await
            .map_err(|e| BridgeError::op("port forward", e))
    }

    async fn unforward_ports(
        &self,
        device: &Device,
        mapping: &PortMapping,
    ) -> Result<(), BridgeError> {
        self.adb
            .unreverse(&device.serial, mapping)
            .await
            .map_err(|e| BridgeError::op("port unforward", e))
    }

    async fn install_package(
        &self,
        device: &Device,
        apk: &Path,
        app_id: &str,
    ) -> Result<(), BridgeError> {
        self.adb
            .install(&device.serial, apk, app_id)
            .await
            .map_err(|e| BridgeError::op("package install", e))
    }

    async fn start_activity(
        &self,
        device: &Device,
        app_id: &str,
        activity: &str,
    ) -> Result<(), BridgeError> {
        self.adb
            .start_activity(&device.serial, app_id, activity)
            .await
            .map_err(|e| BridgeError::op("activity launch", e))
    }

    async fn wait_for_close(&self, device: &Device, app_id: &str) -> Result<(), BridgeError> {
        self.adb
            .wait_for_close(&device.serial, app_id)
            .await
            .map_err(|e| BridgeError::op("close wait", e))
    }

    async fn force_stop(&self, device: &Device, app_id: &str) -> Result<(), BridgeError> {
        self.adb
            .force_stop(&device.serial, app_id)
            .await
            .map_err(|e| BridgeError::op("force stop", e))
    }
}
