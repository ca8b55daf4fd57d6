//! In-memory [`DeviceBridge`] fake shared by selector and orchestrator
//! tests. Records every operation so tests can assert call order.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::bridge::{BridgeError, DeviceBridge};
use crate::device::{AvdInfo, Device, DeviceKind, DeviceState, PortMapping};

pub(crate) fn hardware(serial: &str) -> Device {
    Device {
        serial: serial.to_string(),
        state: DeviceState::Online,
        kind: DeviceKind::Hardware,
        avd_id: None,
        model: None,
        product: None,
        transport_id: None,
    }
}

pub(crate) fn emulator(serial: &str, avd_id: &str) -> Device {
    Device {
        serial: serial.to_string(),
        state: DeviceState::Online,
        kind: DeviceKind::Virtual,
        avd_id: Some(avd_id.to_string()),
        model: None,
        product: None,
        transport_id: None,
    }
}

pub(crate) fn avd(id: &str) -> AvdInfo {
    AvdInfo {
        id: id.to_string(),
        path: PathBuf::from(format!("/tmp/avd/{id}.avd")),
        name: None,
        target: Some("android-34".to_string()),
        abi: None,
    }
}

#[derive(Default)]
pub(crate) struct FakeBridge {
    pub devices: Mutex<Vec<Device>>,
    pub avds: Vec<AvdInfo>,
    pub calls: Mutex<Vec<String>>,
    pub fail_forward: bool,
    pub fail_install: bool,
    pub fail_unforward: bool,
    /// When set, `wait_for_close` never returns (app stays open).
    pub block_close: bool,
    /// Notified when `wait_for_close` is entered.
    pub close_entered: Arc<Notify>,
}

impl FakeBridge {
    pub fn new(devices: Vec<Device>, avds: Vec<AvdInfo>) -> Self {
        FakeBridge {
            devices: Mutex::new(devices),
            avds,
            ..Default::default()
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls_snapshot(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceBridge for FakeBridge {
    async fn devices(&self) -> Result<Vec<Device>, BridgeError> {
        self.record("devices".to_string());
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn virtual_devices(&self) -> Result<Vec<AvdInfo>, BridgeError> {
        self.record("virtual_devices".to_string());
        Ok(self.avds.clone())
    }

    async fn boot_virtual_device(&self, avd_id: &str) -> Result<Device, BridgeError> {
        self.record(format!("boot {avd_id}"));
        let mut devices = self.devices.lock().unwrap();
        let port = 5554 + 2 * devices.iter().filter(|d| d.is_virtual()).count();
        let device = emulator(&format!("emulator-{port}"), avd_id);
        devices.push(device.clone());
        Ok(device)
    }

    async fn wait_for_boot(&self, device: &Device) -> Result<(), BridgeError> {
        self.record(format!("wait_for_boot {}", device.serial));
        Ok(())
    }

    async fn forward_ports(
        &self,
        device: &Device,
        mapping: &PortMapping,
    ) -> Result<(), BridgeError> {
        self.record(format!("forward {} {mapping}", device.serial));
        if self.fail_forward {
            return Err(BridgeError::op("forward ports", "adb reverse failed"));
        }
        Ok(())
    }

    async fn unforward_ports(
        &self,
        device: &Device,
        mapping: &PortMapping,
    ) -> Result<(), BridgeError> {
        self.record(format!("unforward {} {mapping}", device.serial));
        if self.fail_unforward {
            return Err(BridgeError::op("unforward ports", "listener not found"));
        }
        Ok(())
    }

    async fn install_package(
        &self,
        device: &Device,
        apk: &Path,
        app_id: &str,
    ) -> Result<(), BridgeError> {
        self.record(format!("install {} {app_id}", device.serial));
        let _ = apk;
        if self.fail_install {
            return Err(BridgeError::op("install package", "INSTALL_FAILED_TEST"));
        }
        Ok(())
    }

    async fn start_activity(
        &self,
        device: &Device,
        app_id: &str,
        activity: &str,
    ) -> Result<(), BridgeError> {
        self.record(format!("start {} {app_id}/{activity}", device.serial));
        Ok(())
    }

    async fn wait_for_close(&self, device: &Device, app_id: &str) -> Result<(), BridgeError> {
        self.record(format!("wait_for_close {} {app_id}", device.serial));
        self.close_entered.notify_one();
        if self.block_close {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn force_stop(&self, device: &Device, app_id: &str) -> Result<(), BridgeError> {
        self.record(format!("force_stop {} {app_id}", device.serial));
        Ok(())
    }
}
