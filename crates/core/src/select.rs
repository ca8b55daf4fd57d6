//! Device selection
//!
//! Maps an inventory snapshot plus the user's target/preference flags onto
//! exactly one device. Pure decision logic except for one side effect:
//! booting a virtual device when the algorithm calls for one. For a fixed
//! snapshot the outcome is deterministic; ties are broken by serial (running
//! devices) or id (virtual device definitions), never by inventory order.

use tracing::debug;

use crate::bridge::{DeviceBridge, DeviceInventory};
use crate::device::{Device, DeviceKind};
use crate::error::{Result, RunError};

/// Select the device to deploy to.
///
/// Order of precedence:
/// 1. an explicit target, matched against serials first and AVD ids second
///    (booting the AVD when no instance of it is running);
/// 2. the lowest-serial hardware device, unless `prefer_virtual`;
/// 3. the lowest-serial running virtual device, else the lowest-id
///    installed AVD, booted.
///
/// Device state never disqualifies a pick.
pub async fn select_device<B>(
    bridge: &B,
    inventory: &DeviceInventory,
    target: Option<&str>,
    prefer_virtual: bool,
) -> Result<Device>
where
    B: DeviceBridge + ?Sized,
{
    if let Some(target) = target {
        return select_by_target(bridge, inventory, target).await;
    }
    if !prefer_virtual {
        if let Some(device) = pick_hardware(&inventory.devices) {
            debug!("selected hardware device {}", device.serial);
            return Ok(device.clone());
        }
    }
    select_virtual(bridge, inventory).await
}

async fn select_by_target<B>(
    bridge: &B,
    inventory: &DeviceInventory,
    target: &str,
) -> Result<Device>
where
    B: DeviceBridge + ?Sized,
{
    // A serial match wins regardless of kind or state: the user named a
    // concrete device.
    if let Some(device) = inventory.devices.iter().find(|d| d.serial == target) {
        debug!("target {target} matched connected device");
        return Ok(device.clone());
    }
    if inventory.avds.iter().any(|a| a.id == target) {
        if let Some(running) = inventory
            .devices
            .iter()
            .find(|d| d.avd_id.as_deref() == Some(target))
        {
            debug!("target {target} already running as {}", running.serial);
            return Ok(running.clone());
        }
        debug!("target {target} matched an installed AVD, booting it");
        return Ok(bridge.boot_virtual_device(target).await?);
    }
    Err(RunError::TargetNotFound(target.to_string()))
}

async fn select_virtual<B>(bridge: &B, inventory: &DeviceInventory) -> Result<Device>
where
    B: DeviceBridge + ?Sized,
{
    if let Some(device) = pick_running_virtual(&inventory.devices) {
        debug!("selected running virtual device {}", device.serial);
        return Ok(device.clone());
    }
    let avd = inventory
        .avds
        .iter()
        .min_by(|a, b| a.id.cmp(&b.id))
        .ok_or(RunError::NoDeviceAvailable)?;
    debug!("no virtual device running, booting {}", avd.id);
    Ok(bridge.boot_virtual_device(&avd.id).await?)
}

// No state filter here: connected hardware always outranks the virtual
// fallback, and an unauthorized or offline pick fails on the first bridge
// call against it.
fn pick_hardware(devices: &[Device]) -> Option<&Device> {
    devices
        .iter()
        .filter(|d| d.kind == DeviceKind::Hardware)
        .min_by(|a, b| a.serial.cmp(&b.serial))
}

fn pick_running_virtual(devices: &[Device]) -> Option<&Device> {
    devices
        .iter()
        .filter(|d| d.is_virtual())
        .min_by(|a, b| a.serial.cmp(&b.serial))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceState;
    use crate::error::ErrorKind;
    use crate::test_bridge::{avd, emulator, hardware, FakeBridge};

    fn inventory(devices: Vec<Device>, avds: Vec<crate::device::AvdInfo>) -> DeviceInventory {
        DeviceInventory { devices, avds }
    }

    #[tokio::test]
    async fn target_serial_wins_regardless_of_state() {
        let mut offline = hardware("R58M1234ABC");
        offline.state = DeviceState::Offline;
        let bridge = FakeBridge::new(vec![offline.clone()], vec![]);
        let inv = inventory(vec![offline], vec![]);

        let selected = select_device(&bridge, &inv, Some("R58M1234ABC"), false)
            .await
            .unwrap();
        assert_eq!(selected.serial, "R58M1234ABC");
        assert!(bridge.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn target_avd_boots_when_not_running() {
        let bridge = FakeBridge::new(vec![], vec![avd("Pixel_7_API_34")]);
        let inv = inventory(vec![], vec![avd("Pixel_7_API_34")]);

        let selected = select_device(&bridge, &inv, Some("Pixel_7_API_34"), false)
            .await
            .unwrap();
        assert_eq!(selected.kind, DeviceKind::Virtual);
        assert_eq!(
            *bridge.calls.lock().unwrap(),
            vec!["boot Pixel_7_API_34".to_string()]
        );
    }

    #[tokio::test]
    async fn target_avd_reuses_running_instance() {
        let running = emulator("emulator-5556", "Pixel_7_API_34");
        let bridge = FakeBridge::new(vec![running.clone()], vec![avd("Pixel_7_API_34")]);
        let inv = inventory(vec![running], vec![avd("Pixel_7_API_34")]);

        let selected = select_device(&bridge, &inv, Some("Pixel_7_API_34"), false)
            .await
            .unwrap();
        assert_eq!(selected.serial, "emulator-5556");
        assert!(bridge.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_target_fails_with_target_not_found() {
        let bridge = FakeBridge::new(vec![hardware("abc")], vec![avd("Pixel_7_API_34")]);
        let inv = inventory(vec![hardware("abc")], vec![avd("Pixel_7_API_34")]);

        let err = select_device(&bridge, &inv, Some("nope"), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TargetNotFound);
        assert_eq!(err.to_string(), "target not found: nope");
    }

    #[tokio::test]
    async fn hardware_is_preferred_over_running_emulator() {
        let devices = vec![emulator("emulator-5554", "Pixel_7_API_34"), hardware("abc")];
        let bridge = FakeBridge::new(devices.clone(), vec![]);
        let inv = inventory(devices, vec![]);

        let selected = select_device(&bridge, &inv, None, false).await.unwrap();
        assert_eq!(selected.serial, "abc");
    }

    #[tokio::test]
    async fn hardware_pick_is_deterministic_across_inventory_order() {
        let a = hardware("aaa");
        let b = hardware("bbb");
        let bridge = FakeBridge::new(vec![], vec![]);

        let forward = inventory(vec![a.clone(), b.clone()], vec![]);
        let reversed = inventory(vec![b, a], vec![]);
        let first = select_device(&bridge, &forward, None, false).await.unwrap();
        let second = select_device(&bridge, &reversed, None, false).await.unwrap();
        assert_eq!(first.serial, "aaa");
        assert_eq!(second.serial, "aaa");
    }

    #[tokio::test]
    async fn virtual_flag_skips_available_hardware() {
        let devices = vec![hardware("abc"), emulator("emulator-5554", "Pixel_7_API_34")];
        let bridge = FakeBridge::new(devices.clone(), vec![]);
        let inv = inventory(devices, vec![]);

        let selected = select_device(&bridge, &inv, None, true).await.unwrap();
        assert_eq!(selected.serial, "emulator-5554");
    }

    #[tokio::test]
    async fn zero_hardware_falls_back_to_virtual_without_flag() {
        let bridge = FakeBridge::new(vec![], vec![avd("beta"), avd("alpha")]);
        let inv = inventory(vec![], vec![avd("beta"), avd("alpha")]);

        let selected = select_device(&bridge, &inv, None, false).await.unwrap();
        assert_eq!(selected.kind, DeviceKind::Virtual);
        // Lowest id wins, not declaration order.
        assert_eq!(*bridge.calls.lock().unwrap(), vec!["boot alpha".to_string()]);
    }

    #[tokio::test]
    async fn unauthorized_hardware_still_outranks_virtual() {
        let mut unauthorized = hardware("abc");
        unauthorized.state = DeviceState::Unauthorized;
        let bridge = FakeBridge::new(vec![unauthorized.clone()], vec![avd("Pixel_7_API_34")]);
        let inv = inventory(vec![unauthorized], vec![avd("Pixel_7_API_34")]);

        let selected = select_device(&bridge, &inv, None, false).await.unwrap();
        assert_eq!(selected.kind, DeviceKind::Hardware);
        assert_eq!(selected.serial, "abc");
        // In particular, no AVD was booted behind the user's back.
        assert!(bridge.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn offline_emulator_is_still_the_running_virtual_pick() {
        let mut offline = emulator("emulator-5554", "Pixel_7_API_34");
        offline.state = DeviceState::Offline;
        let bridge = FakeBridge::new(vec![offline.clone()], vec![avd("Pixel_7_API_34")]);
        let inv = inventory(vec![offline], vec![avd("Pixel_7_API_34")]);

        let selected = select_device(&bridge, &inv, None, true).await.unwrap();
        assert_eq!(selected.serial, "emulator-5554");
        assert!(bridge.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_inventory_fails_with_no_device_available() {
        let bridge = FakeBridge::new(vec![], vec![]);
        let inv = inventory(vec![], vec![]);

        let err = select_device(&bridge, &inv, None, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoDeviceAvailable);
    }
}
