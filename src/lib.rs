//! droidrun - deploy and run Android apps on devices and emulators
//!
//! A command-line tool that installs an APK on a connected device or a
//! freshly booted emulator and starts its launch activity, without an
//! IDE in the loop.
//!
//! ## Features
//!
//! - **Device selection**: explicit serial or AVD id targeting, with a
//!   deterministic hardware-first default
//! - **Emulator boot**: picks a free console port, spawns the emulator
//!   and waits until the new device is connectable
//! - **Deploy and launch**: install with downgrade recovery, acknowledged
//!   activity start, optional port forwarding
//! - **Interactive mode**: `--connect` waits for the app to close, then
//!   force-stops it and releases forwarded ports
//! - **Inspection**: `--list` and `--sdk-info`, human-readable or JSON
//!
//! ## Architecture
//!
//! droidrun is organized into specialized crates:
//!
//! - `droidrun-core`: device model, selection, run lifecycle and teardown
//! - `droidrun-sdk`: SDK resolution, package metadata and APK reading
//! - `droidrun-device-bridge`: adb, AVD and emulator backend

#![doc(html_root_url = "https://docs.droidrun.dev/")]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod commands;

// Re-export main components for library usage
pub use droidrun_core as core;
pub use droidrun_device_bridge as device_bridge;
pub use droidrun_sdk as sdk;

/// Prelude module for convenient imports
pub mod prelude {
    pub use droidrun_core::{
        ApplicationInfo, Device, DeviceBridge, DeviceInventory, ErrorKind, RunError, RunOptions,
        RunOrchestrator, RunOutcome,
    };
    pub use droidrun_device_bridge::{AdbClient, AdbDeviceBridge, AvdManager, EmulatorLauncher};
    pub use droidrun_sdk::{ApkInfo, Sdk};
}
