//! Droidrun Device Bridge
//!
//! The adb, AVD and emulator backend. [`AdbDeviceBridge`] implements the
//! run pipeline's device operations by shelling out to the SDK tools.

pub mod adb;
pub mod avd;
pub mod bridge;
pub mod emulator;

pub use adb::{AdbClient, AdbError};
pub use avd::{AvdError, AvdManager};
pub use bridge::AdbDeviceBridge;
pub use emulator::{EmulatorError, EmulatorLauncher};

/// Emulator console ports come in even steps in this range.
pub const CONSOLE_PORT_RANGE: std::ops::RangeInclusive<u16> = 5554..=5584;

/// The serial adb assigns to an emulator on the given console port.
pub fn console_serial(port: u16) -> String {
    format!("emulator-{port}")
}

/// Current version of the device bridge library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
