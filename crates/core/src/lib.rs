//! droidrun core - device selection, run lifecycle and teardown
//!
//! This crate holds the decision logic of a deploy-and-run: picking the
//! device, driving the run phases over an abstract [`DeviceBridge`], and
//! releasing acquired resources on every exit path.

pub mod bridge;
pub mod device;
pub mod error;
pub mod run;
pub mod select;
pub mod teardown;

#[cfg(test)]
mod test_bridge;

pub use bridge::{BridgeError, DeviceBridge, DeviceInventory};
pub use device::{ApplicationInfo, AvdInfo, Device, DeviceKind, DeviceState, PortMapping};
pub use error::{ErrorKind, Result, RunError};
pub use run::{RunOptions, RunOrchestrator, RunOutcome, RunPhase};
pub use select::select_device;
pub use teardown::{TeardownHandle, TeardownRegistry};

/// droidrun version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
