//! Droidrun SDK - Android SDK discovery and artifact parsing
//!
//! Locates an installed Android SDK from the environment and reads the
//! artifacts the run pipeline consumes: installed package metadata and
//! APK manifests.

pub mod apk;
pub mod axml;
pub mod packages;
pub mod sdk;

pub use apk::{ApkError, ApkInfo};
pub use axml::{AxmlError, Manifest};
pub use packages::{discover_packages, PackageResolver, SdkPackage};
pub use sdk::{Env, ProcessEnv, Sdk, SdkError};

/// Current version of the SDK library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
