//! Android SDK environment resolution
//!
//! Finds the SDK root and the emulator/AVD home directories the way the
//! Android tools themselves do: environment variables first, then the
//! platform's conventional install location. All lookups go through an
//! [`Env`] reader so resolution is testable.

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use droidrun_core::{ErrorKind, RunError};

/// Errors from SDK environment resolution and package reads.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("no Android SDK found; set ANDROID_HOME or install to the default location")]
    SdkRootNotFound,

    #[error("emulator home not found; set ANDROID_EMULATOR_HOME or create ~/.android")]
    EmulatorHomeNotFound,

    #[error("AVD home not found; set ANDROID_AVD_HOME or create ~/.android/avd")]
    AvdHomeNotFound,

    #[error("SDK package not found at {}", .0.display())]
    PackageNotFound(PathBuf),

    #[error("invalid SDK package at {}: {reason}", .path.display())]
    InvalidPackage {
        /// Location of the offending `package.xml`.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdkError {
    /// The run-level failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SdkError::EmulatorHomeNotFound | SdkError::AvdHomeNotFound => {
                ErrorKind::EnvironmentNotFound
            }
            _ => ErrorKind::SdkNotFound,
        }
    }
}

impl From<SdkError> for RunError {
    fn from(err: SdkError) -> Self {
        RunError::Environment {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Environment reader, swappable in tests.
pub trait Env {
    /// A non-empty environment variable, if set.
    fn var(&self, name: &str) -> Option<String>;

    /// The user's home directory.
    fn home_dir(&self) -> Option<PathBuf>;
}

/// Reads the real process environment.
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }
}

/// Resolved SDK paths for one run.
#[derive(Debug, Clone)]
pub struct Sdk {
    /// SDK installation root.
    pub root: PathBuf,
    /// Emulator configuration home, usually `~/.android`.
    pub emulator_home: PathBuf,
    /// Directory holding installed AVDs.
    pub avd_home: PathBuf,
}

impl Sdk {
    /// Resolve from the process environment.
    pub fn resolve() -> Result<Self, SdkError> {
        Self::resolve_in(&ProcessEnv)
    }

    /// Resolve using the given environment reader.
    pub fn resolve_in(env: &dyn Env) -> Result<Self, SdkError> {
        let root = resolve_sdk_root(env)?;
        let emulator_home = resolve_emulator_home(env)?;
        let avd_home = resolve_avd_home(env)?;
        debug!("SDK root: {}", root.display());
        debug!("emulator home: {}", emulator_home.display());
        debug!("AVD home: {}", avd_home.display());
        Ok(Sdk {
            root,
            emulator_home,
            avd_home,
        })
    }

    /// Path to the adb binary inside this SDK.
    pub fn adb_path(&self) -> PathBuf {
        let name = if cfg!(windows) { "adb.exe" } else { "adb" };
        self.root.join("platform-tools").join(name)
    }

    /// Path to the emulator binary inside this SDK.
    pub fn emulator_path(&self) -> PathBuf {
        let name = if cfg!(windows) { "emulator.exe" } else { "emulator" };
        self.root.join("emulator").join(name)
    }

    /// Environment supplements for SDK subprocesses; the emulator resolves
    /// AVDs through these.
    pub fn command_env(&self) -> Vec<(&'static str, PathBuf)> {
        vec![
            ("ANDROID_SDK_ROOT", self.root.clone()),
            ("ANDROID_EMULATOR_HOME", self.emulator_home.clone()),
            ("ANDROID_AVD_HOME", self.avd_home.clone()),
        ]
    }
}

/// `$ANDROID_HOME`, then `$ANDROID_SDK_ROOT`, then the platform default.
/// A candidate wins only when it is set and points at a directory; a stale
/// variable falls through to the next candidate.
fn resolve_sdk_root(env: &dyn Env) -> Result<PathBuf, SdkError> {
    [env.var("ANDROID_HOME"), env.var("ANDROID_SDK_ROOT")]
        .into_iter()
        .flatten()
        .map(PathBuf::from)
        .chain(default_sdk_root(env))
        .find(|p| p.is_dir())
        .ok_or(SdkError::SdkRootNotFound)
}

fn default_sdk_root(env: &dyn Env) -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        return env
            .var("LOCALAPPDATA")
            .map(|p| PathBuf::from(p).join("Android").join("sdk"));
    }
    let home = env.home_dir()?;
    if cfg!(target_os = "macos") {
        Some(home.join("Library").join("Android").join("sdk"))
    } else {
        Some(home.join("Android").join("sdk"))
    }
}

fn resolve_emulator_home(env: &dyn Env) -> Result<PathBuf, SdkError> {
    let mut candidates = Vec::new();
    if let Some(p) = env.var("ANDROID_EMULATOR_HOME") {
        candidates.push(PathBuf::from(p));
    }
    if let Some(home) = env.home_dir() {
        candidates.push(home.join(".android"));
    }
    candidates
        .into_iter()
        .find(|p| p.is_dir())
        .ok_or(SdkError::EmulatorHomeNotFound)
}

fn resolve_avd_home(env: &dyn Env) -> Result<PathBuf, SdkError> {
    let mut candidates = Vec::new();
    if let Some(p) = env.var("ANDROID_AVD_HOME") {
        candidates.push(PathBuf::from(p));
    }
    if let Some(home) = env.home_dir() {
        candidates.push(home.join(".android").join("avd"));
    }
    candidates
        .into_iter()
        .find(|p| p.is_dir())
        .ok_or(SdkError::AvdHomeNotFound)
}
