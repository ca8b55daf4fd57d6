//! APK inspection
//!
//! Pulls `AndroidManifest.xml` out of an APK archive and decodes it into
//! the identity the run pipeline needs.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use droidrun_core::{ApplicationInfo, ErrorKind, RunError};
use thiserror::Error;
use tracing::debug;

use crate::axml::{self, AxmlError};

/// Errors raised while inspecting an APK.
#[derive(Debug, Error)]
pub enum ApkError {
    /// The file does not exist.
    #[error("APK not found: {}", .0.display())]
    NotFound(PathBuf),
    /// The file could not be opened or is not a zip archive.
    #[error("cannot read APK {}: {reason}", .path.display())]
    NotAnArchive {
        /// Path handed in.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },
    /// The archive has no `AndroidManifest.xml` entry.
    #[error("APK {} has no AndroidManifest.xml", .0.display())]
    MissingManifest(PathBuf),
    /// The manifest could not be decoded.
    #[error("cannot decode AndroidManifest.xml: {0}")]
    Manifest(#[from] AxmlError),
    /// The manifest declares no package id.
    #[error("AndroidManifest.xml declares no package")]
    MissingPackage,
    /// No component with a MAIN/LAUNCHER intent filter.
    #[error("no launchable activity declared in AndroidManifest.xml")]
    NoLaunchActivity,
}

impl ApkError {
    /// Error kind tag for the CLI surface. A bad or unreadable APK is
    /// always an input problem.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::BadInput
    }
}

impl From<ApkError> for RunError {
    fn from(err: ApkError) -> Self {
        RunError::BadInput(err.to_string())
    }
}

/// Identity and launch details of an APK.
#[derive(Debug, Clone)]
pub struct ApkInfo {
    /// Path the APK was loaded from.
    pub path: PathBuf,
    /// Application id.
    pub app_id: String,
    /// Activity to launch, as declared.
    pub launch_activity: String,
    /// `android:versionCode` when declared.
    pub version_code: Option<u32>,
    /// `android:versionName` when declared.
    pub version_name: Option<String>,
}

impl ApkInfo {
    /// Reads and decodes `AndroidManifest.xml` from the archive at `path`.
    pub fn load(path: &Path) -> Result<Self, ApkError> {
        if !path.is_file() {
            return Err(ApkError::NotFound(path.to_path_buf()));
        }
        let not_an_archive = |reason: String| ApkError::NotAnArchive {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| not_an_archive(e.to_string()))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| not_an_archive(e.to_string()))?;
        let mut entry = match archive.by_name("AndroidManifest.xml") {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ApkError::MissingManifest(path.to_path_buf()));
            }
            Err(err) => return Err(not_an_archive(err.to_string())),
        };
        // The declared uncompressed size is archive data, not a trusted
        // allocation hint; let the read grow the buffer.
        let mut raw = Vec::new();
        entry
            .read_to_end(&mut raw)
            .map_err(|e| not_an_archive(e.to_string()))?;

        let manifest = axml::parse_manifest(&raw)?;
        debug!("decoded manifest for {}", path.display());
        let app_id = manifest.package.clone().ok_or(ApkError::MissingPackage)?;
        let launch_activity = manifest
            .launch_activity()
            .ok_or(ApkError::NoLaunchActivity)?
            .to_string();
        Ok(Self {
            path: path.to_path_buf(),
            app_id,
            launch_activity,
            version_code: manifest.version_code,
            version_name: manifest.version_name,
        })
    }

    /// The application identity the run pipeline consumes.
    pub fn application(&self) -> ApplicationInfo {
        ApplicationInfo {
            app_id: self.app_id.clone(),
            activity: self.launch_activity.clone(),
        }
    }
}
