//! AVD catalogue
//!
//! Reads installed Android Virtual Device definitions out of the AVD home.

use std::path::{Path, PathBuf};

use configparser::ini::Ini;
use droidrun_core::AvdInfo;
use droidrun_sdk::Sdk;
use tracing::{debug, warn};

/// AVD errors
#[derive(Debug, thiserror::Error)]
pub enum AvdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Reads AVD definitions from disk.
pub struct AvdManager {
    avd_home: PathBuf,
}

impl AvdManager {
    /// Manager over the given SDK's AVD home.
    pub fn new(sdk: &Sdk) -> Self {
        Self::with_home(sdk.avd_home.clone())
    }

    /// Manager over an explicit AVD home directory.
    pub fn with_home(avd_home: PathBuf) -> Self {
        Self { avd_home }
    }

    /// Installed AVDs, sorted by id. Definitions that fail to parse are
    /// skipped with a warning.
    pub async fn list_avds(&self) -> Result<Vec<AvdInfo>, AvdError> {
        let mut avds = Vec::new();
        if !self.avd_home.is_dir() {
            debug!("AVD home {} does not exist", self.avd_home.display());
            return Ok(avds);
        }

        let mut entries = tokio::fs::read_dir(&self.avd_home).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "ini").unwrap_or(false) {
                let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match self.read_avd(id, &path).await {
                    Ok(avd) => avds.push(avd),
                    Err(err) => warn!("skipping AVD {id}: {err}"),
                }
            }
        }
        avds.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(avds)
    }

    async fn read_avd(&self, id: &str, ini_path: &Path) -> Result<AvdInfo, AvdError> {
        let ini = read_ini(ini_path).await?;
        let avd_path = match ini.get("default", "path") {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => self.avd_home.join(format!("{id}.avd")),
        };
        let target = ini.get("default", "target").filter(|t| !t.is_empty());

        let mut name = None;
        let mut abi = None;
        let config_path = avd_path.join("config.ini");
        if config_path.is_file() {
            let config = read_ini(&config_path).await?;
            name = config
                .get("default", "avd.ini.displayname")
                .filter(|n| !n.is_empty());
            abi = config.get("default", "abi.type").filter(|a| !a.is_empty());
        }
        // The conventional display name spells underscores as spaces.
        let name = name.unwrap_or_else(|| id.replace('_', " "));

        Ok(AvdInfo {
            id: id.to_string(),
            path: avd_path,
            name: Some(name),
            target,
            abi,
        })
    }
}

async fn read_ini(path: &Path) -> Result<Ini, AvdError> {
    let content = tokio::fs::read_to_string(path).await?;
    let mut ini = Ini::new();
    ini.read(content).map_err(|reason| AvdError::Parse {
        path: path.display().to_string(),
        reason,
    })?;
    Ok(ini)
}
