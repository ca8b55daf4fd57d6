//! SDK package metadata
//!
//! Every installed SDK component keeps a `package.xml` describing itself.
//! [`PackageResolver`] parses these on demand and memoizes the result for
//! the process lifetime, keyed by the package directory; concurrent
//! resolution of the same location performs at most one parse.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::sdk::{Sdk, SdkError};

/// Directory names that never contain `package.xml`, pruned from the scan.
const EXCLUDED_DIRS: &[&str] = &[
    "bin",
    "bin64",
    "lib",
    "lib64",
    "include",
    "clang-include",
    "skins",
    "data",
    "examples",
    "resources",
    "systrace",
    "extras",
];

/// Metadata of one installed SDK package.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkPackage {
    /// Package path as the SDK names it, e.g. `platforms;android-34`.
    pub path: String,
    /// Directory the package lives in.
    pub location: PathBuf,
    /// Human-readable name.
    pub name: String,
    /// Revision, `major.minor.micro` with absent parts skipped.
    pub version: String,
    /// API level, for platform-like packages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_level: Option<String>,
}

/// Process-lifetime memoizing resolver for package metadata.
#[derive(Default)]
pub struct PackageResolver {
    cells: Mutex<HashMap<PathBuf, Arc<OnceCell<Arc<SdkPackage>>>>>,
}

impl PackageResolver {
    /// An empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Package metadata for the given package directory. The first call
    /// per location parses `package.xml`; later and concurrent calls for
    /// the same location share that parse.
    pub async fn resolve(&self, location: &Path) -> Result<Arc<SdkPackage>, SdkError> {
        let cell = {
            let mut cells = self.cells.lock();
            Arc::clone(cells.entry(location.to_path_buf()).or_default())
        };
        let package = cell
            .get_or_try_init(|| async { parse_package(location).await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(package))
    }
}

async fn parse_package(location: &Path) -> Result<SdkPackage, SdkError> {
    let manifest = location.join("package.xml");
    let xml = match tokio::fs::read_to_string(&manifest).await {
        Ok(xml) => xml,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(SdkError::PackageNotFound(location.to_path_buf()));
        }
        Err(err) => return Err(SdkError::Io(err)),
    };
    debug!("parsing {}", manifest.display());
    parse_package_xml(location, &xml)
}

fn parse_package_xml(location: &Path, xml: &str) -> Result<SdkPackage, SdkError> {
    let invalid = |reason: String| SdkError::InvalidPackage {
        path: location.to_path_buf(),
        reason,
    };
    let doc = roxmltree::Document::parse(xml).map_err(|e| invalid(e.to_string()))?;
    let local = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "localPackage")
        .ok_or_else(|| invalid("missing <localPackage>".to_string()))?;
    let path = local
        .attribute("path")
        .ok_or_else(|| invalid("missing path attribute".to_string()))?
        .to_string();

    let version = local
        .children()
        .find(|n| n.tag_name().name() == "revision")
        .map(|revision| {
            ["major", "minor", "micro"]
                .iter()
                .filter_map(|part| {
                    revision
                        .children()
                        .find(|c| c.tag_name().name() == *part)
                        .and_then(|c| c.text())
                })
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(".")
        })
        .unwrap_or_default();
    if version.is_empty() {
        return Err(invalid("missing <revision>".to_string()));
    }

    let name = local
        .children()
        .find(|n| n.tag_name().name() == "display-name")
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&path)
        .to_string();

    let api_level = local
        .descendants()
        .find(|n| n.tag_name().name() == "api-level")
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(SdkPackage {
        path,
        location: location.to_path_buf(),
        name,
        version,
        api_level,
    })
}

/// Every package under the SDK root, sorted by package path. Unreadable
/// or malformed packages are skipped with a warning.
pub async fn discover_packages(sdk: &Sdk, resolver: &PackageResolver) -> Vec<Arc<SdkPackage>> {
    let mut locations = Vec::new();
    for entry in WalkDir::new(&sdk.root)
        .into_iter()
        .filter_entry(|e| !is_excluded(&sdk.root, e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable SDK entry: {err}");
                continue;
            }
        };
        if entry.file_type().is_file() && entry.file_name() == "package.xml" {
            if let Some(parent) = entry.path().parent() {
                locations.push(parent.to_path_buf());
            }
        }
    }

    let mut packages = Vec::new();
    for location in locations {
        match resolver.resolve(&location).await {
            Ok(package) => packages.push(package),
            Err(err) => warn!("skipping package at {}: {err}", location.display()),
        }
    }
    packages.sort_by(|a, b| a.path.cmp(&b.path));
    packages
}

fn is_excluded(root: &Path, entry: &walkdir::DirEntry) -> bool {
    if in_sources_tree(root, entry.path()) {
        return true;
    }
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| EXCLUDED_DIRS.contains(&name))
}

// `sources/android-NN/package.xml` is a real package; anything nested two
// or more levels inside a sources tree is source code, not package
// metadata.
fn in_sources_tree(root: &Path, path: &Path) -> bool {
    let rel = match path.strip_prefix(root) {
        Ok(rel) => rel,
        Err(_) => return false,
    };
    let mut parts = rel.iter().filter_map(|c| c.to_str());
    match (parts.next(), parts.next()) {
        (Some("sources"), Some(dir)) => {
            dir.strip_prefix("android-")
                .map_or(false, |api| !api.is_empty() && api.bytes().all(|b| b.is_ascii_digit()))
                && parts.take(2).count() == 2
        }
        _ => false,
    }
}
