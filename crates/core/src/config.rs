//! Configured packages and the settings snapshot they come from.

use crate::error::{PkgNavError, Result};
use crate::util::as_directory;
use pkgnav_api::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Settings namespace owned by this tool.
pub const SETTINGS_SECTION: &str = "packagenavigator";

/// One `packages[]` entry as written in the settings file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum PackageSetting {
    Object {
        #[serde(rename = "packageName")]
        package_name: String,
        #[serde(rename = "localPath")]
        local_path: String,
        #[serde(rename = "excludePaths", default)]
        exclude_paths: Vec<String>,
    },
    /// Older `["name", "path"]` form.
    Pair(String, String),
}

impl PackageSetting {
    pub fn new(name: impl Into<String>, local_path: impl Into<String>) -> Self {
        PackageSetting::Object {
            package_name: name.into(),
            local_path: local_path.into(),
            exclude_paths: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawSettings {
    #[serde(default)]
    pub packages: Vec<PackageSetting>,
    #[serde(default)]
    pub fallback_to_navigate: bool,
}

/// A package the user linked locally. Identity is `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredPackage {
    pub name: String,
    /// Root in directory form, always ending in `/`.
    pub root: Url,
    /// Root as configured, for messages.
    pub local_path: String,
    pub exclude_paths: BTreeSet<String>,
}

impl ConfiguredPackage {
    pub fn new(name: impl Into<String>, local_path: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            root: parse_local_path(local_path)?,
            local_path: local_path.to_string(),
            exclude_paths: BTreeSet::new(),
        })
    }

    pub fn with_excludes<I, S>(mut self, excludes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_paths = excludes.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_setting(setting: &PackageSetting) -> Result<Self> {
        match setting {
            PackageSetting::Object {
                package_name,
                local_path,
                exclude_paths,
            } => Ok(Self::new(package_name.clone(), local_path)?
                .with_excludes(exclude_paths.iter().cloned())),
            PackageSetting::Pair(name, local_path) => Self::new(name.clone(), local_path),
        }
    }
}

/// Accepts `file:` URIs and absolute paths.
fn parse_local_path(local_path: &str) -> Result<Url> {
    if let Ok(uri) = Url::parse(local_path) {
        // A bare Windows drive letter parses as a one-letter scheme.
        if uri.scheme().len() > 1 {
            return Ok(as_directory(&uri));
        }
    }
    let path = Path::new(local_path);
    Url::from_directory_path(path).map_err(|_| PkgNavError::InvalidPath(PathBuf::from(local_path)))
}

/// Validated settings snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub packages: Vec<ConfiguredPackage>,
    pub fallback_to_navigate: bool,
}

impl Settings {
    pub fn new(packages: Vec<ConfiguredPackage>, fallback_to_navigate: bool) -> Self {
        Self {
            packages,
            fallback_to_navigate,
        }
    }

    /// Builds a snapshot, dropping (and logging) entries with unusable paths.
    /// Later duplicates of a package name are ignored.
    pub fn from_raw(raw: &RawSettings) -> Self {
        let mut packages: Vec<ConfiguredPackage> = Vec::with_capacity(raw.packages.len());
        for setting in &raw.packages {
            match ConfiguredPackage::from_setting(setting) {
                Ok(package) if packages.iter().any(|p| p.name == package.name) => {
                    warn!("Package {} is configured more than once", package.name);
                }
                Ok(package) => packages.push(package),
                Err(e) => warn!("Ignoring package setting {:?}: {}", setting, e),
            }
        }
        Self {
            packages,
            fallback_to_navigate: raw.fallback_to_navigate,
        }
    }

    /// Parses either the section object itself or a settings object that
    /// contains it under [`SETTINGS_SECTION`].
    pub fn from_value(value: &Value) -> Result<Self> {
        let section = value.get(SETTINGS_SECTION).unwrap_or(value);
        let raw: RawSettings = serde_json::from_value(section.clone())
            .map_err(|e| PkgNavError::Config(e.to_string()))?;
        Ok(Self::from_raw(&raw))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub fn package(&self, name: &str) -> Option<&ConfiguredPackage> {
        self.packages.iter().find(|p| p.name == name)
    }
}

/// Holds the current settings snapshot. Readers get an `Arc` and never see a
/// partially updated list.
#[derive(Debug, Default)]
pub struct ConfigStore {
    current: RwLock<Arc<Settings>>,
}

impl ConfigStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    pub fn snapshot(&self) -> Arc<Settings> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Swap in a new snapshot, returning the previous one.
    pub fn replace(&self, settings: Settings) -> Arc<Settings> {
        let next = Arc::new(settings);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }
}
