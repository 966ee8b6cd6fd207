//! Local package versions and consumer manifest checks.

use crate::error::{PkgNavError, Result};
use crate::util::child_uri;
use crate::walk::PackageWalker;
use dashmap::DashMap;
use pkgnav_api::{DocumentService, FileSystem, FileType, Url};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const MANIFEST_FILE: &str = "package.json";

/// The parts of `package.json` this tool reads.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub types: Option<String>,
    #[serde(default)]
    pub typings: Option<String>,
}

impl Manifest {
    pub fn parse(uri: &Url, text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| PkgNavError::ManifestParse {
            path: uri.to_string(),
            source,
        })
    }

    pub fn dependency(&self, package: &str) -> Option<&str> {
        self.dependencies.as_ref()?.get(package).map(String::as_str)
    }

    /// Declared type entry point, if any.
    pub fn types_entry(&self) -> Option<&str> {
        self.types.as_deref().or(self.typings.as_deref())
    }
}

/// Advisory raised when the consumer pins a different version than the one
/// checked out locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMismatch {
    pub package: String,
    pub declared: String,
    pub local: String,
}

impl fmt::Display for VersionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Imported package version ({}) differs from local version ({}).",
            self.declared, self.local
        )
    }
}

/// Finds local package versions by scanning manifests. Nothing is cached
/// between lookups; the record only remembers the latest answer per package.
pub struct VersionTracker {
    fs: Arc<dyn FileSystem>,
    documents: Arc<dyn DocumentService>,
    record: DashMap<String, String>,
}

impl VersionTracker {
    pub fn new(fs: Arc<dyn FileSystem>, documents: Arc<dyn DocumentService>) -> Self {
        Self {
            fs,
            documents,
            record: DashMap::new(),
        }
    }

    /// Version of the first manifest below `root` (pre-order) whose `name`
    /// is `package`. A malformed manifest aborts the lookup.
    pub async fn find_local_version(&self, root: &Url, package: &str) -> Result<Option<String>> {
        let mut walker = PackageWalker::new(self.fs.clone(), root.clone());
        while let Some(file) = walker.next_file().await {
            if file.name != MANIFEST_FILE {
                continue;
            }
            let text = self.documents.open(&file.uri).await?;
            let manifest = Manifest::parse(&file.uri, &text)?;
            if manifest.name.as_deref() == Some(package) {
                debug!("Found manifest for {} at {}", package, file.uri);
                let version = manifest.version;
                match &version {
                    Some(v) => {
                        self.record.insert(package.to_string(), v.clone());
                    }
                    None => {
                        self.record.remove(package);
                    }
                }
                return Ok(version);
            }
        }
        self.record.remove(package);
        Ok(None)
    }

    /// Last version found for `package`.
    pub fn recorded_version(&self, package: &str) -> Option<String> {
        self.record.get(package).map(|v| v.clone())
    }

    /// Compare the consumer's declared dependency with the local version.
    /// Reads only the manifest at the top of `workspace_folder`.
    pub async fn check_consumer(
        &self,
        workspace_folder: &Url,
        package: &str,
        local_version: &str,
    ) -> Result<Option<VersionMismatch>> {
        let manifest_uri = child_uri(&crate::util::as_directory(workspace_folder), MANIFEST_FILE, false);
        if !matches!(self.fs.stat(&manifest_uri).await, Ok(FileType::File)) {
            debug!("No consumer manifest at {}", manifest_uri);
            return Ok(None);
        }
        let text = self.documents.open(&manifest_uri).await?;
        let manifest = Manifest::parse(&manifest_uri, &text)?;
        Ok(manifest
            .dependency(package)
            .filter(|declared| !declared.ends_with(local_version))
            .map(|declared| VersionMismatch {
                package: package.to_string(),
                declared: declared.to_string(),
                local: local_version.to_string(),
            }))
    }
}
