//! Cursor-to-declaration resolution.
//!
//! A request moves through `LocateTarget → MatchPackage → LocateSymbolName →
//! LookupDeclaration` and ends in one of the [`Outcome`]s. Every miss along
//! the way is a silent [`NoMatch`]; only a configured root that has gone
//! missing is reported to the user.

use crate::config::{ConfigStore, ConfiguredPackage, Settings};
use crate::error::Result;
use crate::extract::find_symbol_path;
use crate::index::PackageIndex;
use crate::util::{file_name, file_stem, is_under};
use crate::version::VersionTracker;
use pkgnav_api::{
    DeclarationEntry, DefinitionService, DefinitionTarget, FileSystem, Position, Presenter,
    SymbolLocation, SymbolService, Url,
};
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Why a request ended without navigating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMatch {
    /// The definition service returned nothing.
    NoTarget,
    /// No configured package owns any returned location.
    NoPackage,
    /// No symbol in the target file has the target's range.
    NoSymbol,
    /// The index has no entry for the symbol path.
    NoEntry,
}

impl fmt::Display for NoMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NoMatch::NoTarget => "no definition target",
            NoMatch::NoPackage => "target is not in a configured package",
            NoMatch::NoSymbol => "no symbol at target range",
            NoMatch::NoEntry => "symbol is not indexed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Declaration(s) found in a local package.
    Navigate {
        package: String,
        symbol_path: String,
        entry: DeclarationEntry,
    },
    /// Package-aware resolution failed and fallback navigation is enabled.
    Fallback(Vec<SymbolLocation>),
    /// The matched package's root does not exist on disk.
    MissingRoot { package: String, local_path: String },
    NoMatch(NoMatch),
}

/// Result of one navigation request.
#[derive(Debug)]
pub struct Resolution {
    pub outcome: Outcome,
    /// Background version comparison, when one was started. Navigation
    /// never waits for it.
    pub version_check: Option<JoinHandle<()>>,
}

impl Resolution {
    fn immediate(outcome: Outcome) -> Self {
        Self {
            outcome,
            version_check: None,
        }
    }
}

/// First package, in configuration order, that owns `target`: either the
/// target lies under the package root, or the package name appears as a
/// run of whole path segments (`node_modules/@scope/name/...`).
pub fn match_package<'a>(
    packages: &'a [ConfiguredPackage],
    target: &Url,
) -> Option<&'a ConfiguredPackage> {
    let segments: Vec<&str> = target
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    packages.iter().find(|package| {
        if is_under(&package.root, target) {
            return true;
        }
        let name: Vec<&str> = package.name.split('/').filter(|s| !s.is_empty()).collect();
        !name.is_empty() && segments.windows(name.len()).any(|window| window == name.as_slice())
    })
}

pub struct ResolutionEngine {
    config: Arc<ConfigStore>,
    index: Arc<PackageIndex>,
    symbols: Arc<dyn SymbolService>,
    definitions: Arc<dyn DefinitionService>,
    fs: Arc<dyn FileSystem>,
    versions: Arc<VersionTracker>,
    presenter: Arc<dyn Presenter>,
    workspace_folders: RwLock<Vec<Url>>,
}

impl ResolutionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<ConfigStore>,
        index: Arc<PackageIndex>,
        symbols: Arc<dyn SymbolService>,
        definitions: Arc<dyn DefinitionService>,
        fs: Arc<dyn FileSystem>,
        versions: Arc<VersionTracker>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            config,
            index,
            symbols,
            definitions,
            fs,
            versions,
            presenter,
            workspace_folders: RwLock::new(Vec::new()),
        }
    }

    pub fn set_workspace_folders(&self, folders: Vec<Url>) {
        match self.workspace_folders.write() {
            Ok(mut guard) => *guard = folders,
            Err(poisoned) => *poisoned.into_inner() = folders,
        }
    }

    fn first_workspace_folder(&self) -> Option<Url> {
        match self.workspace_folders.read() {
            Ok(guard) => guard.first().cloned(),
            Err(poisoned) => poisoned.into_inner().first().cloned(),
        }
    }

    pub async fn resolve(&self, uri: &Url, position: Position) -> Result<Resolution> {
        let settings = self.config.snapshot();

        // LocateTarget
        let targets = match self.definitions.implementations(uri, position).await {
            Ok(Some(targets)) if !targets.is_empty() => targets,
            Ok(_) => return self.fallback(&settings, uri, position, NoMatch::NoTarget).await,
            Err(e) => {
                debug!("Implementation lookup failed at {} {}: {}", uri, position, e);
                return self.fallback(&settings, uri, position, NoMatch::NoTarget).await;
            }
        };

        // MatchPackage
        let Some((target, package)) = targets.iter().find_map(|target| {
            match_package(&settings.packages, &target.target_uri).map(|package| (target, package))
        }) else {
            return self.fallback(&settings, uri, position, NoMatch::NoPackage).await;
        };
        debug!("Target {} belongs to {}", target.target_uri, package.name);

        if !self.fs.exists(&package.root).await {
            info!(
                "Root of {} does not exist: {}",
                package.name, package.local_path
            );
            return Ok(Resolution::immediate(Outcome::MissingRoot {
                package: package.name.clone(),
                local_path: package.local_path.clone(),
            }));
        }

        // LocateSymbolName
        let Some(symbol_path) = self.locate_symbol_path(target).await else {
            return Ok(Resolution::immediate(Outcome::NoMatch(NoMatch::NoSymbol)));
        };

        // LookupDeclaration
        let stem = file_name(&target.target_uri)
            .map(|name| file_stem(&name).to_string())
            .unwrap_or_default();
        let Some(entry) = self.index.lookup(&package.name, &stem, &symbol_path) else {
            debug!("No entry for {}:{}/{}", package.name, stem, symbol_path);
            return Ok(Resolution::immediate(Outcome::NoMatch(NoMatch::NoEntry)));
        };

        let version_check = self.spawn_version_check(package);
        Ok(Resolution {
            outcome: Outcome::Navigate {
                package: package.name.clone(),
                symbol_path,
                entry,
            },
            version_check,
        })
    }

    async fn locate_symbol_path(&self, target: &DefinitionTarget) -> Option<String> {
        match self.symbols.document_symbols(&target.target_uri).await {
            Ok(outline) => find_symbol_path(&outline, &target.target_range),
            Err(e) => {
                debug!("No outline for {}: {}", target.target_uri, e);
                None
            }
        }
    }

    async fn fallback(
        &self,
        settings: &Settings,
        uri: &Url,
        position: Position,
        reason: NoMatch,
    ) -> Result<Resolution> {
        if !settings.fallback_to_navigate {
            return Ok(Resolution::immediate(Outcome::NoMatch(reason)));
        }
        match self.definitions.definitions(uri, position).await {
            Ok(Some(targets)) if !targets.is_empty() => Ok(Resolution::immediate(
                Outcome::Fallback(targets.iter().map(DefinitionTarget::to_location).collect()),
            )),
            Ok(_) => Ok(Resolution::immediate(Outcome::NoMatch(reason))),
            Err(e) => {
                debug!("Fallback definition lookup failed: {}", e);
                Ok(Resolution::immediate(Outcome::NoMatch(reason)))
            }
        }
    }

    /// Refresh the local version record in the background, then compare it
    /// with the consumer's manifest when a workspace folder is known.
    fn spawn_version_check(&self, package: &ConfiguredPackage) -> Option<JoinHandle<()>> {
        let folder = self.first_workspace_folder();
        let versions = self.versions.clone();
        let presenter = self.presenter.clone();
        let name = package.name.clone();
        let root = package.root.clone();

        Some(tokio::spawn(async move {
            let local = match versions.find_local_version(&root, &name).await {
                Ok(Some(version)) => version,
                Ok(None) => {
                    debug!("No manifest declares {} under {}", name, root);
                    return;
                }
                Err(e) => {
                    warn!("Version lookup for {} failed: {}", name, e);
                    return;
                }
            };
            let Some(folder) = folder else {
                debug!("No workspace folder to compare {} {} against", name, local);
                return;
            };
            match versions.check_consumer(&folder, &name, &local).await {
                Ok(Some(mismatch)) => {
                    if let Err(e) = presenter.show_warning(&mismatch.to_string()).await {
                        warn!("Failed to show version warning: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Consumer manifest check for {} failed: {}", name, e),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packages() -> Vec<ConfiguredPackage> {
        vec![
            ConfiguredPackage::new("core", "/work/core").unwrap(),
            ConfiguredPackage::new("@acme/ui", "/work/ui").unwrap(),
        ]
    }

    #[test]
    fn test_match_by_name_segment() {
        let packages = packages();
        let target = Url::parse("file:///app/node_modules/core/dist/index.d.ts").unwrap();
        assert_eq!(match_package(&packages, &target).unwrap().name, "core");
    }

    #[test]
    fn test_scoped_name_matches_consecutive_segments() {
        let packages = packages();
        let target = Url::parse("file:///app/node_modules/@acme/ui/dist/Button.d.ts").unwrap();
        assert_eq!(match_package(&packages, &target).unwrap().name, "@acme/ui");
    }

    #[test]
    fn test_partial_segment_does_not_match() {
        let packages = packages();
        let target = Url::parse("file:///app/node_modules/hardcore-utils/index.d.ts").unwrap();
        assert!(match_package(&packages, &target).is_none());
    }

    #[test]
    fn test_match_by_root() {
        let packages = packages();
        let target = Url::parse("file:///work/ui/src/Button.ts").unwrap();
        assert_eq!(match_package(&packages, &target).unwrap().name, "@acme/ui");
    }
}
