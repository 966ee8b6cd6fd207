//! Entry point tying configuration, indexing and resolution together.

use crate::config::{ConfigStore, Settings};
use crate::error::Result;
use crate::extract::{DeclarationExtractor, FileDeclarations};
use crate::index::{BuildReport, IndexBuilder, PackageIndex};
use crate::present::NavigationPresenter;
use crate::queue::RebuildQueue;
use crate::resolve::{Resolution, ResolutionEngine};
use crate::util::is_under;
use crate::version::VersionTracker;
use pkgnav_api::{
    DefinitionService, DocumentService, FileSystem, Position, Presenter, SymbolService, Url,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Everything the host provides.
#[derive(Clone)]
pub struct HostServices {
    pub symbols: Arc<dyn SymbolService>,
    pub definitions: Arc<dyn DefinitionService>,
    pub fs: Arc<dyn FileSystem>,
    pub documents: Arc<dyn DocumentService>,
    pub presenter: Arc<dyn Presenter>,
}

/// Owns the process-wide index and configuration. Rebuilds run as
/// background tasks; every scheduling method hands back the task handles so
/// callers can wait when they need to.
pub struct PackageNavigator {
    config: Arc<ConfigStore>,
    index: Arc<PackageIndex>,
    queue: RebuildQueue,
    engine: ResolutionEngine,
    versions: Arc<VersionTracker>,
    presenter: NavigationPresenter,
    fs: Arc<dyn FileSystem>,
}

impl PackageNavigator {
    pub fn new(services: HostServices, settings: Settings) -> Self {
        let config = Arc::new(ConfigStore::new(settings));
        let index = Arc::new(PackageIndex::new());
        let extractor = DeclarationExtractor::new(services.symbols.clone());
        let builder = IndexBuilder::new(index.clone(), extractor, services.fs.clone());
        let versions = Arc::new(VersionTracker::new(
            services.fs.clone(),
            services.documents.clone(),
        ));
        let engine = ResolutionEngine::new(
            config.clone(),
            index.clone(),
            services.symbols.clone(),
            services.definitions.clone(),
            services.fs.clone(),
            versions.clone(),
            services.presenter.clone(),
        );

        Self {
            config,
            index,
            queue: RebuildQueue::new(builder),
            engine,
            versions,
            presenter: NavigationPresenter::new(services.presenter),
            fs: services.fs,
        }
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.config.snapshot()
    }

    pub fn index(&self) -> &Arc<PackageIndex> {
        &self.index
    }

    pub fn versions(&self) -> &Arc<VersionTracker> {
        &self.versions
    }

    pub fn set_workspace_folders(&self, folders: Vec<Url>) {
        self.engine.set_workspace_folders(folders);
    }

    /// Schedule a full rebuild of every configured package whose root
    /// exists. Missing roots are skipped without error.
    pub async fn rebuild_all(&self) -> Vec<JoinHandle<Option<BuildReport>>> {
        let settings = self.config.snapshot();
        let mut handles = Vec::with_capacity(settings.packages.len());
        for package in &settings.packages {
            if !self.fs.exists(&package.root).await {
                debug!("Skipping {}: {} does not exist", package.name, package.local_path);
                continue;
            }
            handles.push(self.queue.schedule_full(package.clone()));
        }
        handles
    }

    /// Replace the settings snapshot and re-index from scratch.
    pub async fn apply_settings(&self, settings: Settings) -> Vec<JoinHandle<Option<BuildReport>>> {
        let previous = self.config.replace(settings);
        let current = self.config.snapshot();
        for old in &previous.packages {
            if current.package(&old.name).is_none() {
                info!("Package {} is no longer configured", old.name);
                self.queue.cancel(&old.name);
            }
        }
        let keep: Vec<&str> = current.packages.iter().map(|p| p.name.as_str()).collect();
        self.index.retain_packages(&keep);
        self.rebuild_all().await
    }

    /// Re-index a saved document in every package whose root contains it.
    pub async fn file_saved(&self, uri: &Url) -> Vec<JoinHandle<Option<FileDeclarations>>> {
        let settings = self.config.snapshot();
        let mut handles = Vec::new();
        for package in &settings.packages {
            if !is_under(&package.root, uri) {
                continue;
            }
            if !self.fs.exists(&package.root).await {
                continue;
            }
            handles.push(self.queue.schedule_file(package.clone(), uri.clone()));
        }
        handles
    }

    /// Forget a deleted document.
    pub fn file_deleted(&self, uri: &Url) {
        let settings = self.config.snapshot();
        for package in settings.packages.iter().filter(|p| is_under(&p.root, uri)) {
            self.queue.builder().forget_file(package, uri);
        }
    }

    pub async fn resolve(&self, uri: &Url, position: Position) -> Result<Resolution> {
        self.engine.resolve(uri, position).await
    }

    /// Resolve and hand the outcome to the presenter.
    pub async fn navigate(&self, uri: &Url, position: Position) -> Result<Resolution> {
        let resolution = self.engine.resolve(uri, position).await?;
        self.presenter.present(&resolution.outcome).await?;
        Ok(resolution)
    }

    pub fn presenter(&self) -> &NavigationPresenter {
        &self.presenter
    }

    pub fn shutdown(&self) {
        self.queue.shutdown();
    }
}

/// Wait for scheduled tasks, discarding panics and cancellations.
pub async fn join_all<T>(handles: Vec<JoinHandle<T>>) -> Vec<T> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(value) => results.push(value),
            Err(e) => tracing::warn!("Background task failed: {}", e),
        }
    }
    results
}
