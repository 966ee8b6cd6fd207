//! In-memory hosts shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use pkgnav_api::{
    ApiError, ApiResult, DefinitionService, DefinitionTarget, DirEntry, DocumentService,
    FileSystem, FileType, Position, Presenter, Range, SymbolLocation, Url,
};
use pkgnav_core::config::{ConfiguredPackage, Settings};
use pkgnav_core::host::ScannerSymbolService;
use pkgnav_core::{HostServices, PackageNavigator};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub fn uri(path: &str) -> Url {
    Url::parse(&format!("file://{path}")).unwrap()
}

pub fn package(name: &str, root: &str) -> ConfiguredPackage {
    ConfiguredPackage::new(name, root).unwrap()
}

/// File tree keyed by absolute path. Directories exist implicitly.
#[derive(Default)]
pub struct MemoryFs {
    files: Mutex<BTreeMap<String, String>>,
    listed: Mutex<Vec<String>>,
    unreadable: Mutex<BTreeSet<String>>,
    held: Mutex<Option<(String, Arc<Notify>)>>,
    holding: AtomicBool,
}

impl MemoryFs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn write(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    pub fn remove(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }

    /// Make `open` fail for `path` while keeping it listed.
    pub fn make_unreadable(&self, path: &str) {
        self.unreadable.lock().unwrap().insert(path.to_string());
    }

    /// The next listing of `path` waits until the returned gate is
    /// notified.
    pub fn hold_listing(&self, path: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.held.lock().unwrap() = Some((path.to_string(), gate.clone()));
        gate
    }

    /// A held listing has been reached.
    pub fn is_holding(&self) -> bool {
        self.holding.load(Ordering::SeqCst)
    }

    /// Directories passed to `read_directory`, in call order.
    pub fn listed(&self) -> Vec<String> {
        self.listed.lock().unwrap().clone()
    }

    fn key(uri: &Url) -> String {
        let path = uri.path();
        if path.len() > 1 {
            path.trim_end_matches('/').to_string()
        } else {
            path.to_string()
        }
    }
}

#[async_trait]
impl FileSystem for MemoryFs {
    async fn stat(&self, uri: &Url) -> ApiResult<FileType> {
        let key = Self::key(uri);
        let files = self.files.lock().unwrap();
        if files.contains_key(&key) {
            return Ok(FileType::File);
        }
        let prefix = format!("{}/", key.trim_end_matches('/'));
        if files.keys().any(|k| k.starts_with(&prefix)) {
            Ok(FileType::Directory)
        } else {
            Err(ApiError::NotFound(uri.to_string()))
        }
    }

    async fn read_directory(&self, uri: &Url) -> ApiResult<Vec<DirEntry>> {
        let key = Self::key(uri);
        let gate = {
            let mut held = self.held.lock().unwrap();
            if held.as_ref().is_some_and(|(path, _)| *path == key) {
                held.take().map(|(_, gate)| gate)
            } else {
                None
            }
        };
        if let Some(gate) = gate {
            self.holding.store(true, Ordering::SeqCst);
            gate.notified().await;
        }
        self.listed.lock().unwrap().push(key.clone());
        let prefix = format!("{}/", key.trim_end_matches('/'));
        let files = self.files.lock().unwrap();
        let mut entries: BTreeMap<String, FileType> = BTreeMap::new();
        for path in files.keys() {
            let Some(rest) = path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    entries.insert(dir.to_string(), FileType::Directory);
                }
                None => {
                    entries.insert(rest.to_string(), FileType::File);
                }
            }
        }
        if entries.is_empty() {
            return Err(ApiError::NotFound(uri.to_string()));
        }
        Ok(entries
            .into_iter()
            .map(|(name, file_type)| DirEntry::new(name, file_type))
            .collect())
    }

    async fn exists(&self, uri: &Url) -> bool {
        self.stat(uri).await.is_ok()
    }
}

#[async_trait]
impl DocumentService for MemoryFs {
    async fn open(&self, uri: &Url) -> ApiResult<String> {
        let key = Self::key(uri);
        if self.unreadable.lock().unwrap().contains(&key) {
            return Err(ApiError::Unavailable(format!("cannot open {uri}")));
        }
        self.files
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(uri.to_string()))
    }
}

/// Definition provider with canned answers.
#[derive(Default)]
pub struct CannedDefinitions {
    implementations: Mutex<Option<Vec<DefinitionTarget>>>,
    definitions: Mutex<Option<Vec<DefinitionTarget>>>,
}

impl CannedDefinitions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_implementation(&self, target_uri: Url, target_range: Range) {
        *self.implementations.lock().unwrap() =
            Some(vec![DefinitionTarget::new(target_uri, target_range)]);
    }

    pub fn set_definition(&self, target_uri: Url, target_range: Range) {
        *self.definitions.lock().unwrap() =
            Some(vec![DefinitionTarget::new(target_uri, target_range)]);
    }
}

#[async_trait]
impl DefinitionService for CannedDefinitions {
    async fn implementations(
        &self,
        _uri: &Url,
        _position: Position,
    ) -> ApiResult<Option<Vec<DefinitionTarget>>> {
        Ok(self.implementations.lock().unwrap().clone())
    }

    async fn definitions(
        &self,
        _uri: &Url,
        _position: Position,
    ) -> ApiResult<Option<Vec<DefinitionTarget>>> {
        Ok(self.definitions.lock().unwrap().clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shown {
    Document(SymbolLocation),
    Locations(SymbolLocation, Vec<SymbolLocation>),
    Warning(String),
    Error(String, Vec<String>),
    Settings(String),
}

/// Records every presenter call. `show_error` answers with `reply`.
#[derive(Default)]
pub struct RecordingPresenter {
    shown: Mutex<Vec<Shown>>,
    reply: Mutex<Option<String>>,
}

impl RecordingPresenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply_with(&self, action: &str) {
        *self.reply.lock().unwrap() = Some(action.to_string());
    }

    pub fn shown(&self) -> Vec<Shown> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl Presenter for RecordingPresenter {
    async fn show_document(&self, location: &SymbolLocation) -> ApiResult<()> {
        self.shown
            .lock()
            .unwrap()
            .push(Shown::Document(location.clone()));
        Ok(())
    }

    async fn show_locations(
        &self,
        anchor: &SymbolLocation,
        locations: &[SymbolLocation],
    ) -> ApiResult<()> {
        self.shown
            .lock()
            .unwrap()
            .push(Shown::Locations(anchor.clone(), locations.to_vec()));
        Ok(())
    }

    async fn show_warning(&self, message: &str) -> ApiResult<()> {
        self.shown
            .lock()
            .unwrap()
            .push(Shown::Warning(message.to_string()));
        Ok(())
    }

    async fn show_error(&self, message: &str, actions: &[&str]) -> ApiResult<Option<String>> {
        self.shown.lock().unwrap().push(Shown::Error(
            message.to_string(),
            actions.iter().map(|a| a.to_string()).collect(),
        ));
        Ok(self.reply.lock().unwrap().clone())
    }

    async fn open_settings(&self, section: &str) -> ApiResult<()> {
        self.shown
            .lock()
            .unwrap()
            .push(Shown::Settings(section.to_string()));
        Ok(())
    }
}

/// A navigator wired to in-memory hosts. Symbols come from the built-in
/// scanner reading [`MemoryFs`].
pub struct Harness {
    pub fs: Arc<MemoryFs>,
    pub definitions: Arc<CannedDefinitions>,
    pub presenter: Arc<RecordingPresenter>,
    pub navigator: PackageNavigator,
}

impl Harness {
    pub fn new(fs: Arc<MemoryFs>, settings: Settings) -> Self {
        let definitions = CannedDefinitions::new();
        let presenter = RecordingPresenter::new();
        let services = HostServices {
            symbols: Arc::new(ScannerSymbolService::new(fs.clone())),
            definitions: definitions.clone(),
            fs: fs.clone(),
            documents: fs.clone(),
            presenter: presenter.clone(),
        };
        Self {
            fs,
            definitions,
            presenter,
            navigator: PackageNavigator::new(services, settings),
        }
    }

    pub async fn rebuild(&self) {
        pkgnav_core::join_all(self.navigator.rebuild_all().await).await;
    }
}
