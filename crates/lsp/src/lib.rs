pub mod capabilities;
pub mod goto;
pub mod indexer;
pub mod presenter;
pub mod util;

use crate::capabilities::{NAVIGATE_COMMAND, REBUILD_COMMAND};
use crate::presenter::LspPresenter;
use pkgnav_core::config::{SETTINGS_SECTION, Settings};
use pkgnav_core::host::{
    DocumentStore, ImportDefinitionService, LocalFileSystem, ScannerSymbolService,
};
use pkgnav_core::{HostServices, PackageNavigator};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

pub struct LspServer {
    client: Client,
    pub navigator: Arc<PackageNavigator>,
    pub documents: Arc<DocumentStore>,
    /// Settings received in `initialize`, applied once the client is ready.
    initial_settings: RwLock<Option<Settings>>,
    workspace_folders: RwLock<Vec<Url>>,
}

impl LspServer {
    pub fn new(client: Client) -> Self {
        let documents = Arc::new(DocumentStore::new());
        let fs = Arc::new(LocalFileSystem::new());
        let services = HostServices {
            symbols: Arc::new(ScannerSymbolService::new(documents.clone())),
            definitions: Arc::new(ImportDefinitionService::new(documents.clone(), fs.clone())),
            fs,
            documents: documents.clone(),
            presenter: Arc::new(LspPresenter::new(client.clone())),
        };
        Self {
            client,
            navigator: Arc::new(PackageNavigator::new(services, Settings::default())),
            documents,
            initial_settings: RwLock::new(None),
            workspace_folders: RwLock::new(Vec::new()),
        }
    }

    /// Ask the client for the settings section.
    async fn pull_settings(&self) -> Option<Settings> {
        let items = vec![ConfigurationItem {
            scope_uri: None,
            section: Some(SETTINGS_SECTION.to_string()),
        }];
        match self.client.configuration(items).await {
            Ok(values) => {
                let value = values.into_iter().next()?;
                if value.is_null() {
                    return None;
                }
                self.parse_settings(&value).await
            }
            Err(e) => {
                tracing::debug!("Client did not provide configuration: {}", e);
                None
            }
        }
    }

    async fn parse_settings(&self, value: &serde_json::Value) -> Option<Settings> {
        match Settings::from_value(value) {
            Ok(settings) => Some(settings),
            Err(e) => {
                self.client
                    .log_message(MessageType::ERROR, format!("Invalid settings: {}", e))
                    .await;
                None
            }
        }
    }

    async fn apply_settings(&self, settings: Settings) {
        self.client
            .log_message(
                MessageType::INFO,
                format!("Indexing {} configured packages", settings.packages.len()),
            )
            .await;
        let handles = self.navigator.apply_settings(settings).await;
        indexer::report_rebuilds(self.client.clone(), self.navigator.clone(), handles);
    }

    async fn reindex(&self, uri: &Url) {
        let handles = self.navigator.file_saved(uri).await;
        if handles.is_empty() {
            return;
        }
        let client = self.client.clone();
        let uri = uri.clone();
        tokio::spawn(async move {
            let results = pkgnav_core::join_all(handles).await;
            let declarations: usize = results
                .iter()
                .flatten()
                .map(|file| file.declarations.len())
                .sum();
            client
                .log_message(
                    MessageType::LOG,
                    format!("Re-indexed {}: {} declarations", uri, declarations),
                )
                .await;
        });
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for LspServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let folders: Vec<Url> = match params.workspace_folders {
            Some(folders) if !folders.is_empty() => {
                folders.into_iter().map(|folder| folder.uri).collect()
            }
            _ => params.root_uri.into_iter().collect(),
        };
        self.navigator.set_workspace_folders(folders.clone());
        *self.workspace_folders.write().await = folders;

        if let Some(options) = params.initialization_options {
            let parsed = self.parse_settings(&options).await;
            *self.initial_settings.write().await = parsed;
        }

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "pkgnav".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: capabilities::server_capabilities(),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let initial = self.initial_settings.write().await.take();
        let settings = match initial {
            Some(settings) => Some(settings),
            None => self.pull_settings().await,
        };
        match settings {
            Some(settings) => self.apply_settings(settings).await,
            None => {
                self.client
                    .log_message(MessageType::INFO, "No packages configured")
                    .await
            }
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.navigator.shutdown();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.documents
            .set(params.text_document.uri, params.text_document.text);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let current = self.documents.get(&uri).unwrap_or_default();
        let updated = util::apply_changes(current, &params.content_changes);
        self.documents.set(uri, updated);
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Some(text) = params.text {
            self.documents.set(uri.clone(), text);
        }
        self.reindex(&uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.documents.close(&params.text_document.uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let settings = if params.settings.is_null() {
            self.pull_settings().await
        } else {
            self.parse_settings(&params.settings).await
        };
        if let Some(settings) = settings {
            self.apply_settings(settings).await;
        }
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        let mut folders = self.workspace_folders.write().await;
        folders.retain(|folder| !params.event.removed.iter().any(|r| &r.uri == folder));
        folders.extend(params.event.added.into_iter().map(|folder| folder.uri));
        self.navigator.set_workspace_folders(folders.clone());
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        for change in params.changes {
            if change.typ == FileChangeType::DELETED {
                self.navigator.file_deleted(&change.uri);
            } else {
                self.reindex(&change.uri).await;
            }
        }
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let pos = params.text_document_position_params.position;
        self.client
            .log_message(
                MessageType::LOG,
                format!(
                    "LSP Request: textDocument/definition uri={} pos={}:{}",
                    uri, pos.line, pos.character
                ),
            )
            .await;
        let result = goto::definition(self, params).await;
        match &result {
            Ok(Some(resp)) => {
                let count = match resp {
                    GotoDefinitionResponse::Scalar(_) => 1,
                    GotoDefinitionResponse::Array(v) => v.len(),
                    GotoDefinitionResponse::Link(v) => v.len(),
                };
                self.client
                    .log_message(
                        MessageType::LOG,
                        format!("LSP Response: found {} locations", count),
                    )
                    .await;
            }
            Ok(None) => {
                self.client
                    .log_message(MessageType::LOG, "LSP Response: no package definition")
                    .await
            }
            Err(e) => {
                self.client
                    .log_message(MessageType::ERROR, format!("LSP Error: {}", e))
                    .await
            }
        }
        result
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> Result<Option<serde_json::Value>> {
        match params.command.as_str() {
            NAVIGATE_COMMAND => {
                let Some((uri, position)) = goto::navigate_arguments(&params.arguments) else {
                    return Err(tower_lsp::jsonrpc::Error::invalid_params(
                        "expected [uri, position]",
                    ));
                };
                if let Err(e) = self
                    .navigator
                    .navigate(&uri, util::from_lsp_position(position))
                    .await
                {
                    self.client
                        .log_message(MessageType::ERROR, format!("Navigation failed: {}", e))
                        .await;
                }
            }
            REBUILD_COMMAND => {
                let handles = self.navigator.rebuild_all().await;
                indexer::report_rebuilds(self.client.clone(), self.navigator.clone(), handles);
            }
            other => {
                return Err(tower_lsp::jsonrpc::Error::invalid_params(format!(
                    "unknown command {other}"
                )));
            }
        }
        Ok(None)
    }
}

pub async fn run_server() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = tower_lsp::LspService::new(LspServer::new);
    tower_lsp::Server::new(stdin, stdout, socket)
        .serve(service)
        .await;

    Ok(())
}
