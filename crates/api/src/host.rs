//! Capabilities supplied by the host editor.
//!
//! The engine never talks to an editor directly. Everything it needs from the
//! outside world (symbol outlines, go-to-definition, the file system, open
//! buffers and UI) arrives through these traits so that the LSP server, the
//! CLI and test fakes can each provide their own implementation.

use crate::error::ApiResult;
use crate::models::{DefinitionTarget, DirEntry, DocumentSymbol, FileType, Position, SymbolLocation};
use async_trait::async_trait;
use url::Url;

/// Hierarchical symbol outline of a document.
#[async_trait]
pub trait SymbolService: Send + Sync {
    async fn document_symbols(&self, uri: &Url) -> ApiResult<Vec<DocumentSymbol>>;
}

/// Definition and implementation lookup at a cursor position.
///
/// `Ok(None)` means the provider had nothing to say; `Ok(Some(vec![]))` is
/// treated the same way by callers.
#[async_trait]
pub trait DefinitionService: Send + Sync {
    /// Primary provider used for package-aware navigation.
    async fn implementations(
        &self,
        uri: &Url,
        position: Position,
    ) -> ApiResult<Option<Vec<DefinitionTarget>>>;

    /// Generic go-to-definition, used when fallback navigation is enabled.
    async fn definitions(
        &self,
        uri: &Url,
        position: Position,
    ) -> ApiResult<Option<Vec<DefinitionTarget>>>;
}

#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn stat(&self, uri: &Url) -> ApiResult<FileType>;

    /// Entries of a directory in the order they should be visited.
    async fn read_directory(&self, uri: &Url) -> ApiResult<Vec<DirEntry>>;

    async fn exists(&self, uri: &Url) -> bool;
}

#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Current text of a document, preferring unsaved editor buffers.
    async fn open(&self, uri: &Url) -> ApiResult<String>;
}

/// UI surface of the host.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Open a document with the selection placed on `location.range`.
    async fn show_document(&self, location: &SymbolLocation) -> ApiResult<()>;

    /// Show several candidate locations anchored at `anchor`.
    async fn show_locations(
        &self,
        anchor: &SymbolLocation,
        locations: &[SymbolLocation],
    ) -> ApiResult<()>;

    async fn show_warning(&self, message: &str) -> ApiResult<()>;

    /// Show an error with action buttons; returns the chosen action title.
    async fn show_error(&self, message: &str, actions: &[&str]) -> ApiResult<Option<String>>;

    /// Open the settings UI filtered to `section`.
    async fn open_settings(&self, section: &str) -> ApiResult<()>;
}
