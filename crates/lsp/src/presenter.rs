//! [`Presenter`] over the LSP client connection.

use crate::util::{to_lsp_location, to_lsp_range};
use pkgnav_api::{ApiError, ApiResult, Presenter, SymbolLocation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tower_lsp::Client;
use tower_lsp::async_trait;
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::{Location, MessageActionItem, MessageType, ShowDocumentParams};

/// Asks the client to show a list of candidate locations (a peek view in
/// most editors).
pub enum ShowLocations {}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ShowLocationsParams {
    pub anchor: Location,
    pub locations: Vec<Location>,
}

impl Notification for ShowLocations {
    type Params = ShowLocationsParams;
    const METHOD: &'static str = "pkgnav/showLocations";
}

/// Asks the client to open its settings UI on a section.
pub enum OpenSettings {}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OpenSettingsParams {
    pub section: String,
}

impl Notification for OpenSettings {
    type Params = OpenSettingsParams;
    const METHOD: &'static str = "pkgnav/openSettings";
}

fn unavailable(err: tower_lsp::jsonrpc::Error) -> ApiError {
    ApiError::Unavailable(err.to_string())
}

pub struct LspPresenter {
    client: Client,
}

impl LspPresenter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Presenter for LspPresenter {
    async fn show_document(&self, location: &SymbolLocation) -> ApiResult<()> {
        let shown = self
            .client
            .show_document(ShowDocumentParams {
                uri: location.uri.clone(),
                external: Some(false),
                take_focus: Some(true),
                selection: Some(to_lsp_range(location.range)),
            })
            .await
            .map_err(unavailable)?;
        if !shown {
            tracing::debug!("Client declined to show {}", location.uri);
        }
        Ok(())
    }

    async fn show_locations(
        &self,
        anchor: &SymbolLocation,
        locations: &[SymbolLocation],
    ) -> ApiResult<()> {
        self.client
            .send_notification::<ShowLocations>(ShowLocationsParams {
                anchor: to_lsp_location(anchor),
                locations: locations.iter().map(to_lsp_location).collect(),
            })
            .await;
        Ok(())
    }

    async fn show_warning(&self, message: &str) -> ApiResult<()> {
        self.client.show_message(MessageType::WARNING, message).await;
        Ok(())
    }

    async fn show_error(&self, message: &str, actions: &[&str]) -> ApiResult<Option<String>> {
        let items = actions
            .iter()
            .map(|title| MessageActionItem {
                title: title.to_string(),
                properties: HashMap::new(),
            })
            .collect();
        let chosen = self
            .client
            .show_message_request(MessageType::ERROR, message, Some(items))
            .await
            .map_err(unavailable)?;
        Ok(chosen.map(|item| item.title))
    }

    async fn open_settings(&self, section: &str) -> ApiResult<()> {
        self.client
            .send_notification::<OpenSettings>(OpenSettingsParams {
                section: section.to_string(),
            })
            .await;
        Ok(())
    }
}
