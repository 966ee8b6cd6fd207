use crate::LspServer;
use crate::util::{from_lsp_position, to_lsp_location};
use pkgnav_api::{DeclarationEntry, SymbolLocation};
use pkgnav_core::Outcome;
use tower_lsp::jsonrpc::{Error, ErrorCode, Result};
use tower_lsp::lsp_types::*;

fn response(locations: &[SymbolLocation]) -> Option<GotoDefinitionResponse> {
    match locations {
        [] => None,
        [single] => Some(GotoDefinitionResponse::Scalar(to_lsp_location(single))),
        many => Some(GotoDefinitionResponse::Array(
            many.iter().map(to_lsp_location).collect(),
        )),
    }
}

/// Package-aware go-to-definition. Locations are returned to the client;
/// only a missing package root is surfaced through the presenter.
pub async fn definition(
    server: &LspServer,
    params: GotoDefinitionParams,
) -> Result<Option<GotoDefinitionResponse>> {
    let uri = params.text_document_position_params.text_document.uri;
    let position = from_lsp_position(params.text_document_position_params.position);

    let resolution = server
        .navigator
        .resolve(&uri, position)
        .await
        .map_err(|e| Error {
            code: ErrorCode::InternalError,
            message: e.to_string().into(),
            data: None,
        })?;

    match resolution.outcome {
        Outcome::Navigate { entry, .. } => Ok(match &entry {
            DeclarationEntry::Single(location) => response(std::slice::from_ref(location)),
            DeclarationEntry::Multiple(locations) => response(locations),
        }),
        Outcome::Fallback(locations) => Ok(response(&locations)),
        outcome @ Outcome::MissingRoot { .. } => {
            // the error prompt waits on the user, so it must not block the request
            let presenter = server.navigator.presenter().clone();
            tokio::spawn(async move {
                if let Err(e) = presenter.present(&outcome).await {
                    tracing::warn!("Failed to report missing root: {}", e);
                }
            });
            Ok(None)
        }
        Outcome::NoMatch(reason) => {
            tracing::debug!("No package definition at {} {}: {}", uri, position, reason);
            Ok(None)
        }
    }
}

/// Arguments of the navigate command: `[uri, position]`.
pub fn navigate_arguments(arguments: &[serde_json::Value]) -> Option<(Url, Position)> {
    let uri = serde_json::from_value(arguments.first()?.clone()).ok()?;
    let position = serde_json::from_value(arguments.get(1)?.clone()).ok()?;
    Some((uri, position))
}
