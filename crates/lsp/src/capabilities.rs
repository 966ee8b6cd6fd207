use tower_lsp::lsp_types::*;

/// Command that resolves and presents in one step, for clients that bind a
/// key to it instead of using go-to-definition.
pub const NAVIGATE_COMMAND: &str = "pkgnav.navigate";
/// Command that re-indexes every configured package.
pub const REBUILD_COMMAND: &str = "pkgnav.rebuild";

pub fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::INCREMENTAL),
                save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                ..Default::default()
            },
        )),
        definition_provider: Some(OneOf::Left(true)),
        execute_command_provider: Some(ExecuteCommandOptions {
            commands: vec![NAVIGATE_COMMAND.to_string(), REBUILD_COMMAND.to_string()],
            ..Default::default()
        }),
        workspace: Some(WorkspaceServerCapabilities {
            workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                supported: Some(true),
                change_notifications: Some(OneOf::Left(true)),
            }),
            file_operations: None,
        }),
        ..Default::default()
    }
}
