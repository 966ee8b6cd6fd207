use pkgnav_api::{Position, Range, SymbolLocation};
use pkgnav_core::util::position_to_offset;
use tower_lsp::lsp_types;

pub fn from_lsp_position(position: lsp_types::Position) -> Position {
    Position::new(position.line, position.character)
}

pub fn to_lsp_position(position: Position) -> lsp_types::Position {
    lsp_types::Position::new(position.line, position.character)
}

pub fn to_lsp_range(range: Range) -> lsp_types::Range {
    lsp_types::Range::new(to_lsp_position(range.start), to_lsp_position(range.end))
}

pub fn to_lsp_location(location: &SymbolLocation) -> lsp_types::Location {
    lsp_types::Location::new(location.uri.clone(), to_lsp_range(location.range))
}

/// Apply content changes in order. A change without a range replaces the
/// whole text.
pub fn apply_changes(
    mut content: String,
    changes: &[lsp_types::TextDocumentContentChangeEvent],
) -> String {
    for change in changes {
        match change.range {
            Some(range) => {
                let start = position_to_offset(&content, from_lsp_position(range.start));
                let end = position_to_offset(&content, from_lsp_position(range.end)).max(start);
                content.replace_range(start..end, &change.text);
            }
            None => content = change.text.clone(),
        }
    }
    content
}
