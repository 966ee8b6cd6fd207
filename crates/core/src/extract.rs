//! Declaration extraction from symbol outlines.

use crate::error::Result;
use crate::util::{file_name, file_stem};
use pkgnav_api::{DocumentSymbol, Range, SymbolKind, SymbolService, Url};
use std::sync::Arc;

/// Joins ancestor names into a symbol path.
pub const PATH_SEPARATOR: char = '/';

/// Only single-extension TypeScript sources are indexed, which keeps
/// `.d.ts` and similar compound names out by construction.
pub fn is_indexable_name(name: &str) -> bool {
    name.matches('.').count() == 1 && (name.ends_with(".ts") || name.ends_with(".tsx"))
}

pub fn is_indexable(uri: &Url) -> bool {
    file_name(uri).is_some_and(|name| is_indexable_name(&name))
}

/// Names that come from array indices, calls or property access rather
/// than a declaration.
fn is_noise_name(name: &str) -> bool {
    name.contains(['[', '(', '.'])
}

/// Declarations found in one file, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDeclarations {
    pub uri: Url,
    pub stem: String,
    pub declarations: Vec<(String, Range)>,
}

impl FileDeclarations {
    pub fn new(uri: Url, declarations: Vec<(String, Range)>) -> Self {
        let stem = file_name(&uri)
            .map(|name| file_stem(&name).to_string())
            .unwrap_or_default();
        Self {
            uri,
            stem,
            declarations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

/// Depth-first walk producing `(symbol path, selection range)` pairs.
///
/// A node is skipped, together with its subtree, when it is a variable
/// nested in another variable or when its name is not a plain identifier.
pub fn collect_declarations(symbols: &[DocumentSymbol]) -> Vec<(String, Range)> {
    let mut out = Vec::new();
    walk(symbols, None, "", &mut out);
    out
}

fn walk(
    symbols: &[DocumentSymbol],
    parent_kind: Option<SymbolKind>,
    prefix: &str,
    out: &mut Vec<(String, Range)>,
) {
    for symbol in symbols {
        if symbol.kind.is_variable() && parent_kind.is_some_and(|k| k.is_variable()) {
            continue;
        }
        if is_noise_name(&symbol.name) {
            continue;
        }
        let path = if prefix.is_empty() {
            symbol.name.clone()
        } else {
            format!("{prefix}{PATH_SEPARATOR}{}", symbol.name)
        };
        out.push((path.clone(), symbol.selection_range));
        walk(&symbol.children, Some(symbol.kind), &path, out);
    }
}

/// Path of the symbol whose full or name range equals `target`.
pub fn find_symbol_path(symbols: &[DocumentSymbol], target: &Range) -> Option<String> {
    for symbol in symbols {
        if symbol.range == *target || symbol.selection_range == *target {
            return Some(symbol.name.clone());
        }
        if let Some(rest) = find_symbol_path(&symbol.children, target) {
            return Some(format!("{}{PATH_SEPARATOR}{rest}", symbol.name));
        }
    }
    None
}

/// Turns files into [`FileDeclarations`] through the host symbol service.
#[derive(Clone)]
pub struct DeclarationExtractor {
    symbols: Arc<dyn SymbolService>,
}

impl DeclarationExtractor {
    pub fn new(symbols: Arc<dyn SymbolService>) -> Self {
        Self { symbols }
    }

    pub async fn extract(&self, uri: &Url) -> Result<FileDeclarations> {
        let outline = self.symbols.document_symbols(uri).await?;
        Ok(FileDeclarations::new(
            uri.clone(),
            collect_declarations(&outline),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, kind: SymbolKind, line: u32) -> DocumentSymbol {
        let len = name.len() as u32;
        DocumentSymbol::new(
            name,
            kind,
            Range::on_line(line, 0, 40),
            Range::on_line(line, 6, 6 + len),
        )
    }

    #[test]
    fn test_indexable_names() {
        assert!(is_indexable_name("Widget.ts"));
        assert!(is_indexable_name("App.tsx"));
        assert!(!is_indexable_name("Widget.d.ts"));
        assert!(!is_indexable_name("Widget.spec.ts"));
        assert!(!is_indexable_name("package.json"));
        assert!(!is_indexable_name("Makefile"));
    }

    #[test]
    fn test_nested_paths_are_slash_joined() {
        let outline = vec![
            sym("Outer", SymbolKind::Namespace, 0).with_children(vec![
                sym("Inner", SymbolKind::Class, 1)
                    .with_children(vec![sym("run", SymbolKind::Method, 2)]),
            ]),
            sym("helper", SymbolKind::Function, 5),
        ];
        let paths: Vec<String> = collect_declarations(&outline)
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(paths, vec!["Outer", "Outer/Inner", "Outer/Inner/run", "helper"]);
    }

    #[test]
    fn test_noise_is_filtered() {
        let outline = vec![
            sym("config", SymbolKind::Constant, 0).with_children(vec![
                sym("host", SymbolKind::Variable, 1),
                sym("build", SymbolKind::Method, 2),
            ]),
            sym("items[0]", SymbolKind::Variable, 3),
            sym("describe() callback", SymbolKind::Function, 4)
                .with_children(vec![sym("inside", SymbolKind::Function, 5)]),
            sym("module.exports", SymbolKind::Variable, 6),
        ];
        let paths: Vec<String> = collect_declarations(&outline)
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(paths, vec!["config", "config/build"]);
    }

    #[test]
    fn test_duplicates_are_kept_in_order() {
        let outline = vec![
            sym("parse", SymbolKind::Function, 0),
            sym("parse", SymbolKind::Function, 3),
        ];
        let found = collect_declarations(&outline);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].1.start.line, 0);
        assert_eq!(found[1].1.start.line, 3);
    }

    #[test]
    fn test_find_symbol_path_matches_either_range() {
        let outline = vec![sym("Outer", SymbolKind::Namespace, 0).with_children(vec![
            sym("Inner", SymbolKind::Class, 1),
        ])];
        let by_name = Range::on_line(1, 6, 11);
        let by_decl = Range::on_line(1, 0, 40);
        assert_eq!(find_symbol_path(&outline, &by_name).as_deref(), Some("Outer/Inner"));
        assert_eq!(find_symbol_path(&outline, &by_decl).as_deref(), Some("Outer/Inner"));
        assert_eq!(find_symbol_path(&outline, &Range::on_line(9, 0, 1)), None);
    }

    #[test]
    fn test_file_declarations_stem() {
        let uri = Url::parse("file:///pkgs/foo/src/Widget.ts").unwrap();
        assert_eq!(FileDeclarations::new(uri, vec![]).stem, "Widget");
    }
}
