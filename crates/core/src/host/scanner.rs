//! Line-oriented outline scanner for TypeScript sources.
//!
//! Not a parser. Comments and string contents are blanked first, then
//! declarations are recognised at the start of a line and bodies are
//! tracked by brace matching. Good enough to produce the same symbol
//! paths an editor outline would for conventionally formatted code.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use pkgnav_api::{
    ApiResult, DocumentService, DocumentSymbol, Position, Range, SymbolKind, SymbolService, Url,
};
use regex::Regex;
use std::sync::Arc;

static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[ \t]*(?:export[ \t]+)?(?:default[ \t]+)?(?:declare[ \t]+)?(?:abstract[ \t]+)?(?:async[ \t]+)?(?P<kw>function|class|interface|type|(?:const[ \t]+)?enum|namespace|module|const|let|var)(?:[ \t]*\*[ \t]*|[ \t]+)(?P<name>[A-Za-z_$][\w$]*)",
    )
    .expect("declaration pattern")
});

static MEMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[ \t]*(?:(?:public|private|protected|static|readonly|abstract|override|declare|async|get|set)[ \t]+)*(?:\*[ \t]*)?(?P<name>#?[A-Za-z_$][\w$]*)[ \t]*[?!]?[ \t]*(?P<sig>[(<:=;]|$)",
    )
    .expect("member pattern")
});

static ENUM_MEMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*(?P<name>[A-Za-z_$][\w$]*)[ \t]*(?:=|,|$)").expect("enum member pattern")
});

static OBJECT_MEMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[ \t]*(?:async[ \t]+)?(?:(?:get|set)[ \t]+)?(?P<name>[A-Za-z_$][\w$]*)[ \t]*(?P<sig>[:(])",
    )
    .expect("object member pattern")
});

/// Outline of a TypeScript document.
pub fn scan_declarations(text: &str) -> Vec<DocumentSymbol> {
    let masked = mask_non_code(text);
    let mut scanner = Scanner::new(text);
    let mut offset = 0;
    for line in masked.split_inclusive('\n') {
        scanner.line(offset, line.trim_end_matches(['\n', '\r']));
        offset += line.len();
    }
    scanner.finish()
}

/// Blank comments and the contents of string and template literals,
/// keeping byte offsets and line breaks intact.
fn mask_non_code(text: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Literal(u8),
    }

    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut state = State::Code;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            State::Code => match (b, next) {
                (b'/', Some(b'/')) => {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    state = State::LineComment;
                    i += 1;
                }
                (b'/', Some(b'*')) => {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    state = State::BlockComment;
                    i += 1;
                }
                (b'\'' | b'"' | b'`', _) => state = State::Literal(b),
                _ => {}
            },
            State::LineComment => {
                if b == b'\n' {
                    state = State::Code;
                } else {
                    out[i] = b' ';
                }
            }
            State::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    state = State::Code;
                    i += 1;
                } else if b != b'\n' {
                    out[i] = b' ';
                }
            }
            State::Literal(quote) => {
                if b == b'\\' {
                    out[i] = b' ';
                    if next.is_some_and(|n| n != b'\n') {
                        out[i + 1] = b' ';
                        i += 1;
                    }
                } else if b == quote {
                    state = State::Code;
                } else if b == b'\n' {
                    if quote != b'`' {
                        state = State::Code;
                    }
                } else {
                    out[i] = b' ';
                }
            }
        }
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| text.to_string())
}

/// Byte offset to LSP position over the unmasked text.
struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, starts }
    }

    fn position(&self, offset: usize) -> Position {
        let line = self.starts.partition_point(|&s| s <= offset).saturating_sub(1);
        let start = self.starts[line];
        let end = offset.min(self.text.len());
        let character = self
            .text
            .get(start..end)
            .map(|s| s.encode_utf16().count())
            .unwrap_or(0);
        Position::new(line as u32, character as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Class,
    Interface,
    Enum,
    Object,
    Block,
}

struct Scope {
    kind: ScopeKind,
    owner: Option<usize>,
}

/// A declaration waiting for its body to open.
struct Pending {
    node: usize,
    depth: usize,
    paren: usize,
    name_end: usize,
}

struct Node {
    symbol: DocumentSymbol,
    parent: Option<usize>,
}

struct Scanner<'a> {
    lines: LineIndex<'a>,
    nodes: Vec<Node>,
    stack: Vec<Scope>,
    pending: Option<Pending>,
    paren: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: LineIndex::new(text),
            nodes: Vec::new(),
            stack: vec![Scope {
                kind: ScopeKind::Module,
                owner: None,
            }],
            pending: None,
            paren: 0,
        }
    }

    fn scope(&self) -> &Scope {
        // the module scope is never popped
        &self.stack[self.stack.len() - 1]
    }

    fn line(&mut self, offset: usize, line: &str) {
        if let Some((kind, name_start, name_end)) = self.match_declaration(line) {
            let indent = line.len() - line.trim_start().len();
            let end = line.trim_end().len();
            let node = self.push_node(
                &line[name_start..name_end],
                kind,
                offset + indent,
                offset + end,
                offset + name_start,
                offset + name_end,
            );
            self.pending = Some(Pending {
                node,
                depth: self.stack.len(),
                paren: self.paren,
                name_end: offset + name_end,
            });
        }

        for (i, b) in line.bytes().enumerate() {
            let at = offset + i;
            match b {
                b'(' => self.paren += 1,
                b')' => self.paren = self.paren.saturating_sub(1),
                b'{' => self.open(line, offset, at),
                b'}' => self.close(at),
                b';' | b',' => {
                    if self.pending_here() {
                        if let Some(pending) = self.pending.take() {
                            if b == b';' {
                                self.set_end(pending.node, at + 1);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn pending_here(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| p.depth == self.stack.len() && p.paren == self.paren)
    }

    fn match_declaration(&self, line: &str) -> Option<(SymbolKind, usize, usize)> {
        match self.scope().kind {
            ScopeKind::Module => {
                let caps = DECLARATION.captures(line)?;
                let name = caps.name("name")?;
                let kind = match caps.name("kw")?.as_str() {
                    "function" => SymbolKind::Function,
                    "class" => SymbolKind::Class,
                    "interface" => SymbolKind::Interface,
                    "type" => SymbolKind::TypeAlias,
                    "namespace" => SymbolKind::Namespace,
                    "module" => SymbolKind::Module,
                    "const" => SymbolKind::Constant,
                    "let" | "var" => SymbolKind::Variable,
                    _ => SymbolKind::Enum,
                };
                Some((kind, name.start(), name.end()))
            }
            ScopeKind::Class | ScopeKind::Interface => {
                let caps = MEMBER.captures(line)?;
                let name = caps.name("name")?;
                let sig = caps.name("sig").map(|m| m.as_str()).unwrap_or("");
                let kind = if name.as_str() == "constructor" {
                    SymbolKind::Constructor
                } else if sig == "(" || sig == "<" {
                    SymbolKind::Method
                } else {
                    SymbolKind::Property
                };
                Some((kind, name.start(), name.end()))
            }
            ScopeKind::Enum => {
                let name = ENUM_MEMBER.captures(line)?.name("name")?;
                Some((SymbolKind::EnumMember, name.start(), name.end()))
            }
            ScopeKind::Object => {
                let caps = OBJECT_MEMBER.captures(line)?;
                let name = caps.name("name")?;
                let kind = match caps.name("sig").map(|m| m.as_str()) {
                    Some("(") => SymbolKind::Method,
                    _ => SymbolKind::Property,
                };
                Some((kind, name.start(), name.end()))
            }
            ScopeKind::Block => None,
        }
    }

    fn push_node(
        &mut self,
        name: &str,
        kind: SymbolKind,
        start: usize,
        end: usize,
        name_start: usize,
        name_end: usize,
    ) -> usize {
        let range = Range::new(self.lines.position(start), self.lines.position(end));
        let selection = Range::new(
            self.lines.position(name_start),
            self.lines.position(name_end),
        );
        self.nodes.push(Node {
            symbol: DocumentSymbol::new(name, kind, range, selection),
            parent: self.scope().owner,
        });
        self.nodes.len() - 1
    }

    fn open(&mut self, line: &str, offset: usize, at: usize) {
        let scope = if self.pending_here() {
            match self.pending.take() {
                Some(pending) => {
                    let lead = line
                        .get(pending.name_end.saturating_sub(offset)..at - offset)
                        .and_then(|between| between.trim_end().chars().last());
                    let kind = self.nodes[pending.node].symbol.kind;
                    Scope {
                        kind: body_scope(kind, self.scope().kind, lead),
                        owner: Some(pending.node),
                    }
                }
                None => Scope {
                    kind: ScopeKind::Block,
                    owner: None,
                },
            }
        } else {
            Scope {
                kind: ScopeKind::Block,
                owner: None,
            }
        };
        self.stack.push(scope);
    }

    fn close(&mut self, at: usize) {
        if self.stack.len() == 1 {
            return;
        }
        if let Some(scope) = self.stack.pop() {
            if let Some(owner) = scope.owner {
                self.set_end(owner, at + 1);
            }
        }
        if self
            .pending
            .as_ref()
            .is_some_and(|p| p.depth > self.stack.len())
        {
            self.pending = None;
        }
    }

    fn set_end(&mut self, node: usize, offset: usize) {
        let end = self.lines.position(offset);
        let range = &mut self.nodes[node].symbol.range;
        if end > range.start {
            range.end = end;
        }
    }

    fn finish(self) -> Vec<DocumentSymbol> {
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        let mut roots = Vec::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            match node.parent {
                Some(parent) => children[parent].push(idx),
                None => roots.push(idx),
            }
        }
        roots
            .into_iter()
            .map(|idx| assemble(&self.nodes, &children, idx))
            .collect()
    }
}

fn assemble(nodes: &[Node], children: &[Vec<usize>], idx: usize) -> DocumentSymbol {
    let kids = children[idx]
        .iter()
        .map(|&child| assemble(nodes, children, child))
        .collect();
    nodes[idx].symbol.clone().with_children(kids)
}

/// What kind of body a declaration opens. `lead` is the last non-blank
/// character between the name and the brace.
fn body_scope(kind: SymbolKind, parent: ScopeKind, lead: Option<char>) -> ScopeKind {
    match kind {
        SymbolKind::Class => ScopeKind::Class,
        SymbolKind::Interface | SymbolKind::TypeAlias => ScopeKind::Interface,
        SymbolKind::Enum => ScopeKind::Enum,
        SymbolKind::Namespace | SymbolKind::Module => ScopeKind::Module,
        SymbolKind::Variable | SymbolKind::Constant if lead == Some('=') => ScopeKind::Object,
        SymbolKind::Property if parent == ScopeKind::Interface => ScopeKind::Interface,
        SymbolKind::Property if matches!(lead, Some(':' | '=')) => ScopeKind::Object,
        _ => ScopeKind::Block,
    }
}

/// [`SymbolService`] that scans document text from a [`DocumentService`].
pub struct ScannerSymbolService {
    documents: Arc<dyn DocumentService>,
}

impl ScannerSymbolService {
    pub fn new(documents: Arc<dyn DocumentService>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl SymbolService for ScannerSymbolService {
    async fn document_symbols(&self, uri: &Url) -> ApiResult<Vec<DocumentSymbol>> {
        let text = self.documents.open(uri).await?;
        Ok(scan_declarations(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(symbols: &[DocumentSymbol]) -> Vec<String> {
        fn walk(symbols: &[DocumentSymbol], prefix: &str, out: &mut Vec<String>) {
            for s in symbols {
                let path = if prefix.is_empty() {
                    s.name.clone()
                } else {
                    format!("{prefix}/{}", s.name)
                };
                out.push(path.clone());
                walk(&s.children, &path, out);
            }
        }
        let mut out = Vec::new();
        walk(symbols, "", &mut out);
        out
    }

    #[test]
    fn test_top_level_declarations() {
        let source = r#"import { x } from './x';

export function parse(input: string): Node {
    const local = 1;
    return build(input);
}

export default class Widget extends Base {
    private readonly id: string;
    static create(): Widget {
        return new Widget();
    }
    constructor(id: string) {
        super();
    }
}

export const enum Color {
    Red = 1,
    Green,
}

type Alias = string;
let counter = 0;
"#;
        let outline = scan_declarations(source);
        assert_eq!(
            paths(&outline),
            vec![
                "parse",
                "Widget",
                "Widget/id",
                "Widget/create",
                "Widget/constructor",
                "Color",
                "Color/Red",
                "Color/Green",
                "Alias",
                "counter",
            ]
        );
        assert_eq!(outline[0].kind, SymbolKind::Function);
        assert_eq!(outline[1].children[2].kind, SymbolKind::Constructor);
        assert_eq!(outline[2].kind, SymbolKind::Enum);
    }

    #[test]
    fn test_ranges_cover_bodies() {
        let source = "export function run() {\n  go();\n}\n";
        let outline = scan_declarations(source);
        let run = &outline[0];
        assert_eq!(run.selection_range, Range::on_line(0, 16, 19));
        assert_eq!(run.range.start, Position::new(0, 0));
        assert_eq!(run.range.end, Position::new(2, 1));
    }

    #[test]
    fn test_overload_signatures_are_separate_symbols() {
        let source = "export function f(a: string): void;\nexport function f(a: number): void;\nexport function f(a: any) {\n}\n";
        let outline = scan_declarations(source);
        assert_eq!(paths(&outline), vec!["f", "f", "f"]);
        assert_eq!(outline[0].range.end, Position::new(0, 35));
        assert_eq!(outline[2].range.end, Position::new(3, 1));
    }

    #[test]
    fn test_namespaces_nest_and_comments_are_ignored() {
        let source = r#"// function commented() {}
/* class Hidden {
} */
export namespace Outer {
    export interface Options {
        verbose?: boolean;
        nested: {
            depth: number;
        };
        run(): void;
    }
    const label = "class NotAClass {";
}
"#;
        let outline = scan_declarations(source);
        assert_eq!(
            paths(&outline),
            vec![
                "Outer",
                "Outer/Options",
                "Outer/Options/verbose",
                "Outer/Options/nested",
                "Outer/Options/nested/depth",
                "Outer/Options/run",
                "Outer/label",
            ]
        );
    }

    #[test]
    fn test_object_literal_members() {
        let source = "export const config = {\n  host: 'localhost',\n  build() {\n    return 1;\n  },\n};\nexport const handler = () => {\n  const inner = 2;\n};\n";
        let outline = scan_declarations(source);
        assert_eq!(
            paths(&outline),
            vec!["config", "config/host", "config/build", "handler"]
        );
        assert_eq!(outline[0].kind, SymbolKind::Constant);
        assert_eq!(outline[0].children[1].kind, SymbolKind::Method);
    }

    #[test]
    fn test_columns_count_utf16_units() {
        let source = "let s = '𝒳';\nfunction après() {}\nfunction x𝒳() {}\n";
        let outline = scan_declarations(source);
        assert_eq!(paths(&outline), vec!["s", "après", "x𝒳"]);
        assert_eq!(outline[1].selection_range, Range::on_line(1, 9, 14));
        assert_eq!(outline[2].selection_range, Range::on_line(2, 9, 12));
    }

    #[test]
    fn test_mask_keeps_offsets() {
        let source = "let s = 'héllo'; // ünï\nlet t = 1;";
        let masked = mask_non_code(source);
        assert_eq!(masked.len(), source.len());
        assert!(masked.starts_with("let s = '"));
        assert!(masked.ends_with("\nlet t = 1;"));
        assert!(!masked.contains('h'));
    }
}
