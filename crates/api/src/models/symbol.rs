use super::position::Range;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SymbolKind {
    Module,
    Namespace,
    Class,
    Interface,
    Enum,
    EnumMember,
    TypeAlias,
    Function,
    Method,
    Constructor,
    Property,
    Field,
    Variable,
    Constant,
    Unknown,
}

impl SymbolKind {
    /// `let`/`var` and `const` bindings both count as variables.
    pub fn is_variable(&self) -> bool {
        matches!(self, SymbolKind::Variable | SymbolKind::Constant)
    }
}

/// One node of a hierarchical symbol description.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DocumentSymbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Whole declaration, including its body.
    pub range: Range,
    /// Name token only.
    pub selection_range: Range,
    #[serde(default)]
    pub children: Vec<DocumentSymbol>,
}

impl DocumentSymbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, range: Range, selection_range: Range) -> Self {
        Self {
            name: name.into(),
            kind,
            range,
            selection_range,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<DocumentSymbol>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolLocation {
    pub uri: Url,
    pub range: Range,
}

impl SymbolLocation {
    pub fn new(uri: Url, range: Range) -> Self {
        Self { uri, range }
    }
}

/// Result item of a definition or implementation lookup.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DefinitionTarget {
    pub target_uri: Url,
    pub target_range: Range,
}

impl DefinitionTarget {
    pub fn new(target_uri: Url, target_range: Range) -> Self {
        Self {
            target_uri,
            target_range,
        }
    }

    pub fn to_location(&self) -> SymbolLocation {
        SymbolLocation::new(self.target_uri.clone(), self.target_range)
    }
}

/// Value stored per symbol path.
///
/// `Multiple` is used if and only if at least two locations share the same
/// symbol path inside one file-stem bucket, in discovery order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum DeclarationEntry {
    Single(SymbolLocation),
    Multiple(Vec<SymbolLocation>),
}

impl DeclarationEntry {
    /// `None` only for an empty `Multiple`, which the index never stores.
    pub fn first(&self) -> Option<&SymbolLocation> {
        self.locations().first()
    }

    pub fn locations(&self) -> &[SymbolLocation] {
        match self {
            DeclarationEntry::Single(loc) => std::slice::from_ref(loc),
            DeclarationEntry::Multiple(locs) => locs,
        }
    }

    pub fn len(&self) -> usize {
        self.locations().len()
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, DeclarationEntry::Multiple(_))
    }

    /// Append a duplicate, converting a single location into a sequence.
    pub fn push(&mut self, location: SymbolLocation) {
        match self {
            DeclarationEntry::Single(existing) => {
                let first = existing.clone();
                *self = DeclarationEntry::Multiple(vec![first, location]);
            }
            DeclarationEntry::Multiple(locs) => locs.push(location),
        }
    }

    /// Drop every location in `uri`, collapsing back to `Single` when one
    /// remains. Returns `None` when nothing remains.
    pub fn without_uri(self, uri: &Url) -> Option<Self> {
        let mut remaining: Vec<SymbolLocation> = match self {
            DeclarationEntry::Single(loc) => vec![loc],
            DeclarationEntry::Multiple(locs) => locs,
        };
        remaining.retain(|loc| &loc.uri != uri);
        match remaining.len() {
            0 => None,
            1 => remaining.pop().map(DeclarationEntry::Single),
            _ => Some(DeclarationEntry::Multiple(remaining)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(file: &str, line: u32) -> SymbolLocation {
        SymbolLocation::new(
            Url::parse(&format!("file:///pkgs/foo/src/{file}")).unwrap(),
            Range::on_line(line, 16, 21),
        )
    }

    #[test]
    fn test_push_converts_to_sequence() {
        let mut entry = DeclarationEntry::Single(loc("parse.ts", 1));
        entry.push(loc("parse.ts", 5));
        entry.push(loc("parse.ts", 9));

        assert!(entry.is_multiple());
        let lines: Vec<u32> = entry.locations().iter().map(|l| l.range.start.line).collect();
        assert_eq!(lines, vec![1, 5, 9]);
        assert_eq!(entry.first().unwrap().range.start.line, 1);
    }

    #[test]
    fn test_without_uri_collapses() {
        let mut entry = DeclarationEntry::Single(loc("a/index.ts", 1));
        entry.push(loc("b/index.ts", 2));

        let remaining = entry
            .without_uri(&loc("a/index.ts", 0).uri)
            .expect("one location left");
        assert_eq!(remaining, DeclarationEntry::Single(loc("b/index.ts", 2)));

        assert!(remaining.without_uri(&loc("b/index.ts", 0).uri).is_none());
    }

    #[test]
    fn test_empty_sequence_has_no_first() {
        let entry: DeclarationEntry = serde_json::from_str("[]").unwrap();
        assert_eq!(entry, DeclarationEntry::Multiple(vec![]));
        assert!(entry.first().is_none());
    }
}
