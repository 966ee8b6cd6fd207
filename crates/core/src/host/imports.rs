//! Definition lookup through `import` statements and `node_modules`.

use super::scanner::scan_declarations;
use crate::util::{as_directory, child_uri, is_ident_char, join_fragment, word_at};
use crate::version::{MANIFEST_FILE, Manifest};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use pkgnav_api::{
    ApiResult, DefinitionService, DefinitionTarget, DocumentService, DocumentSymbol, FileSystem,
    FileType, Position, Range, Url,
};
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// Re-export chains longer than this are abandoned.
const MAX_REEXPORT_DEPTH: usize = 8;

const MODULE_EXTENSIONS: [&str; 3] = [".d.ts", ".ts", ".tsx"];

static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+(?:type\s+)?(?P<clause>[^;'"]*?)\s*from\s*['"](?P<spec>[^'"]+)['"]"#)
        .expect("import pattern")
});

static NAMESPACE_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\s*as\s+(?P<ns>[\w$]+)").expect("namespace pattern"));

static EXPORT_NAMES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"export\s+(?:type\s+)?\{(?P<names>[^}]*)\}(?:\s*from\s*['"](?P<spec>[^'"]+)['"])?"#,
    )
    .expect("export list pattern")
});

static EXPORT_STAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"export\s+\*(?:\s*as\s+(?P<ns>[\w$]+))?\s*from\s*['"](?P<spec>[^'"]+)['"]"#)
        .expect("export star pattern")
});

static EXPORT_DEFAULT_IDENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*export[ \t]+default[ \t]+(?P<name>[A-Za-z_$][\w$]*)[ \t]*;?[ \t]*$")
        .expect("export default pattern")
});

/// How a local name entered a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    pub specifier: String,
    /// Name in the exporting module: `default`, `*` for a namespace import,
    /// or the exported identifier.
    pub imported: String,
}

/// `(imported, local)` pairs of a `{ a, b as c }` list.
fn parse_name_list(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .map(str::trim)
        .map(|item| item.strip_prefix("type ").map(str::trim).unwrap_or(item))
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once(" as ") {
            Some((imported, local)) => (imported.trim().to_string(), local.trim().to_string()),
            None => (item.to_string(), item.to_string()),
        })
        .collect()
}

/// Find the import statement that binds `local` in `source`.
pub fn find_import(source: &str, local: &str) -> Option<ImportedName> {
    for caps in IMPORT.captures_iter(source) {
        let (Some(clause), Some(spec)) = (caps.name("clause"), caps.name("spec")) else {
            continue;
        };
        let clause = clause.as_str();
        let specifier = spec.as_str().to_string();

        if let Some((open, close)) = clause.find('{').zip(clause.rfind('}')) {
            if open < close {
                for (imported, name) in parse_name_list(&clause[open + 1..close]) {
                    if name == local {
                        return Some(ImportedName {
                            specifier,
                            imported,
                        });
                    }
                }
            }
        }

        if let Some(ns) = NAMESPACE_CLAUSE.captures(clause).and_then(|c| c.name("ns")) {
            if ns.as_str() == local {
                return Some(ImportedName {
                    specifier,
                    imported: "*".to_string(),
                });
            }
        }

        let default = clause
            .split(['{', '*'])
            .next()
            .unwrap_or("")
            .trim()
            .trim_end_matches(',')
            .trim();
        if default == local {
            return Some(ImportedName {
                specifier,
                imported: "default".to_string(),
            });
        }
    }
    None
}

/// Identifier immediately before `.` preceding the word at `position`, if
/// any: the `ns` in `ns.Word`.
fn qualifier_at(source: &str, position: Position) -> Option<&str> {
    let offset = crate::util::position_to_offset(source, position);
    let line_start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let before = &source[line_start..offset];
    let word_start = before
        .rfind(|c| !is_ident_char(c))
        .map(|i| i + 1)
        .unwrap_or(0);
    let head = before[..word_start].strip_suffix('.')?;
    let qual_start = head
        .rfind(|c| !is_ident_char(c))
        .map(|i| i + 1)
        .unwrap_or(0);
    let qualifier = &head[qual_start..];
    (!qualifier.is_empty()).then_some(qualifier)
}

/// `name`, `@scope/name` plus an optional subpath.
fn split_bare_specifier(specifier: &str) -> (String, Option<String>) {
    let mut parts = specifier.splitn(3, '/');
    let first = parts.next().unwrap_or("");
    if first.starts_with('@') {
        let second = parts.next().unwrap_or("");
        let rest = parts.next().map(str::to_string);
        (format!("{first}/{second}"), rest)
    } else {
        let rest: Vec<&str> = parts.collect();
        let subpath = (!rest.is_empty()).then(|| rest.join("/"));
        (first.to_string(), subpath)
    }
}

fn parent_dir(uri: &Url) -> Option<Url> {
    let dir = as_directory(uri);
    let parent = dir.join("..").ok()?;
    (parent != dir).then_some(parent)
}

/// Resolves the target of "go to implementation" by following imports into
/// the imported module, through `node_modules` and re-export chains.
/// Plain definitions additionally fall back to declarations in the same
/// document.
pub struct ImportDefinitionService {
    documents: Arc<dyn DocumentService>,
    fs: Arc<dyn FileSystem>,
}

impl ImportDefinitionService {
    pub fn new(documents: Arc<dyn DocumentService>, fs: Arc<dyn FileSystem>) -> Self {
        Self { documents, fs }
    }

    async fn is_file(&self, uri: &Url) -> bool {
        matches!(self.fs.stat(uri).await, Ok(FileType::File))
    }

    /// First existing module file for an extensionless base path.
    async fn module_file(&self, base: &Url) -> Option<Url> {
        let path = base.path().trim_end_matches('/');
        let stripped = path
            .strip_suffix(".js")
            .or_else(|| path.strip_suffix(".mjs"))
            .unwrap_or(path);
        if MODULE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) && self.is_file(base).await {
            return Some(base.clone());
        }

        let mut candidate = base.clone();
        for ext in MODULE_EXTENSIONS {
            candidate.set_path(&format!("{stripped}{ext}"));
            if self.is_file(&candidate).await {
                return Some(candidate);
            }
        }
        let dir = as_directory(base);
        for ext in MODULE_EXTENSIONS {
            let index = child_uri(&dir, &format!("index{ext}"), false);
            if self.is_file(&index).await {
                return Some(index);
            }
        }
        None
    }

    async fn package_entry(&self, package_dir: &Url) -> Option<Url> {
        let manifest_uri = child_uri(package_dir, MANIFEST_FILE, false);
        if self.is_file(&manifest_uri).await {
            if let Ok(text) = self.documents.open(&manifest_uri).await {
                match Manifest::parse(&manifest_uri, &text) {
                    Ok(manifest) => {
                        if let Some(types) = manifest.types_entry() {
                            let entry = join_fragment(package_dir, types);
                            if let Some(found) = self.module_file(&entry).await {
                                return Some(found);
                            }
                        }
                    }
                    Err(e) => debug!("Ignoring unreadable manifest: {}", e),
                }
            }
        }
        let dir_base = join_fragment(package_dir, "index");
        self.module_file(&dir_base).await
    }

    async fn resolve_specifier(&self, from: &Url, specifier: &str) -> Option<Url> {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = from.join(specifier).ok()?;
            return self.module_file(&base).await;
        }

        let (package, subpath) = split_bare_specifier(specifier);
        // containing directory first, then each ancestor
        let mut dir = from.join(".").ok();
        while let Some(current) = dir {
            let package_dir = as_directory(&join_fragment(
                &current,
                &format!("node_modules/{package}"),
            ));
            if self.fs.exists(&package_dir).await {
                trace!("Found {} at {}", package, package_dir);
                return match &subpath {
                    Some(sub) => self.module_file(&join_fragment(&package_dir, sub)).await,
                    None => self.package_entry(&package_dir).await,
                };
            }
            dir = parent_dir(&current);
        }
        None
    }

    /// Declaration of the export `name` of `module`, following re-exports.
    async fn find_export(&self, module: Url, name: &str) -> Option<DefinitionTarget> {
        let mut visited = HashSet::new();
        let mut queue = vec![(module, name.to_string(), 0usize)];

        while let Some((module, name, depth)) = queue.pop() {
            if depth > MAX_REEXPORT_DEPTH || !visited.insert((module.clone(), name.clone())) {
                continue;
            }
            let Ok(text) = self.documents.open(&module).await else {
                continue;
            };
            let outline = scan_declarations(&text);

            let local = if name == "default" {
                default_export(&text, &outline)
            } else {
                Some(name.clone())
            };
            if let Some(local) = local {
                if let Some(symbol) = outline.iter().find(|s| s.name == local) {
                    return Some(DefinitionTarget::new(module, symbol.selection_range));
                }
            }

            // Candidates are pushed in reverse so the first statement is tried first.
            let mut next = Vec::new();
            for caps in EXPORT_NAMES.captures_iter(&text) {
                let Some(list) = caps.name("names") else {
                    continue;
                };
                for (exported_from, exported_as) in parse_name_list(list.as_str()) {
                    if exported_as != name {
                        continue;
                    }
                    match caps.name("spec") {
                        Some(spec) => {
                            if let Some(target) =
                                self.resolve_specifier(&module, spec.as_str()).await
                            {
                                next.push((target, exported_from.clone(), depth + 1));
                            }
                        }
                        None => next.push((module.clone(), exported_from.clone(), depth + 1)),
                    }
                }
            }
            for caps in EXPORT_STAR.captures_iter(&text) {
                let Some(spec) = caps.name("spec") else {
                    continue;
                };
                if let Some(target) = self.resolve_specifier(&module, spec.as_str()).await {
                    match caps.name("ns") {
                        Some(ns) if ns.as_str() == name => {
                            return Some(DefinitionTarget::new(target, Range::default()));
                        }
                        Some(_) => {}
                        None if name != "default" => next.push((target, name.clone(), depth + 1)),
                        None => {}
                    }
                }
            }
            queue.extend(next.into_iter().rev());
        }
        None
    }

    async fn imported_target(&self, uri: &Url, position: Position) -> ApiResult<Option<DefinitionTarget>> {
        let text = self.documents.open(uri).await?;
        let Some(word) = word_at(&text, position) else {
            return Ok(None);
        };

        let (import, exported) = match qualifier_at(&text, position)
            .and_then(|ns| find_import(&text, ns))
            .filter(|import| import.imported == "*")
        {
            Some(import) => (import, word.to_string()),
            None => match find_import(&text, word) {
                Some(import) => {
                    let exported = import.imported.clone();
                    (import, exported)
                }
                None => return Ok(None),
            },
        };

        let Some(module) = self.resolve_specifier(uri, &import.specifier).await else {
            debug!("Cannot resolve module '{}' from {}", import.specifier, uri);
            return Ok(None);
        };
        if exported == "*" {
            return Ok(Some(DefinitionTarget::new(module, Range::default())));
        }
        Ok(self.find_export(module, &exported).await)
    }
}

/// Local name bound by `export default` in a module.
fn default_export(text: &str, outline: &[DocumentSymbol]) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let declared = outline.iter().find(|symbol| {
        lines
            .get(symbol.range.start.line as usize)
            .is_some_and(|line| line.trim_start().starts_with("export default"))
    });
    if let Some(symbol) = declared {
        return Some(symbol.name.clone());
    }
    EXPORT_DEFAULT_IDENT
        .captures(text)
        .and_then(|caps| caps.name("name"))
        .map(|m| m.as_str().to_string())
}

fn find_in_outline(symbols: &[DocumentSymbol], name: &str) -> Option<Range> {
    symbols.iter().find_map(|symbol| {
        if symbol.name == name {
            Some(symbol.selection_range)
        } else {
            find_in_outline(&symbol.children, name)
        }
    })
}

#[async_trait]
impl DefinitionService for ImportDefinitionService {
    async fn implementations(
        &self,
        uri: &Url,
        position: Position,
    ) -> ApiResult<Option<Vec<DefinitionTarget>>> {
        Ok(self
            .imported_target(uri, position)
            .await?
            .map(|target| vec![target]))
    }

    async fn definitions(
        &self,
        uri: &Url,
        position: Position,
    ) -> ApiResult<Option<Vec<DefinitionTarget>>> {
        if let Some(target) = self.imported_target(uri, position).await? {
            return Ok(Some(vec![target]));
        }
        let text = self.documents.open(uri).await?;
        let Some(word) = word_at(&text, position) else {
            return Ok(None);
        };
        let outline = scan_declarations(&text);
        Ok(find_in_outline(&outline, word)
            .map(|range| vec![DefinitionTarget::new(uri.clone(), range)]))
    }
}
