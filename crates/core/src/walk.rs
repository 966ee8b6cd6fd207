//! Pre-order traversal of a package tree through the host file system.

use crate::util::{child_uri, join_fragment};
use pkgnav_api::{DirEntry, FileSystem, FileType, Url};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A file reached by the walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    pub uri: Url,
    pub name: String,
}

/// Exclusion fragments resolved against a package root. A path is excluded
/// when it contains `root` joined with one of the fragments.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    paths: Vec<String>,
}

impl Exclusions {
    pub fn new<'a>(root: &Url, fragments: impl IntoIterator<Item = &'a String>) -> Self {
        Self {
            paths: fragments
                .into_iter()
                .map(|fragment| join_fragment(root, fragment).path().to_string())
                .collect(),
        }
    }

    pub fn matches(&self, uri: &Url) -> bool {
        let path = uri.path();
        self.paths.iter().any(|excluded| path.contains(excluded.as_str()))
    }
}

struct Frame {
    dir: Url,
    entries: std::vec::IntoIter<DirEntry>,
}

/// Depth-first, pre-order walk. Entries are visited in the order the file
/// system lists them and subdirectories are entered as they are met, one at
/// a time, so the visiting order is deterministic.
///
/// Excluded paths are filtered before they are stat'ed or listed, so an
/// excluded subtree is never entered.
pub struct PackageWalker {
    fs: Arc<dyn FileSystem>,
    start: Option<Url>,
    exclusions: Exclusions,
    stack: Vec<Frame>,
}

impl PackageWalker {
    pub fn new(fs: Arc<dyn FileSystem>, start: Url) -> Self {
        Self {
            fs,
            start: Some(start),
            exclusions: Exclusions::default(),
            stack: Vec::new(),
        }
    }

    pub fn with_exclusions(mut self, exclusions: Exclusions) -> Self {
        self.exclusions = exclusions;
        self
    }

    fn is_excluded(&self, uri: &Url) -> bool {
        self.exclusions.matches(uri)
    }

    pub async fn next_file(&mut self) -> Option<WalkedFile> {
        if let Some(start) = self.start.take() {
            if let Some(file) = self.enter_start(start).await {
                return Some(file);
            }
        }

        loop {
            let frame = self.stack.last_mut()?;
            let Some(entry) = frame.entries.next() else {
                self.stack.pop();
                continue;
            };
            match entry.file_type {
                FileType::File => {
                    let uri = child_uri(&frame.dir, &entry.name, false);
                    if self.is_excluded(&uri) {
                        trace!("Excluded {}", uri);
                        continue;
                    }
                    return Some(WalkedFile {
                        uri,
                        name: entry.name,
                    });
                }
                FileType::Directory => {
                    let uri = child_uri(&frame.dir, &entry.name, true);
                    if self.is_excluded(&uri) {
                        debug!("Skipping excluded directory {}", uri);
                        continue;
                    }
                    self.descend(uri).await;
                }
                FileType::Other => {}
            }
        }
    }

    async fn enter_start(&mut self, start: Url) -> Option<WalkedFile> {
        if self.is_excluded(&start) {
            return None;
        }
        match self.fs.stat(&start).await {
            Ok(FileType::File) => {
                let name = crate::util::file_name(&start).unwrap_or_default();
                Some(WalkedFile { uri: start, name })
            }
            Ok(FileType::Directory) => {
                self.descend(crate::util::as_directory(&start)).await;
                None
            }
            Ok(FileType::Other) => None,
            Err(e) => {
                warn!("Cannot stat {}: {}", start, e);
                None
            }
        }
    }

    async fn descend(&mut self, dir: Url) {
        match self.fs.read_directory(&dir).await {
            Ok(entries) => self.stack.push(Frame {
                dir,
                entries: entries.into_iter(),
            }),
            Err(e) => warn!("Cannot read directory {}: {}", dir, e),
        }
    }
}
