//! Per-package symbol index.
//!
//! Layout: `package → file stem → symbol path → DeclarationEntry`. The stem
//! level partitions entries by originating file so one file can be replaced
//! without touching the rest of the package.
//!
//! Every package carries a generation. A full rebuild starts a new
//! generation, and writes tagged with an older one are dropped, so a
//! superseded rebuild that is still running cannot repopulate a package
//! after a newer rebuild cleared it.

mod build;

pub use build::{BuildReport, IndexBuilder};

use crate::extract::FileDeclarations;
use dashmap::DashMap;
use indexmap::IndexMap;
use pkgnav_api::{DeclarationEntry, SymbolLocation, Url};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

pub type Generation = u64;

type SymbolTable = IndexMap<String, DeclarationEntry>;

#[derive(Debug, Default)]
struct PackageSlot {
    generation: Generation,
    files: HashMap<String, SymbolTable>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub packages: usize,
    pub stems: usize,
    pub symbols: usize,
    pub locations: usize,
}

/// One row of [`PackageIndex::entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub stem: String,
    pub symbol_path: String,
    pub entry: DeclarationEntry,
}

#[derive(Debug, Default)]
pub struct PackageIndex {
    packages: DashMap<String, PackageSlot>,
    next_generation: AtomicU64,
}

impl PackageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) -> Generation {
        self.next_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Remove every entry of `package`. Idempotent.
    pub fn clear(&self, package: &str) {
        if let Some(mut slot) = self.packages.get_mut(package) {
            slot.files.clear();
            slot.generation = self.bump();
        }
    }

    /// Clear `package` and open a new generation for a full rebuild.
    pub fn begin_rebuild(&self, package: &str) -> Generation {
        let generation = self.bump();
        let mut slot = self.packages.entry(package.to_string()).or_default();
        slot.files.clear();
        slot.generation = generation;
        generation
    }

    pub fn generation(&self, package: &str) -> Option<Generation> {
        self.packages.get(package).map(|slot| slot.generation)
    }

    pub fn is_current(&self, package: &str, generation: Generation) -> bool {
        self.generation(package) == Some(generation)
    }

    /// Add one file's declarations under `generation`. Returns `false` and
    /// writes nothing when a newer rebuild has started since.
    pub fn insert_file(
        &self,
        package: &str,
        generation: Generation,
        declarations: &FileDeclarations,
    ) -> bool {
        let Some(mut slot) = self.packages.get_mut(package) else {
            debug!("Dropping declarations of {}: {} was cleared", declarations.uri, package);
            return false;
        };
        if slot.generation != generation {
            debug!(
                "Dropping stale declarations of {} (generation {} < {})",
                declarations.uri, generation, slot.generation
            );
            return false;
        }
        let bucket = slot.files.entry(declarations.stem.clone()).or_default();
        insert_declarations(bucket, declarations);
        true
    }

    /// Replace whatever `declarations.uri` contributed before with the new
    /// declarations. Other files sharing the stem keep their entries.
    pub fn replace_file(&self, package: &str, declarations: &FileDeclarations) {
        let mut slot = self.packages.entry(package.to_string()).or_default();
        let bucket = slot.files.entry(declarations.stem.clone()).or_default();
        remove_uri(bucket, &declarations.uri);
        insert_declarations(bucket, declarations);
        if bucket.is_empty() {
            slot.files.remove(&declarations.stem);
        }
    }

    /// Drop everything `uri` contributed, e.g. after the file was deleted.
    pub fn remove_file(&self, package: &str, stem: &str, uri: &Url) {
        if let Some(mut slot) = self.packages.get_mut(package) {
            if let Some(bucket) = slot.files.get_mut(stem) {
                remove_uri(bucket, uri);
                if bucket.is_empty() {
                    slot.files.remove(stem);
                }
            }
        }
    }

    pub fn lookup(&self, package: &str, stem: &str, symbol_path: &str) -> Option<DeclarationEntry> {
        let slot = self.packages.get(package)?;
        slot.files.get(stem)?.get(symbol_path).cloned()
    }

    /// Forget packages whose names are not in `keep`.
    pub fn retain_packages(&self, keep: &[&str]) {
        self.packages.retain(|name, _| keep.contains(&name.as_str()));
    }

    pub fn package_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.packages.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// All rows of a package, sorted by stem then by discovery order.
    pub fn entries(&self, package: &str) -> Vec<IndexRow> {
        let Some(slot) = self.packages.get(package) else {
            return Vec::new();
        };
        let files = &slot.files;
        let mut stems: Vec<&String> = files.keys().collect();
        stems.sort();
        stems
            .into_iter()
            .flat_map(|stem| {
                files[stem].iter().map(move |(path, entry)| IndexRow {
                    stem: stem.clone(),
                    symbol_path: path.clone(),
                    entry: entry.clone(),
                })
            })
            .collect()
    }

    pub fn package_stats(&self, package: &str) -> IndexStats {
        let mut stats = IndexStats::default();
        if let Some(slot) = self.packages.get(package) {
            stats.packages = 1;
            accumulate(&slot, &mut stats);
        }
        stats
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats::default();
        for slot in self.packages.iter() {
            stats.packages += 1;
            accumulate(&slot, &mut stats);
        }
        stats
    }
}

fn accumulate(slot: &PackageSlot, stats: &mut IndexStats) {
    stats.stems += slot.files.len();
    for table in slot.files.values() {
        stats.symbols += table.len();
        stats.locations += table.values().map(DeclarationEntry::len).sum::<usize>();
    }
}

fn insert_declarations(bucket: &mut SymbolTable, declarations: &FileDeclarations) {
    for (path, range) in &declarations.declarations {
        let location = SymbolLocation::new(declarations.uri.clone(), *range);
        match bucket.get_mut(path) {
            Some(entry) => entry.push(location),
            None => {
                bucket.insert(path.clone(), DeclarationEntry::Single(location));
            }
        }
    }
}

fn remove_uri(bucket: &mut SymbolTable, uri: &Url) {
    *bucket = std::mem::take(bucket)
        .into_iter()
        .filter_map(|(path, entry)| entry.without_uri(uri).map(|rest| (path, rest)))
        .collect();
}
