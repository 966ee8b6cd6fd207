use super::{Generation, PackageIndex};
use crate::config::ConfiguredPackage;
use crate::extract::{DeclarationExtractor, FileDeclarations, is_indexable, is_indexable_name};
use crate::walk::{Exclusions, PackageWalker};
use pkgnav_api::{FileSystem, Url};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of a full package rebuild.
#[derive(Debug, Default, Clone)]
pub struct BuildReport {
    pub package: String,
    pub generation: Generation,
    pub files_indexed: usize,
    pub files_failed: usize,
    pub declarations: usize,
    /// A newer rebuild took over before this one finished.
    pub superseded: bool,
    pub duration: Duration,
}

/// Populates a [`PackageIndex`] from package trees.
#[derive(Clone)]
pub struct IndexBuilder {
    index: Arc<PackageIndex>,
    extractor: DeclarationExtractor,
    fs: Arc<dyn FileSystem>,
}

impl IndexBuilder {
    pub fn new(
        index: Arc<PackageIndex>,
        extractor: DeclarationExtractor,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            index,
            extractor,
            fs,
        }
    }

    pub fn index(&self) -> &Arc<PackageIndex> {
        &self.index
    }

    /// Clear `package` and re-extract every indexable file below its root.
    ///
    /// Files are processed one after another in walk order. A file that
    /// fails to extract is logged and skipped. The rebuild stops early when
    /// `cancel` fires or when a newer generation has started.
    pub async fn rebuild_all(
        &self,
        package: &ConfiguredPackage,
        cancel: &CancellationToken,
    ) -> BuildReport {
        let start = Instant::now();
        let generation = self.index.begin_rebuild(&package.name);
        let mut report = BuildReport {
            package: package.name.clone(),
            generation,
            ..Default::default()
        };

        let mut walker = PackageWalker::new(self.fs.clone(), package.root.clone())
            .with_exclusions(Exclusions::new(&package.root, &package.exclude_paths));

        while let Some(file) = walker.next_file().await {
            if cancel.is_cancelled() || !self.index.is_current(&package.name, generation) {
                report.superseded = true;
                break;
            }
            if !is_indexable_name(&file.name) {
                continue;
            }
            match self.extractor.extract(&file.uri).await {
                Ok(declarations) => {
                    if !self.index.insert_file(&package.name, generation, &declarations) {
                        report.superseded = true;
                        break;
                    }
                    report.files_indexed += 1;
                    report.declarations += declarations.declarations.len();
                }
                Err(e) => {
                    warn!("Failed to extract declarations from {}: {}", file.uri, e);
                    report.files_failed += 1;
                }
            }
        }

        report.duration = start.elapsed();
        if report.superseded {
            debug!(
                "Rebuild of {} (generation {}) superseded after {} files",
                package.name, generation, report.files_indexed
            );
        } else {
            info!(
                "Indexed {}: {} files, {} declarations in {:?}",
                package.name, report.files_indexed, report.declarations, report.duration
            );
        }
        report
    }

    /// Re-extract a single saved file, replacing what it contributed before.
    /// Returns `Ok(None)` when the file is not indexable.
    pub async fn rebuild_file(
        &self,
        package: &ConfiguredPackage,
        uri: &Url,
    ) -> crate::Result<Option<FileDeclarations>> {
        if !is_indexable(uri) {
            return Ok(None);
        }
        if Exclusions::new(&package.root, &package.exclude_paths).matches(uri) {
            debug!("Saved file {} is excluded from {}", uri, package.name);
            return Ok(None);
        }
        let declarations = self.extractor.extract(uri).await?;
        self.index.replace_file(&package.name, &declarations);
        debug!(
            "Re-indexed {} for {}: {} declarations",
            uri,
            package.name,
            declarations.declarations.len()
        );
        Ok(Some(declarations))
    }

    /// Drop what a deleted file contributed.
    pub fn forget_file(&self, package: &ConfiguredPackage, uri: &Url) {
        let declarations = FileDeclarations::new(uri.clone(), Vec::new());
        self.index.remove_file(&package.name, &declarations.stem, uri);
    }
}
