//! Per-package serialization of index rebuilds.

use crate::config::ConfiguredPackage;
use crate::extract::FileDeclarations;
use crate::index::{BuildReport, IndexBuilder};
use dashmap::DashMap;
use pkgnav_api::Url;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Default)]
struct Lane {
    /// Held for the duration of any rebuild of this package.
    running: Arc<Mutex<()>>,
    /// Token of the most recently scheduled full rebuild.
    latest: Option<CancellationToken>,
}

/// Runs rebuilds in the background, one at a time per package. A new full
/// rebuild request cancels the one scheduled before it.
pub struct RebuildQueue {
    builder: IndexBuilder,
    lanes: DashMap<String, Lane>,
    shutdown: CancellationToken,
}

impl RebuildQueue {
    pub fn new(builder: IndexBuilder) -> Self {
        Self {
            builder,
            lanes: DashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn builder(&self) -> &IndexBuilder {
        &self.builder
    }

    /// Returns `None` from the task when the request was superseded before
    /// it started.
    pub fn schedule_full(&self, package: ConfiguredPackage) -> JoinHandle<Option<BuildReport>> {
        let token = self.shutdown.child_token();
        let running = {
            let mut lane = self.lanes.entry(package.name.clone()).or_default();
            if let Some(previous) = lane.latest.replace(token.clone()) {
                previous.cancel();
            }
            lane.running.clone()
        };
        let builder = self.builder.clone();

        tokio::spawn(async move {
            let _guard = running.lock().await;
            if token.is_cancelled() {
                debug!("Full rebuild of {} superseded before start", package.name);
                return None;
            }
            Some(builder.rebuild_all(&package, &token).await)
        })
    }

    pub fn schedule_file(
        &self,
        package: ConfiguredPackage,
        uri: Url,
    ) -> JoinHandle<Option<FileDeclarations>> {
        let running = self
            .lanes
            .entry(package.name.clone())
            .or_default()
            .running
            .clone();
        let builder = self.builder.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let _guard = running.lock().await;
            if shutdown.is_cancelled() {
                return None;
            }
            match builder.rebuild_file(&package, &uri).await {
                Ok(declarations) => declarations,
                Err(e) => {
                    warn!("Failed to re-index {} in {}: {}", uri, package.name, e);
                    None
                }
            }
        })
    }

    /// Cancel any pending full rebuild of `package` and forget its lane.
    pub fn cancel(&self, package: &str) {
        if let Some((_, lane)) = self.lanes.remove(package) {
            if let Some(token) = lane.latest {
                token.cancel();
            }
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for RebuildQueue {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
