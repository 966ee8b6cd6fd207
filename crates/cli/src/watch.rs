use crate::{load_settings, local_navigator};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use pkgnav_api::Url;
use pkgnav_core::join_all;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEBOUNCE: Duration = Duration::from_millis(500);

struct FsWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl FsWatcher {
    fn new(roots: &[PathBuf]) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        for root in roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }
        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    async fn next_event(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await? {
                Ok(event) => return Some(event),
                Err(e) => warn!("Watch error: {}", e),
            }
        }
    }
}

/// TypeScript sources. `.d.ts` passes too and is filtered by the indexer.
fn is_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "ts" || ext == "tsx")
}

pub async fn run(config: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let navigator = local_navigator(load_settings(&config)?);
    for report in join_all(navigator.rebuild_all().await).await.into_iter().flatten() {
        info!(
            "Indexed {}: {} files, {} declarations",
            report.package, report.files_indexed, report.declarations
        );
    }

    let roots: Vec<PathBuf> = navigator
        .settings()
        .packages
        .iter()
        .filter_map(|package| package.root.to_file_path().ok())
        .filter(|root| root.is_dir())
        .collect();
    if roots.is_empty() {
        return Err("no package root exists on disk".into());
    }
    let mut watcher = FsWatcher::new(&roots)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    for root in &roots {
        info!("Started watching {}", root.display());
    }
    let mut pending: Vec<Event> = Vec::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = watcher.next_event() => {
                match event {
                    Some(event) => pending.push(event),
                    None => break,
                }
            }
            _ = tokio::time::sleep(DEBOUNCE), if !pending.is_empty() => {
                let paths: HashSet<PathBuf> = pending
                    .drain(..)
                    .flat_map(|event| event.paths)
                    .filter(|path| is_source(path))
                    .collect();
                if paths.is_empty() {
                    continue;
                }
                info!("Detected changes in {} files. Updating...", paths.len());
                for path in paths {
                    let Ok(uri) = Url::from_file_path(&path) else {
                        continue;
                    };
                    if path.exists() {
                        for file in join_all(navigator.file_saved(&uri).await).await.into_iter().flatten() {
                            info!("Re-indexed {}: {} declarations", uri, file.declarations.len());
                        }
                    } else {
                        navigator.file_deleted(&uri);
                        info!("Forgot {}", uri);
                    }
                }
            }
        }
    }

    navigator.shutdown();
    info!("File watcher stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_typescript_sources_are_relevant() {
        assert!(is_source(Path::new("/pkgs/foo/src/Widget.ts")));
        assert!(is_source(Path::new("/pkgs/foo/src/Widget.d.ts")));
        assert!(is_source(Path::new("/pkgs/foo/src/App.tsx")));
        assert!(!is_source(Path::new("/pkgs/foo/package.json")));
        assert!(!is_source(Path::new("/pkgs/foo/src")));
    }
}
