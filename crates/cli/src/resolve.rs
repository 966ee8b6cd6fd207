use crate::{load_settings, local_navigator};
use pkgnav_api::{Position, Url};
use pkgnav_core::{Outcome, join_all};
use std::path::PathBuf;
use tokio::task::JoinHandle;

fn file_url(path: &PathBuf) -> Result<Url, Box<dyn std::error::Error>> {
    let absolute = std::fs::canonicalize(path)
        .map_err(|e| format!("cannot resolve {}: {}", path.display(), e))?;
    Url::from_file_path(&absolute).map_err(|_| format!("not a file path: {}", absolute.display()).into())
}

/// Returns false when the check panicked or was cancelled.
async fn wait_for_version_check(check: Option<JoinHandle<()>>) -> bool {
    let Some(check) = check else {
        return true;
    };
    match check.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Version check failed: {}", e);
            false
        }
    }
}

pub async fn run(
    config: PathBuf,
    workspace: Option<PathBuf>,
    file: PathBuf,
    line: u32,
    column: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    if line == 0 || column == 0 {
        return Err("LINE and COLUMN are 1-based".into());
    }
    let navigator = local_navigator(load_settings(&config)?);
    if let Some(folder) = workspace {
        navigator.set_workspace_folders(vec![file_url(&folder)?]);
    }
    join_all(navigator.rebuild_all().await).await;

    let uri = file_url(&file)?;
    let resolution = navigator
        .navigate(&uri, Position::new(line - 1, column - 1))
        .await?;
    wait_for_version_check(resolution.version_check).await;

    match resolution.outcome {
        Outcome::Navigate {
            package,
            symbol_path,
            ..
        } => tracing::info!("Resolved {} in {}", symbol_path, package),
        Outcome::Fallback(_) => tracing::info!("Resolved through plain definitions"),
        Outcome::MissingRoot { .. } => return Err("package root is missing".into()),
        Outcome::NoMatch(reason) => println!("No local declaration: {reason}"),
    }
    Ok(())
}
