use pkgnav_core::{BuildReport, PackageNavigator};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_lsp::Client;
use tower_lsp::lsp_types::MessageType;

/// Wait for scheduled rebuilds in the background and report them to the
/// client log.
pub fn report_rebuilds(
    client: Client,
    navigator: Arc<PackageNavigator>,
    handles: Vec<JoinHandle<Option<BuildReport>>>,
) {
    if handles.is_empty() {
        return;
    }
    tokio::spawn(async move {
        for report in pkgnav_core::join_all(handles).await.into_iter().flatten() {
            let message = if report.superseded {
                format!("Indexing of {} was superseded", report.package)
            } else {
                format!(
                    "Indexed {}: {} files, {} declarations in {:?} ({} failed)",
                    report.package,
                    report.files_indexed,
                    report.declarations,
                    report.duration,
                    report.files_failed
                )
            };
            client.log_message(MessageType::INFO, message).await;
        }
        let stats = navigator.index().stats();
        client
            .log_message(
                MessageType::INFO,
                format!(
                    "Package index: {} packages, {} symbols, {} locations",
                    stats.packages, stats.symbols, stats.locations
                ),
            )
            .await;
    });
}
