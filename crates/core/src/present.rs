use crate::config::SETTINGS_SECTION;
use crate::error::Result;
use crate::resolve::Outcome;
use pkgnav_api::{DeclarationEntry, Presenter};
use std::sync::Arc;
use tracing::debug;

/// Action offered when a configured root is missing.
pub const CONFIGURE_ACTION: &str = "Configure";

pub fn missing_root_message(package: &str, local_path: &str) -> String {
    format!("Path for package {package} doesn't exist. Configured path is {local_path}")
}

/// Turns resolution outcomes into presenter calls.
#[derive(Clone)]
pub struct NavigationPresenter {
    presenter: Arc<dyn Presenter>,
}

impl NavigationPresenter {
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self { presenter }
    }

    pub async fn present(&self, outcome: &Outcome) -> Result<()> {
        match outcome {
            Outcome::Navigate { entry, .. } => match entry {
                DeclarationEntry::Single(location) => {
                    self.presenter.show_document(location).await?;
                }
                DeclarationEntry::Multiple(locations) => {
                    if let Some(first) = locations.first() {
                        self.presenter.show_locations(first, locations).await?;
                    }
                }
            },
            Outcome::Fallback(locations) => {
                if let Some(first) = locations.first() {
                    self.presenter.show_locations(first, locations).await?;
                }
            }
            Outcome::MissingRoot {
                package,
                local_path,
            } => {
                let message = missing_root_message(package, local_path);
                let choice = self
                    .presenter
                    .show_error(&message, &[CONFIGURE_ACTION])
                    .await?;
                if choice.as_deref() == Some(CONFIGURE_ACTION) {
                    self.presenter.open_settings(SETTINGS_SECTION).await?;
                }
            }
            Outcome::NoMatch(reason) => debug!("Nothing to navigate to: {}", reason),
        }
        Ok(())
    }
}
