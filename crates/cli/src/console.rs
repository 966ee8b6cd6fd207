use async_trait::async_trait;
use pkgnav_api::{ApiResult, Presenter, SymbolLocation};

/// `path:line:column`, 1-based, the way compilers print locations.
pub fn format_location(location: &SymbolLocation) -> String {
    let path = location
        .uri
        .to_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| location.uri.to_string());
    format!(
        "{}:{}:{}",
        path,
        location.range.start.line + 1,
        location.range.start.character + 1
    )
}

/// Prints to the terminal. Prompts are never answered.
pub struct ConsolePresenter;

#[async_trait]
impl Presenter for ConsolePresenter {
    async fn show_document(&self, location: &SymbolLocation) -> ApiResult<()> {
        println!("{}", format_location(location));
        Ok(())
    }

    async fn show_locations(
        &self,
        _anchor: &SymbolLocation,
        locations: &[SymbolLocation],
    ) -> ApiResult<()> {
        for location in locations {
            println!("{}", format_location(location));
        }
        Ok(())
    }

    async fn show_warning(&self, message: &str) -> ApiResult<()> {
        eprintln!("warning: {message}");
        Ok(())
    }

    async fn show_error(&self, message: &str, _actions: &[&str]) -> ApiResult<Option<String>> {
        eprintln!("error: {message}");
        Ok(None)
    }

    async fn open_settings(&self, section: &str) -> ApiResult<()> {
        eprintln!("hint: edit the `{section}` section of your settings file");
        Ok(())
    }
}
