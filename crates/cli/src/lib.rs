mod console;
mod index;
mod resolve;
mod watch;

use clap::{Parser, Subcommand};
use console::ConsolePresenter;
use pkgnav_core::config::Settings;
use pkgnav_core::host::{
    DocumentStore, ImportDefinitionService, LocalFileSystem, ScannerSymbolService,
};
use pkgnav_core::{HostServices, PackageNavigator};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "pkgnav",
    version,
    about = "Jump from imported package symbols to their local sources",
    long_about = "pkgnav indexes TypeScript packages that are checked out locally and resolves \
                  symbols imported from their published builds back to the declarations in \
                  the local source tree."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Language Server Protocol (LSP) server
    Lsp,
    /// Index the configured packages and print a summary
    Index {
        /// Settings file holding the `packagenavigator` section
        #[arg(short, long, value_name = "FILE", default_value = "pkgnav.json")]
        config: PathBuf,
        /// Also list every indexed symbol
        #[arg(long)]
        entries: bool,
    },
    /// Resolve the symbol at a position to its local declaration
    #[command(
        long_about = "Indexes the configured packages, then resolves the symbol at FILE:LINE:COLUMN \
                      (1-based) the way the editor command would and prints the result."
    )]
    Resolve {
        #[arg(short, long, value_name = "FILE", default_value = "pkgnav.json")]
        config: PathBuf,
        /// Consumer workspace folder, used for the version check
        #[arg(short, long, value_name = "DIR")]
        workspace: Option<PathBuf>,
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(value_name = "LINE")]
        line: u32,
        #[arg(value_name = "COLUMN")]
        column: u32,
    },
    /// Index, then keep the index current as package sources change
    Watch {
        #[arg(short, long, value_name = "FILE", default_value = "pkgnav.json")]
        config: PathBuf,
    },
}

pub fn load_settings(path: &Path) -> Result<Settings, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(Settings::from_json_str(&text)?)
}

/// Navigator over the local disk, presenting to the terminal.
pub fn local_navigator(settings: Settings) -> PackageNavigator {
    let documents = Arc::new(DocumentStore::new());
    let fs = Arc::new(LocalFileSystem::new());
    let services = HostServices {
        symbols: Arc::new(ScannerSymbolService::new(documents.clone())),
        definitions: Arc::new(ImportDefinitionService::new(documents.clone(), fs.clone())),
        fs,
        documents,
        presenter: Arc::new(ConsolePresenter),
    };
    PackageNavigator::new(services, settings)
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (component, to_stderr) = match &cli.command {
        Commands::Lsp => ("lsp", false),
        _ => ("cli", true),
    };
    let _guard = pkgnav_core::logging::init_logging(component, to_stderr);

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Lsp => rt.block_on(pkgnav_lsp::run_server()),
        Commands::Index { config, entries } => rt.block_on(index::run(config, entries)),
        Commands::Resolve {
            config,
            workspace,
            file,
            line,
            column,
        } => rt.block_on(resolve::run(config, workspace, file, line, column)),
        Commands::Watch { config } => rt.block_on(watch::run(config)),
    }
}
