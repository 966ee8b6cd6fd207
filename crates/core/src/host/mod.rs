//! Host implementations backed by the local machine.
//!
//! Used by the language server and the CLI. Editors that bring their own
//! symbol and definition providers can swap any of these out.

mod documents;
mod fs;
mod imports;
mod scanner;

pub use documents::DocumentStore;
pub use fs::LocalFileSystem;
pub use imports::{ImportDefinitionService, ImportedName, find_import};
pub use scanner::{ScannerSymbolService, scan_declarations};
