pub mod error;
pub mod host;
pub mod models;

// Re-export commonly used types
pub use error::{ApiError, ApiResult};
pub use host::{DefinitionService, DocumentService, FileSystem, Presenter, SymbolService};
pub use models::*;
pub use url::Url;
