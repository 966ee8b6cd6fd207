pub mod config;
pub mod error;
pub mod extract;
pub mod host;
pub mod index;
pub mod logging;
pub mod navigator;
pub mod present;
pub mod queue;
pub mod resolve;
pub mod util;
pub mod version;
pub mod walk;

pub use config::{ConfigStore, ConfiguredPackage, PackageSetting, Settings};
pub use error::{PkgNavError, Result};
pub use index::{BuildReport, IndexBuilder, PackageIndex};
pub use navigator::{HostServices, PackageNavigator, join_all};
pub use resolve::{NoMatch, Outcome, Resolution};
