pub mod fs;
pub mod position;
pub mod symbol;

pub use fs::*;
pub use position::*;
pub use symbol::*;
