pub mod backup;
pub mod import;
pub mod screenshots;

pub use backup::*;
pub use import::*;
pub use screenshots::*;
