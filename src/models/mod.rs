pub mod document;
pub mod entry;
pub mod settings;
pub mod trade;

pub use document::*;
pub use entry::*;
pub use settings::*;
pub use trade::*;
