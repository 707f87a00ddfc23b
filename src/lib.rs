pub mod api;
pub mod app;
pub mod clock;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod session;
pub mod store;
pub mod sync;
pub mod week;

pub use app::JournalApp;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::JournalConfig;
pub use error::{JournalError, Result};
pub use store::{EntryStore, WeekSummary};
pub use week::WeekKey;
