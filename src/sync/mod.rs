pub mod debounce;
pub mod scheduler;

pub use debounce::{schedule, DebounceHandle, Debouncer};
pub use scheduler::{Hydration, SyncLayer, DEFAULT_DEBOUNCE};
