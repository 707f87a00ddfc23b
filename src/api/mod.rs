pub mod client;
pub mod error;
pub mod mapper;
pub mod memory;
pub mod supabase;

pub use client::{AuthEvent, IdentityProvider, RemoteStore, Session, SettingsRow, WeekRow};
pub use error::ApiError;
pub use memory::InMemoryBackend;
pub use supabase::SupabaseClient;
