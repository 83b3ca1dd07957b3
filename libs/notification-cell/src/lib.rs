pub mod handlers;
pub mod models;
pub mod notifier;
pub mod router;

pub use models::*;
pub use notifier::{dispatch, InMemoryNotifier, Notifier, SupabaseNotifier};
