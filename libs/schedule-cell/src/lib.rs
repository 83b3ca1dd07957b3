pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

pub use models::*;
pub use services::{AvailabilityResolver, TemplateService};
pub use store::{BookingLookup, InMemoryTemplateStore, TemplateStore};
