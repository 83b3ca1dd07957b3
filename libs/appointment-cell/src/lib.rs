pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

pub use models::*;
pub use services::{AppointmentLifecycleService, BookingLedger, LedgerSettings};
pub use store::{AppointmentStore, InMemoryAppointmentStore};
