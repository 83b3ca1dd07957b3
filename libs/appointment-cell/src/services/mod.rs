pub mod ledger;
pub mod lifecycle;

pub use ledger::{BookingLedger, LedgerSettings};
pub use lifecycle::AppointmentLifecycleService;
