// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// What a validated transition asks the ledger to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Apply,
    /// Re-approving an approved appointment changes nothing.
    AlreadyApplied,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<TransitionOutcome, AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if new_status == AppointmentStatus::Pending {
            return Err(AppointmentError::ValidationError(
                "status must be one of approved, rejected, completed, cancelled".to_string(),
            ));
        }

        if current_status == AppointmentStatus::Approved && new_status == AppointmentStatus::Approved {
            return Ok(TransitionOutcome::AlreadyApplied);
        }

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(TransitionOutcome::Apply)
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Approved,
                AppointmentStatus::Rejected,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Approved => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Rejected
            | AppointmentStatus::Completed
            | AppointmentStatus::Cancelled => vec![],
        }
    }
}
