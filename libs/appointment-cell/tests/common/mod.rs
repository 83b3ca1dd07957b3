#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use appointment_cell::{
    BookAppointmentRequest, BookingLedger, ConsultationType, InMemoryAppointmentStore, LedgerSettings,
};
use notification_cell::{InMemoryNotifier, Notification, NotificationCategory, NotificationError, Notifier};
use provider_cell::{
    ConnectionGate, ConnectionStatus, ConnectionStore, InMemoryConnectionStore, InMemoryProviderStore,
    Provider, ProviderConnection, ProviderDirectory, ProviderKind,
};
use schedule_cell::{
    AvailabilityResolver, CalendarKey, InMemoryTemplateStore, ScheduleTemplate, Session, Slot, SlotKind,
    TemplateStore,
};

pub const MEETING_BASE: &str = "https://meet.example.org";

/// Notifier whose every delivery fails.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _: &str, _: &str, _: NotificationCategory) -> Result<Notification, NotificationError> {
        Err(NotificationError::EmptyResponse)
    }

    async fn list_for_user(&self, _: &str, _: bool) -> Result<Vec<Notification>, NotificationError> {
        Ok(Vec::new())
    }

    async fn mark_read(&self, _: &str, _: &[Uuid]) -> Result<usize, NotificationError> {
        Ok(0)
    }
}

/// A doctor and a hospital sharing one Monday template:
/// `m1` 09:00, `m2` 09:10, break `b1` 09:20, emergency `e1` 09:30, and an
/// unfinalized evening session holding `v1` 18:00.
pub struct World {
    pub doctor: Provider,
    pub hospital: Provider,
    pub providers: Arc<InMemoryProviderStore>,
    pub connections: Arc<InMemoryConnectionStore>,
    pub templates: Arc<InMemoryTemplateStore>,
    pub appointments: Arc<InMemoryAppointmentStore>,
    pub notifier: Arc<InMemoryNotifier>,
    pub ledger: BookingLedger,
    pub resolver: AvailabilityResolver,
}

pub fn provider(kind: ProviderKind, code: &str) -> Provider {
    Provider {
        id: Uuid::new_v4(),
        owner_user_id: Uuid::new_v4().to_string(),
        unique_code: code.to_string(),
        kind,
        display_name: None,
    }
}

pub fn slot(id: &str, range: &str, kind: SlotKind) -> Slot {
    Slot {
        slot_id: id.to_string(),
        display_time_range: range.to_string(),
        kind,
    }
}

/// 2024-06-10 is a Monday.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

impl World {
    pub async fn new() -> Self {
        Self::with_notifier(None).await
    }

    pub async fn with_notifier(notifier: Option<Arc<dyn Notifier>>) -> Self {
        let doctor = provider(ProviderKind::Doctor, "DOC-001");
        let hospital = provider(ProviderKind::Hospital, "HOS-001");

        let providers = Arc::new(InMemoryProviderStore::new());
        providers.insert(doctor.clone()).await;
        providers.insert(hospital.clone()).await;

        let connections = Arc::new(InMemoryConnectionStore::new());
        let mut connection = ProviderConnection::new_pending(doctor.id, hospital.id, ProviderKind::Hospital);
        connection.status = ConnectionStatus::Active;
        connections.insert(connection).await.unwrap();

        let templates = Arc::new(InMemoryTemplateStore::new());
        templates
            .upsert(ScheduleTemplate::new(
                doctor.id,
                hospital.id,
                CalendarKey::Weekday(0),
                vec![
                    Session {
                        label: "Morning".to_string(),
                        is_finalized: true,
                        slots: vec![
                            slot("m1", "09:00 - 09:10", SlotKind::Normal),
                            slot("m2", "09:10 - 09:20", SlotKind::Normal),
                            slot("b1", "09:20 - 09:30", SlotKind::Break),
                            slot("e1", "09:30 - 09:40", SlotKind::Emergency),
                        ],
                    },
                    Session {
                        label: "Evening".to_string(),
                        is_finalized: false,
                        slots: vec![slot("v1", "18:00 - 18:10", SlotKind::Normal)],
                    },
                ],
            ))
            .await
            .unwrap();

        let appointments = Arc::new(InMemoryAppointmentStore::new());
        let inbox = Arc::new(InMemoryNotifier::new());
        let notifier: Arc<dyn Notifier> = notifier.unwrap_or_else(|| inbox.clone() as Arc<dyn Notifier>);

        let directory = ProviderDirectory::with_store(providers.clone());
        let ledger = BookingLedger::with_stores(
            ConnectionGate::with_stores(directory.clone(), connections.clone(), notifier.clone()),
            AvailabilityResolver::with_stores(directory.clone(), templates.clone(), appointments.clone(), 7),
            appointments.clone(),
            notifier,
            LedgerSettings {
                meeting_base_url: MEETING_BASE.to_string(),
                max_emergency_per_slot: 2,
            },
        );

        Self {
            resolver: AvailabilityResolver::with_stores(directory, templates.clone(), appointments.clone(), 7),
            doctor,
            hospital,
            providers,
            connections,
            templates,
            appointments,
            notifier: inbox,
            ledger,
        }
    }

    pub fn request(&self, time_slot: &str) -> BookAppointmentRequest {
        BookAppointmentRequest {
            doctor_id: self.doctor.unique_code.clone(),
            hospital_id: self.hospital.unique_code.clone(),
            date: monday(),
            time_slot: time_slot.to_string(),
            consultation_type: ConsultationType::Online,
            is_emergency: false,
            symptoms: Some("headache".to_string()),
        }
    }

    pub fn emergency(&self, time_slot: &str) -> BookAppointmentRequest {
        BookAppointmentRequest {
            is_emergency: true,
            ..self.request(time_slot)
        }
    }
}

pub async fn wait_for_notifications(notifier: &InMemoryNotifier, count: usize) -> Vec<Notification> {
    for _ in 0..50 {
        let sent = notifier.sent().await;
        if sent.len() >= count {
            return sent;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {} notifications", count);
}
