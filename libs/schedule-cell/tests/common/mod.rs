#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use notification_cell::InMemoryNotifier;
use provider_cell::{
    ConnectionGate, ConnectionStatus, ConnectionStore, InMemoryConnectionStore, InMemoryProviderStore,
    Provider, ProviderConnection, ProviderDirectory, ProviderKind,
};
use schedule_cell::{
    AvailabilityResolver, BookingLookup, InMemoryTemplateStore, ScheduleError, Session, Slot, SlotKind,
    TemplateService,
};

/// Active time slots handed to the resolver, settable per test.
#[derive(Default)]
pub struct StaticBookings {
    pub slots: RwLock<Vec<String>>,
}

#[async_trait]
impl BookingLookup for StaticBookings {
    async fn active_time_slots(&self, _: Uuid, _: Uuid, _: NaiveDate) -> Result<Vec<String>, ScheduleError> {
        Ok(self.slots.read().await.clone())
    }
}

pub struct World {
    pub doctor: Provider,
    pub hospital: Provider,
    pub connections: Arc<InMemoryConnectionStore>,
    pub templates: TemplateService,
    pub resolver: AvailabilityResolver,
    pub bookings: Arc<StaticBookings>,
}

impl World {
    pub async fn new() -> Self {
        let doctor = Provider {
            id: Uuid::new_v4(),
            owner_user_id: Uuid::new_v4().to_string(),
            unique_code: "DOC-001".to_string(),
            kind: ProviderKind::Doctor,
            display_name: None,
        };
        let hospital = Provider {
            id: Uuid::new_v4(),
            owner_user_id: Uuid::new_v4().to_string(),
            unique_code: "HOS-001".to_string(),
            kind: ProviderKind::Hospital,
            display_name: None,
        };

        let providers = Arc::new(InMemoryProviderStore::new());
        providers.insert(doctor.clone()).await;
        providers.insert(hospital.clone()).await;
        let directory = ProviderDirectory::with_store(providers);

        let connections = Arc::new(InMemoryConnectionStore::new());
        let gate = ConnectionGate::with_stores(directory.clone(), connections.clone(), Arc::new(InMemoryNotifier::new()));

        let store = Arc::new(InMemoryTemplateStore::new());
        let bookings = Arc::new(StaticBookings::default());

        Self {
            templates: TemplateService::with_stores(gate, store.clone()),
            resolver: AvailabilityResolver::with_stores(directory, store, bookings.clone(), 10),
            doctor,
            hospital,
            connections,
            bookings,
        }
    }

    pub async fn connect(&self, status: ConnectionStatus) {
        let mut connection = ProviderConnection::new_pending(self.doctor.id, self.hospital.id, ProviderKind::Hospital);
        connection.status = status;
        self.connections.insert(connection).await.unwrap();
    }

    pub async fn connected() -> Self {
        let world = Self::new().await;
        world.connect(ConnectionStatus::Active).await;
        world
    }
}

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

pub fn slot(id: &str, range: &str, kind: SlotKind) -> Slot {
    Slot {
        slot_id: id.to_string(),
        display_time_range: range.to_string(),
        kind,
    }
}

pub fn session(label: &str, finalized: bool, slots: Vec<Slot>) -> Session {
    Session {
        label: label.to_string(),
        is_finalized: finalized,
        slots,
    }
}
