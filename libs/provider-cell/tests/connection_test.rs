use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use uuid::Uuid;

use notification_cell::InMemoryNotifier;
use provider_cell::{
    ConnectionGate, ConnectionStatus, InMemoryConnectionStore, InMemoryProviderStore, Provider,
    ProviderDirectory, ProviderError, ProviderKind,
};

struct Fixture {
    gate: ConnectionGate,
    providers: Arc<InMemoryProviderStore>,
    notifier: Arc<InMemoryNotifier>,
    doctor: Provider,
    hospital: Provider,
}

fn provider(kind: ProviderKind, code: &str) -> Provider {
    Provider {
        id: Uuid::new_v4(),
        owner_user_id: Uuid::new_v4().to_string(),
        unique_code: code.to_string(),
        kind,
        display_name: None,
    }
}

async fn fixture() -> Fixture {
    let providers = Arc::new(InMemoryProviderStore::new());
    let doctor = provider(ProviderKind::Doctor, "DOC-001");
    let hospital = provider(ProviderKind::Hospital, "HOS-001");
    providers.insert(doctor.clone()).await;
    providers.insert(hospital.clone()).await;

    let notifier = Arc::new(InMemoryNotifier::new());
    let gate = ConnectionGate::with_stores(
        ProviderDirectory::with_store(providers.clone()),
        Arc::new(InMemoryConnectionStore::new()),
        notifier.clone(),
    );

    Fixture { gate, providers, notifier, doctor, hospital }
}

async fn wait_for_notifications(notifier: &InMemoryNotifier, count: usize) {
    for _ in 0..50 {
        if notifier.sent().await.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {} notifications", count);
}

#[tokio::test]
async fn hospital_request_is_pending_until_doctor_confirms() {
    let f = fixture().await;

    let connection = f
        .gate
        .request_connection(ProviderKind::Hospital, &f.hospital.owner_user_id, "DOC-001")
        .await
        .unwrap();
    assert_eq!(connection.status, ConnectionStatus::Pending);
    assert_eq!(connection.initiated_by, ProviderKind::Hospital);

    let err = f.gate.ensure_active(f.doctor.id, f.hospital.id).await.unwrap_err();
    assert_matches!(err, ProviderError::Forbidden(msg) if msg == "connection is pending");

    let confirmed = f
        .gate
        .confirm_connection(&f.doctor.owner_user_id, connection.id, ConnectionStatus::Active)
        .await
        .unwrap();
    assert_eq!(confirmed.status, ConnectionStatus::Active);
    f.gate.ensure_active(f.doctor.id, f.hospital.id).await.unwrap();

    wait_for_notifications(&f.notifier, 2).await;
    let recipients: Vec<String> = f.notifier.sent().await.into_iter().map(|n| n.user_id).collect();
    assert!(recipients.contains(&f.doctor.owner_user_id));
    assert!(recipients.contains(&f.hospital.owner_user_id));
}

#[tokio::test]
async fn doctor_initiated_request_is_also_pending() {
    let f = fixture().await;

    let connection = f
        .gate
        .request_connection(ProviderKind::Doctor, "DOC-001", "HOS-001")
        .await
        .unwrap();

    assert_eq!(connection.status, ConnectionStatus::Pending);
    assert_eq!(connection.doctor_id, f.doctor.id);
    assert_eq!(connection.hospital_id, f.hospital.id);
}

#[tokio::test]
async fn rejected_connection_resets_to_pending_on_rerequest() {
    let f = fixture().await;
    let first = f
        .gate
        .request_connection(ProviderKind::Hospital, "HOS-001", "DOC-001")
        .await
        .unwrap();
    f.gate
        .confirm_connection("DOC-001", first.id, ConnectionStatus::Rejected)
        .await
        .unwrap();

    let again = f
        .gate
        .request_connection(ProviderKind::Hospital, "HOS-001", "DOC-001")
        .await
        .unwrap();

    assert_eq!(again.id, first.id);
    assert_eq!(again.status, ConnectionStatus::Pending);
    assert_eq!(f.gate.list_connections(ProviderKind::Hospital, "HOS-001").await.unwrap().len(), 1);
}

#[tokio::test]
async fn active_connection_is_returned_unchanged() {
    let f = fixture().await;
    let first = f
        .gate
        .request_connection(ProviderKind::Hospital, "HOS-001", "DOC-001")
        .await
        .unwrap();
    f.gate
        .confirm_connection("DOC-001", first.id, ConnectionStatus::Active)
        .await
        .unwrap();

    let again = f
        .gate
        .request_connection(ProviderKind::Doctor, "DOC-001", "HOS-001")
        .await
        .unwrap();
    assert_eq!(again.status, ConnectionStatus::Active);
}

#[tokio::test]
async fn only_the_connected_doctor_may_confirm() {
    let f = fixture().await;
    let stranger = provider(ProviderKind::Doctor, "DOC-002");
    f.providers.insert(stranger).await;

    let connection = f
        .gate
        .request_connection(ProviderKind::Hospital, "HOS-001", "DOC-001")
        .await
        .unwrap();

    assert_matches!(
        f.gate
            .confirm_connection("DOC-002", connection.id, ConnectionStatus::Active)
            .await,
        Err(ProviderError::Forbidden(_))
    );
    assert_matches!(
        f.gate.ensure_active(f.doctor.id, f.hospital.id).await,
        Err(ProviderError::Forbidden(_))
    );
}

#[tokio::test]
async fn validation_and_lookup_failures() {
    let f = fixture().await;

    assert_matches!(
        f.gate.request_connection(ProviderKind::Hospital, "HOS-001", "DOC-404").await,
        Err(ProviderError::NotFound { kind: ProviderKind::Doctor, .. })
    );
    assert_matches!(
        f.gate.request_connection(ProviderKind::Hospital, "HOS-001", "  ").await,
        Err(ProviderError::ValidationError(_))
    );
    assert_matches!(
        f.gate.confirm_connection("DOC-001", Uuid::new_v4(), ConnectionStatus::Pending).await,
        Err(ProviderError::ValidationError(_))
    );
    assert_matches!(
        f.gate.confirm_connection("DOC-001", Uuid::new_v4(), ConnectionStatus::Active).await,
        Err(ProviderError::ConnectionNotFound)
    );
    assert_matches!(
        f.gate.ensure_active(f.doctor.id, f.hospital.id).await,
        Err(ProviderError::Forbidden(msg)) if msg == "no connection"
    );
}
