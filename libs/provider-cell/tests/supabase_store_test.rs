use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use provider_cell::router::provider_routes;
use provider_cell::store::{SupabaseConnectionStore, SupabaseProviderStore};
use provider_cell::{
    ConnectionStore, ProviderConnection, ProviderDirectory, ProviderError, ProviderKind, ProviderResolution,
};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

async fn empty_table(server: &MockServer, table: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn directory_falls_back_to_unique_code() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("unique_code", "eq.DOC-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&doctor_id, "owner-1", "DOC-001")
        ])))
        .with_priority(1)
        .mount(&server)
        .await;
    empty_table(&server, "doctors").await;

    let config = TestConfig::with_url(&server.uri()).to_app_config();
    let directory = ProviderDirectory::new(&config, None);

    let resolution = directory.resolve(ProviderKind::Doctor, "DOC-001").await.unwrap();
    assert_matches!(resolution, ProviderResolution::ByCode(p) if p.id.to_string() == doctor_id);
}

#[tokio::test]
async fn store_lookup_by_owner_maps_hospital_name() {
    let server = MockServer::start().await;
    let hospital_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/hospitals"))
        .and(query_param("user_id", "eq.owner-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::hospital_row(&hospital_id.to_string(), "owner-9", "HOS-009")
        ])))
        .mount(&server)
        .await;

    let config = TestConfig::with_url(&server.uri()).to_app_config();
    let store = SupabaseProviderStore::new(&config, Some("token"));

    use provider_cell::ProviderStore;
    let hospital = store
        .find_by_owner(ProviderKind::Hospital, "owner-9")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hospital.id, hospital_id);
    assert_eq!(hospital.display_name.as_deref(), Some("Test Hospital"));
}

#[tokio::test]
async fn duplicate_connection_insert_maps_to_duplicate_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/provider_connections"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response("duplicate key value violates unique constraint", "23505"),
        ))
        .mount(&server)
        .await;

    let config = TestConfig::with_url(&server.uri()).to_app_config();
    let store = SupabaseConnectionStore::new(&config, Some("token"));

    let err = store
        .insert(ProviderConnection::new_pending(Uuid::new_v4(), Uuid::new_v4(), ProviderKind::Hospital))
        .await
        .unwrap_err();
    assert_matches!(err, ProviderError::DuplicateConnection);
}

#[tokio::test]
async fn connection_status_is_read_from_pair_lookup() {
    let server = MockServer::start().await;
    let (doctor_id, hospital_id) = (Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/provider_connections"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::connection_row(
                &Uuid::new_v4().to_string(),
                &doctor_id.to_string(),
                &hospital_id.to_string(),
                "rejected",
            )
        ])))
        .mount(&server)
        .await;

    let config = TestConfig::with_url(&server.uri()).to_app_config();
    let store = SupabaseConnectionStore::new(&config, None);

    let found = store.find_pair(doctor_id, hospital_id).await.unwrap().unwrap();
    assert_eq!(found.status, provider_cell::ConnectionStatus::Rejected);
}

#[tokio::test]
async fn resolve_route_is_public_and_404s_for_unknown_reference() {
    let server = MockServer::start().await;
    empty_table(&server, "doctors").await;
    empty_table(&server, "hospitals").await;

    let app = provider_routes(TestConfig::with_url(&server.uri()).to_arc());

    let response = app
        .oneshot(Request::builder().uri("/resolve/NOPE-1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn connect_route_requires_a_token() {
    let app = provider_routes(TestConfig::default().to_arc());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/connect")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"target_code":"DOC-001"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
