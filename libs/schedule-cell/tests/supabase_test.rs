use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use schedule_cell::router::schedule_routes;
use schedule_cell::store::{SupabaseBookingLookup, SupabaseTemplateStore};
use schedule_cell::{BookingLookup, CalendarKey, ScheduleTemplate, TemplateStore};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn sessions() -> serde_json::Value {
    json!([{
        "label": "Morning",
        "is_finalized": true,
        "slots": [{ "slot_id": "s1", "display_time_range": "09:00 - 09:10", "kind": "normal" }]
    }])
}

#[tokio::test]
async fn upsert_merges_on_the_template_key() {
    let server = MockServer::start().await;
    let (doctor_id, hospital_id) = (Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("POST"))
        .and(path("/rest/v1/schedule_templates"))
        .and(query_param("on_conflict", "doctor_id,hospital_id,calendar_key"))
        .and(header_exists("Prefer"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::template_row(&doctor_id.to_string(), &hospital_id.to_string(), "weekday:0", sessions())
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_url(&server.uri()).to_app_config();
    let store = SupabaseTemplateStore::new(&config, Some("token"));

    let template = ScheduleTemplate::new(
        doctor_id,
        hospital_id,
        CalendarKey::Weekday(0),
        serde_json::from_value(sessions()).unwrap(),
    );
    let stored = store.upsert(template).await.unwrap();

    assert_eq!(stored.calendar_key, CalendarKey::Weekday(0));
    assert_eq!(stored.sessions[0].slots[0].slot_id, "s1");
}

#[tokio::test]
async fn find_filters_on_storage_key() {
    let server = MockServer::start().await;
    let (doctor_id, hospital_id) = (Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_templates"))
        .and(query_param("calendar_key", "eq.2024-06-10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::template_row(&doctor_id.to_string(), &hospital_id.to_string(), "2024-06-10", sessions())
        ])))
        .mount(&server)
        .await;

    let config = TestConfig::with_url(&server.uri()).to_app_config();
    let store = SupabaseTemplateStore::new(&config, None);

    let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
    let found = store.find(doctor_id, hospital_id, &CalendarKey::Date(date)).await.unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn booking_lookup_reads_only_active_appointments() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "in.(pending,approved)"))
        .and(query_param("select", "time_slot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "time_slot": "09:00 - 09:10" }
        ])))
        .mount(&server)
        .await;

    let config = TestConfig::with_url(&server.uri()).to_app_config();
    let lookup = SupabaseBookingLookup::new(&config, None);

    let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
    let slots = lookup.active_time_slots(Uuid::new_v4(), Uuid::new_v4(), date).await.unwrap();
    assert_eq!(slots, vec!["09:00 - 09:10".to_string()]);
}

#[tokio::test]
async fn availability_route_is_public_and_404s_on_unknown_doctor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let app = schedule_routes(TestConfig::with_url(&server.uri()).to_arc());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/availability/DOC-404/HOS-001?date=2024-06-10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn templates_route_requires_a_token() {
    let app = schedule_routes(TestConfig::default().to_arc());
    let response = app
        .oneshot(Request::builder().uri("/templates?doctor_id=DOC-001").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
