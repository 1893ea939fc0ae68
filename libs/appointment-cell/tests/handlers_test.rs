use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::handlers::*;
use appointment_cell::models::*;
use shared_models::{auth::User, error::AppError};
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn create_test_user_extension(role: &str) -> Extension<User> {
    Extension(TestUser::new(&format!("{}@example.com", role), role).to_user())
}

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    let auth = Authorization::bearer(token).unwrap();
    TypedHeader(auth)
}

fn save_request(
    practitioner: Option<&str>,
    room: Option<&str>,
    date: Option<&str>,
    time: Option<&str>,
) -> SaveAppointmentRequest {
    SaveAppointmentRequest {
        patient_id: Some(101),
        practitioner_name: practitioner.map(str::to_string),
        room_number: room.map(str::to_string),
        appointment_date: date.and_then(|d| d.parse().ok()),
        appointment_time: time.map(str::to_string),
        duration: Some("30 min".to_string()),
        observation: None,
        care_type: Some("Checkup".to_string()),
        patient_name: Some("Test Patient".to_string()),
        patient_role: None,
        affiliation: None,
        agent: None,
        insurer_name: None,
        cancelled_at: None,
    }
}

async fn test_setup() -> (MockServer, std::sync::Arc<shared_config::AppConfig>, String) {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::with_supabase_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(
        &TestUser::secretary("desk@example.com"),
        &test_config.jwt_secret,
        Some(24),
    );
    (mock_server, test_config.to_arc(), token)
}

#[tokio::test]
async fn create_appointment_returns_stored_record() {
    let (mock_server, config, token) = test_setup().await;

    // Empty cohort: the slot is free.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(42, Some("Dr. Smith"), Some("C01"), "2024-01-15", "09:00")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = create_appointment(
        State(config),
        create_auth_header(&token),
        create_test_user_extension("secretary"),
        Json(save_request(Some("Dr. Smith"), Some("C01"), Some("2024-01-15"), Some("09:00"))),
    )
    .await;

    let Json(appointment) = result.expect("booking should succeed");
    assert_eq!(appointment.id, 42);
    assert_eq!(appointment.practitioner_name.as_deref(), Some("Dr. Smith"));
}

#[tokio::test]
async fn create_without_time_fails_validation_and_writes_nothing() {
    let (mock_server, config, token) = test_setup().await;

    // No storage call is allowed at all for an invalid request.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = create_appointment(
        State(config),
        create_auth_header(&token),
        create_test_user_extension("secretary"),
        Json(save_request(Some("Dr. Smith"), Some("C01"), Some("2024-01-15"), None)),
    )
    .await;

    match result {
        Err(AppError::ValidationError(msg)) => assert!(msg.contains("appointment_time")),
        other => panic!("expected validation error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn create_conflicting_practitioner_is_rejected() {
    let (mock_server, config, token) = test_setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("appointment_date", "eq.2024-01-15"))
        .and(query_param("appointment_time", "eq.09:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(7, Some("Dr. Smith"), Some("C01"), "2024-01-15", "09:00")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    // Same practitioner, different room: still a conflict.
    let result = create_appointment(
        State(config),
        create_auth_header(&token),
        create_test_user_extension("secretary"),
        Json(save_request(Some("Dr. Smith"), Some("C02"), Some("2024-01-15"), Some("09:00"))),
    )
    .await;

    match result {
        Err(AppError::Conflict(msg)) => assert!(msg.contains("Practitioner")),
        other => panic!("expected conflict, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn create_conflicting_room_is_rejected() {
    let (mock_server, config, token) = test_setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(7, Some("Dr. Smith"), Some("C01"), "2024-01-15", "09:00")
        ])))
        .mount(&mock_server)
        .await;

    // Different practitioner, same room.
    let result = create_appointment(
        State(config),
        create_auth_header(&token),
        create_test_user_extension("secretary"),
        Json(save_request(Some("Dr. Jones"), Some("C01"), Some("2024-01-15"), Some("09:00"))),
    )
    .await;

    match result {
        Err(AppError::Conflict(msg)) => assert!(msg.contains("Room")),
        other => panic!("expected conflict, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn axes_do_not_combine() {
    let (mock_server, config, token) = test_setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(7, Some("Dr. Smith"), Some("C01"), "2024-01-15", "09:00")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(8, Some("Dr. Jones"), Some("C02"), "2024-01-15", "09:00")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Same slot, both axes differ: bookable.
    let result = create_appointment(
        State(config),
        create_auth_header(&token),
        create_test_user_extension("secretary"),
        Json(save_request(Some("Dr. Jones"), Some("C02"), Some("2024-01-15"), Some("09:00"))),
    )
    .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn blank_axes_are_never_conflicting() {
    let (mock_server, config, token) = test_setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(7, Some("Dr. Smith"), Some("C01"), "2024-01-15", "09:00")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(9, None, None, "2024-01-15", "09:00")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Neither axis set on the incoming record: nothing to collide with.
    let result = create_appointment(
        State(config),
        create_auth_header(&token),
        create_test_user_extension("secretary"),
        Json(save_request(None, None, Some("2024-01-15"), Some("09:00"))),
    )
    .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn update_excludes_own_record_from_conflict_scan() {
    let (mock_server, config, token) = test_setup().await;

    // Existence check.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(7, Some("Dr. Smith"), Some("C01"), "2024-01-15", "09:00")
        ])))
        .mount(&mock_server)
        .await;

    // Cohort scan excludes id 7, so the record's own slot looks free.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "neq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(7, Some("Dr. Smith"), Some("C01"), "2024-01-15", "09:00")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Re-save the record into its own unchanged slot.
    let result = update_appointment(
        State(config),
        Path(7),
        create_auth_header(&token),
        create_test_user_extension("secretary"),
        Json(save_request(Some("Dr. Smith"), Some("C01"), Some("2024-01-15"), Some("09:00"))),
    )
    .await;

    let Json(updated) = result.expect("self-update must not conflict with itself");
    assert_eq!(updated.id, 7);
}

#[tokio::test]
async fn update_unknown_id_is_not_found() {
    let (mock_server, config, token) = test_setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.99"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = update_appointment(
        State(config),
        Path(99),
        create_auth_header(&token),
        create_test_user_extension("secretary"),
        Json(save_request(Some("Dr. Smith"), Some("C01"), Some("2024-01-15"), Some("09:00"))),
    )
    .await;

    match result {
        Err(AppError::NotFound(_)) => {}
        other => panic!("expected not found, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn delete_returns_no_content() {
    let (mock_server, config, token) = test_setup().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(7, Some("Dr. Smith"), Some("C01"), "2024-01-15", "09:00")
        ])))
        .mount(&mock_server)
        .await;

    let result = delete_appointment(
        State(config),
        Path(7),
        create_auth_header(&token),
        create_test_user_extension("secretary"),
    )
    .await;

    assert_eq!(result.expect("delete should succeed"), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn delete_unknown_id_is_not_found() {
    let (mock_server, config, token) = test_setup().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = delete_appointment(
        State(config),
        Path(99),
        create_auth_header(&token),
        create_test_user_extension("secretary"),
    )
    .await;

    match result {
        Err(AppError::NotFound(_)) => {}
        other => panic!("expected not found, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn list_passes_filters_through() {
    let (mock_server, config, token) = test_setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_name", "ilike.*Mar*"))
        .and(query_param("appointment_date", "eq.2024-01-15"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(1, Some("Dr. Smith"), None, "2024-01-15", "10:00")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let filter = AppointmentFilter {
        patient: Some("Mar".to_string()),
        practitioner: None,
        date: "2024-01-15".parse().ok(),
    };

    let result = list_appointments(State(config), create_auth_header(&token), Query(filter)).await;

    let Json(appointments) = result.expect("listing should succeed");
    assert_eq!(appointments.len(), 1);
}

#[tokio::test]
async fn agenda_requires_a_date_or_a_range() {
    let (_mock_server, config, token) = test_setup().await;

    let query = PractitionerAgendaQuery {
        practitioner: "Dr. Smith".to_string(),
        date: None,
        start_date: None,
        end_date: None,
    };

    let result =
        appointments_by_practitioner(State(config), create_auth_header(&token), Query(query)).await;

    match result {
        Err(AppError::ValidationError(_)) => {}
        other => panic!("expected validation error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn agenda_range_queries_inclusive_bounds() {
    let (mock_server, config, token) = test_setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("practitioner_name", "eq.Dr. Smith"))
        .and(query_param("appointment_date", "gte.2024-01-15"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let query = PractitionerAgendaQuery {
        practitioner: "Dr. Smith".to_string(),
        date: None,
        start_date: "2024-01-15".parse().ok(),
        end_date: "2024-01-19".parse().ok(),
    };

    let result =
        appointments_by_practitioner(State(config), create_auth_header(&token), Query(query)).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn matricule_lookup_resolves_patient_first() {
    let (mock_server, config, token) = test_setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("matricule", "eq.180059912345678"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(101, "Marie", "180059912345678")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_id", "eq.101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(3, Some("Dr. Smith"), None, "2024-01-15", "10:00")
        ])))
        .mount(&mock_server)
        .await;

    let result = appointments_by_matricule(
        State(config),
        Path("180059912345678".to_string()),
        create_auth_header(&token),
    )
    .await;

    let Json(appointments) = result.expect("lookup should succeed");
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].patient_id, Some(101));
}

#[tokio::test]
async fn matricule_lookup_unknown_patient_is_not_found() {
    let (mock_server, config, token) = test_setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = appointments_by_matricule(
        State(config),
        Path("000000000000000".to_string()),
        create_auth_header(&token),
    )
    .await;

    match result {
        Err(AppError::NotFound(msg)) => assert!(msg.contains("Patient")),
        other => panic!("expected not found, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn available_slots_subtracts_booked_times() {
    let (mock_server, config, token) = test_setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("appointment_date", "eq.2024-01-15"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(1, Some("Dr. Smith"), Some("C01"), "2024-01-15", "09:00:00"),
            MockSupabaseResponses::appointment_response(2, Some("Dr. Smith"), Some("C01"), "2024-01-15", "14:30")
        ])))
        .mount(&mock_server)
        .await;

    let query = AvailableSlotsQuery {
        practitioner: Some("Dr. Smith".to_string()),
        room: Some("C01".to_string()),
        date: "2024-01-15".parse().unwrap(),
        step_minutes: None,
    };

    let result = available_slots(State(config), create_auth_header(&token), Query(query)).await;

    let Json(slots) = result.expect("slot query should succeed");
    // 20 half-hour slots in 08:00-17:30, two taken; seconds are truncated.
    assert_eq!(slots.len(), 18);
    assert!(!slots.contains(&"09:00".to_string()));
    assert!(!slots.contains(&"14:30".to_string()));
    assert_eq!(slots.first().map(String::as_str), Some("08:00"));
}

#[tokio::test]
async fn slot_overview_reports_utilization() {
    let (mock_server, config, token) = test_setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(1, Some("Dr. Smith"), Some("C01"), "2024-01-15", "09:00"),
            MockSupabaseResponses::appointment_response(2, Some("Dr. Smith"), Some("C01"), "2024-01-15", "09:30"),
            MockSupabaseResponses::appointment_response(3, Some("Dr. Smith"), Some("C01"), "2024-01-15", "10:00"),
            MockSupabaseResponses::appointment_response(4, Some("Dr. Smith"), Some("C01"), "2024-01-15", "10:30"),
            MockSupabaseResponses::appointment_response(5, Some("Dr. Smith"), Some("C01"), "2024-01-15", "11:00")
        ])))
        .mount(&mock_server)
        .await;

    let query = AvailableSlotsQuery {
        practitioner: Some("Dr. Smith".to_string()),
        room: None,
        date: "2024-01-15".parse().unwrap(),
        step_minutes: Some(30),
    };

    let result = slot_overview(State(config), create_auth_header(&token), Query(query)).await;

    let Json(overview) = result.expect("overview should succeed");
    assert_eq!(overview.total_slots, 20);
    assert_eq!(overview.booked_count, 5);
    assert_eq!(overview.available_count, 15);
    assert_eq!(overview.utilization_percent, 25);
}
