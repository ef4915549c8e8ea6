use appointment_desk::core::booking::FixedClock;
use appointment_desk::domain::model::Citizen;
use appointment_desk::utils::error::{BookingError, ConflictKind};
use appointment_desk::{BookingForm, BookingWorkflow, HttpBookingApi, QueryCache};
use chrono::NaiveDate;
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn workflow(server: &MockServer) -> BookingWorkflow<HttpBookingApi> {
    let api = HttpBookingApi::new(&server.base_url(), Duration::from_secs(5)).with_token("tok");
    let now = NaiveDate::from_ymd_opt(2026, 10, 18)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    BookingWorkflow::new(Arc::new(api), QueryCache::new(Duration::from_secs(300)))
        .with_clock(Arc::new(FixedClock(now)))
}

fn mock_directory(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/offices");
        then.status(200).json_body(json!([
            {"id": 3, "name": "Accra Central", "description": null, "location": "Accra", "is_active": true}
        ]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/offices/3/hosts");
        then.status(200).json_body(json!([
            {"user_id": 7, "first_name": "Efua", "last_name": "Owusu", "email": "efua@example.org", "is_primary": true}
        ]));
    });
}

fn slots_body(nine_booked: bool) -> serde_json::Value {
    json!([
        {"date": "2026-10-20", "slot_start": "09:00:00", "slot_end": "09:30:00", "is_booked": nine_booked},
        {"date": "2026-10-20", "slot_start": "09:30:00", "slot_end": "10:00:00", "is_booked": true},
        {"date": "2026-10-20", "slot_start": "10:00:00", "slot_end": "10:30:00", "is_booked": false}
    ])
}

fn form(slot: &str) -> BookingForm {
    BookingForm {
        office_id: 3,
        host_id: 7,
        appointment_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
        slot_start: slot.to_string(),
        purpose: "Birth certificate".to_string(),
        citizen: Citizen {
            firstname: "Kojo".to_string(),
            lastname: "Asante".to_string(),
            email: "kojo@example.org".to_string(),
            phone: "+233 20 111 2222".to_string(),
        },
        status: None,
    }
}

#[tokio::test]
async fn test_end_to_end_booking() {
    let server = MockServer::start();
    mock_directory(&server);
    let slots_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/availability/hosts/3/slots")
            .query_param("target_date", "2026-10-20");
        then.status(200).json_body(slots_body(false));
    });
    let create_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/appointments/with-citizen")
            .body_contains("\"time_slotted\":\"10:00:00\"");
        then.status(201).json_body(json!({"message": "Appointment booked"}));
    });

    let flow = workflow(&server);
    let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();

    let selectable = flow.available_slots(3, date).await.unwrap();
    let labels: Vec<String> = selectable.iter().map(|s| s.label()).collect();
    assert_eq!(labels, vec!["09:00 - 09:30", "10:00 - 10:30"]);

    let receipt = flow.book(form("10:00")).await.unwrap();
    assert_eq!(receipt.message, "Appointment booked");
    assert_eq!(receipt.host.user_id, 7);

    create_mock.assert();
    // 第一次讀取後的時段由快取提供
    slots_mock.assert_hits(1);
}

#[tokio::test]
async fn test_slot_taken_on_server_reconciles_local_slots() {
    let server = MockServer::start();
    mock_directory(&server);
    let mut stale_slots = server.mock(|when, then| {
        when.method(GET).path("/availability/hosts/3/slots");
        then.status(200).json_body(slots_body(false));
    });
    let create_mock = server.mock(|when, then| {
        when.method(POST).path("/appointments/with-citizen");
        then.status(409).json_body(json!({
            "detail": {
                "error_type": "UniqueViolationError",
                "error": "duplicate key value violates unique constraint \"appointments_host_slot_key\""
            }
        }));
    });

    let flow = workflow(&server);
    let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();

    let err = flow.book(form("09:00")).await.unwrap_err();
    assert!(matches!(err, BookingError::Conflict(ConflictKind::SlotTaken)));
    assert_eq!(err.field(), Some("time_slotted"));
    create_mock.assert();

    // 伺服器上 09:00 已被預約
    stale_slots.delete();
    server.mock(|when, then| {
        when.method(GET).path("/availability/hosts/3/slots");
        then.status(200).json_body(slots_body(true));
    });

    let selectable = flow.available_slots(3, date).await.unwrap();
    let labels: Vec<String> = selectable.iter().map(|s| s.label()).collect();
    assert_eq!(labels, vec!["10:00 - 10:30"]);

    // 本地已知不可選的時段不再送出
    let err = flow.book(form("09:00")).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
    create_mock.assert_hits(1);
}

#[tokio::test]
async fn test_rejected_payload_fields_are_surfaced() {
    let server = MockServer::start();
    mock_directory(&server);
    server.mock(|when, then| {
        when.method(GET).path("/availability/hosts/3/slots");
        then.status(200).json_body(slots_body(false));
    });
    server.mock(|when, then| {
        when.method(POST).path("/appointments/with-citizen");
        then.status(422).json_body(json!({
            "detail": [
                {"loc": ["body", "citizen", "email"], "msg": "email domain is not accepted", "type": "value_error"}
            ]
        }));
    });

    let err = workflow(&server).book(form("09:00")).await.unwrap_err();
    let fields = err.field_errors();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].field, "email");
    assert_eq!(fields[0].message, "email domain is not accepted");
}
