use super::*;

// =============================================================================
// PendingRequest headers
// =============================================================================

#[test]
fn with_bearer_attaches_header() {
    let request = PendingRequest::get("/api/bookings/").with_bearer("tok-1");
    assert_eq!(request.authorization(), Some("Bearer tok-1"));
}

#[test]
fn with_bearer_replaces_existing_header_case_insensitively() {
    let mut request = PendingRequest::get("/api/bookings/");
    request.headers.push(("authorization".to_owned(), "Bearer stale".to_owned()));
    request.headers.push(("X-Trace".to_owned(), "1".to_owned()));

    let rewritten = request.with_bearer("fresh");
    assert_eq!(rewritten.authorization(), Some("Bearer fresh"));
    assert_eq!(rewritten.headers.len(), 2);
    assert!(rewritten.headers.iter().any(|(name, _)| name == "X-Trace"));
}

#[test]
fn with_bearer_leaves_original_untouched() {
    let request = PendingRequest::get("/api/bookings/");
    let _ = request.with_bearer("tok");
    assert_eq!(request.authorization(), None);
}

#[test]
fn without_authorization_strips_header() {
    let request = PendingRequest::post("/api/bookings/").with_bearer("tok");
    assert_eq!(request.without_authorization().authorization(), None);
}

#[test]
fn builders_set_query_and_body() {
    let request = PendingRequest::post("/api/bookings/")
        .with_query(vec![("room_type".to_owned(), "suite".to_owned())])
        .with_json(serde_json::json!({ "room": 1 }));
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.query.len(), 1);
    assert_eq!(request.body, Some(serde_json::json!({ "room": 1 })));
}

// =============================================================================
// RawResponse
// =============================================================================

#[test]
fn raw_response_success_range() {
    assert!(RawResponse::new(200, "").is_success());
    assert!(RawResponse::new(201, "").is_success());
    assert!(!RawResponse::new(301, "").is_success());
    assert!(RawResponse::new(401, "").is_unauthorized());
}

#[test]
fn error_for_status_maps_failure() {
    let err = RawResponse::new(404, r#"{"detail":"Not found."}"#).error_for_status().unwrap_err();
    assert_eq!(err, ApiError::NotFound("Not found.".to_owned()));
}

#[test]
fn json_decode_failure_is_decode_error() {
    let err = RawResponse::new(200, "not json").json::<serde_json::Value>().unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

// =============================================================================
// HttpTransport
// =============================================================================

#[test]
fn http_transport_joins_paths() {
    let config = ClientConfig::default().with_base_url("http://127.0.0.1:8000/");
    let transport = HttpTransport::from_config(&config).unwrap();
    assert_eq!(transport.base_url(), "http://127.0.0.1:8000");
    assert_eq!(transport.url("/api/rooms/"), "http://127.0.0.1:8000/api/rooms/");
    assert_eq!(transport.url("api/rooms/"), "http://127.0.0.1:8000/api/rooms/");
}
