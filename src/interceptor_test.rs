use super::*;
use crate::session::Session;
use crate::storage::ACCESS_TOKEN_KEY;
use crate::test_helpers::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Backend where `/api/bookings/` only accepts `current_access`, and refresh
/// succeeds for `refresh-1` with an access token numbered by call count.
fn backend(current_access: &'static str, refreshes: Arc<AtomicUsize>) -> Arc<MockTransport> {
    MockTransport::new(move |req| match req.path.as_str() {
        REFRESH_PATH => {
            let body = req.body.as_ref().unwrap();
            if body["refresh"] != "refresh-1" {
                return json_response(401, &serde_json::json!({ "detail": "Token is invalid or expired" }));
            }
            refreshes.fetch_add(1, Ordering::SeqCst);
            json_response(200, &serde_json::json!({ "access": current_access }))
        }
        BOOKINGS_PATH => {
            if bearer(req) == Some(current_access) {
                json_response(200, &serde_json::json!([]))
            } else {
                unauthorized()
            }
        }
        ROOMS_PATH => json_response(200, &serde_json::json!([{ "id": 1 }])),
        _ => json_response(404, &serde_json::json!({ "detail": "Not found." })),
    })
}

fn client(store: SessionStore, transport: Arc<MockTransport>) -> ApiClient {
    ApiClient::new(store, transport)
}

// =============================================================================
// attach
// =============================================================================

#[tokio::test]
async fn attaches_bearer_when_authenticated() {
    let refreshes = Arc::new(AtomicUsize::new(0));
    let transport = backend("access-1", refreshes.clone());
    let (store, _storage) = store_with_tokens(transport.clone(), "access-1", "refresh-1");

    let response = client(store, transport.clone()).execute(PendingRequest::get(BOOKINGS_PATH)).await.unwrap();
    assert_eq!(response.status, 200);

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].authorization(), Some("Bearer access-1"));
    assert_eq!(refreshes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sends_no_header_when_logged_out() {
    let transport = backend("access-1", Arc::new(AtomicUsize::new(0)));
    let (store, _storage) = empty_store(transport.clone());

    let mut request = PendingRequest::get(ROOMS_PATH);
    request.headers.push(("Authorization".to_owned(), "Bearer leftover".to_owned()));
    client(store, transport.clone()).execute(request).await.unwrap();

    assert_eq!(transport.calls()[0].authorization(), None);
}

#[tokio::test]
async fn request_after_logout_carries_no_token() {
    let transport = backend("access-1", Arc::new(AtomicUsize::new(0)));
    let (store, _storage) = store_with_tokens(transport.clone(), "access-1", "refresh-1");
    let api = client(store.clone(), transport.clone());

    store.logout().unwrap();
    api.execute(PendingRequest::get(ROOMS_PATH)).await.unwrap();
    assert_eq!(transport.calls()[0].authorization(), None);
}

// =============================================================================
// refresh + retry
// =============================================================================

#[tokio::test]
async fn expired_access_refreshes_once_and_retries_once() {
    let refreshes = Arc::new(AtomicUsize::new(0));
    let transport = backend("access-2", refreshes.clone());
    let (store, storage) = store_with_tokens(transport.clone(), "access-1", "refresh-1");

    let response = client(store.clone(), transport.clone())
        .execute(PendingRequest::get(BOOKINGS_PATH))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);

    let bookings = transport.calls_to(BOOKINGS_PATH);
    assert_eq!(bookings.len(), 2);
    assert_eq!(bookings[0].authorization(), Some("Bearer access-1"));
    assert_eq!(bookings[1].authorization(), Some("Bearer access-2"));

    assert_eq!(store.access_token().as_deref(), Some("access-2"));
    assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("access-2"));
}

#[tokio::test]
async fn retry_preserves_method_body_and_other_headers() {
    let transport = backend("access-2", Arc::new(AtomicUsize::new(0)));
    let (store, _storage) = store_with_tokens(transport.clone(), "access-1", "refresh-1");

    let mut request = PendingRequest::post(BOOKINGS_PATH).with_json(serde_json::json!({ "room": 3 }));
    request.headers.push(("X-Request-Id".to_owned(), "abc".to_owned()));
    client(store, transport.clone()).execute(request).await.unwrap();

    let bookings = transport.calls_to(BOOKINGS_PATH);
    assert_eq!(bookings.len(), 2);
    assert_eq!(bookings[1].method, reqwest::Method::POST);
    assert_eq!(bookings[1].body, Some(serde_json::json!({ "room": 3 })));
    assert!(bookings[1].headers.iter().any(|(k, v)| k == "X-Request-Id" && v == "abc"));
}

#[tokio::test]
async fn invalid_refresh_token_logs_out_without_retry() {
    let refreshes = Arc::new(AtomicUsize::new(0));
    let transport = backend("access-2", refreshes.clone());
    let (store, _storage) = store_with_tokens(transport.clone(), "access-1", "refresh-expired");

    let err = client(store.clone(), transport.clone())
        .execute(PendingRequest::get(BOOKINGS_PATH))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Authentication(ref msg) if msg.contains("invalid or expired")));
    assert_eq!(store.snapshot(), Session::default());
    assert_eq!(transport.calls_to(BOOKINGS_PATH).len(), 1);
    assert_eq!(transport.calls_to(REFRESH_PATH).len(), 1);
}

#[tokio::test]
async fn unauthorized_without_refresh_token_propagates_original() {
    let transport = backend("access-2", Arc::new(AtomicUsize::new(0)));
    let (store, _storage) = empty_store(transport.clone());

    let err = client(store, transport.clone()).execute(PendingRequest::get(BOOKINGS_PATH)).await.unwrap_err();
    assert!(matches!(err, ApiError::Authentication(ref msg) if msg.contains("Given token not valid")));
    assert!(transport.calls_to(REFRESH_PATH).is_empty());
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn second_unauthorized_does_not_refresh_again() {
    let refreshes = Arc::new(AtomicUsize::new(0));
    let counter = refreshes.clone();
    let transport = MockTransport::new(move |req| match req.path.as_str() {
        REFRESH_PATH => {
            counter.fetch_add(1, Ordering::SeqCst);
            json_response(200, &serde_json::json!({ "access": "access-2" }))
        }
        _ => unauthorized(),
    });
    let (store, _storage) = store_with_tokens(transport.clone(), "access-1", "refresh-1");

    let err = client(store.clone(), transport.clone())
        .execute(PendingRequest::get(BOOKINGS_PATH))
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::AuthorizationRetryExhausted);
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(transport.calls_to(BOOKINGS_PATH).len(), 2);
    // The renewed token is kept; only the request failed.
    assert!(store.is_authenticated());
}

#[tokio::test]
async fn retry_failure_other_than_401_is_surfaced() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let transport = MockTransport::new(move |req| match req.path.as_str() {
        REFRESH_PATH => json_response(200, &serde_json::json!({ "access": "access-2" })),
        _ => {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                unauthorized()
            } else {
                json_response(409, &serde_json::json!({ "detail": "Room already booked" }))
            }
        }
    });
    let (store, _storage) = store_with_tokens(transport.clone(), "access-1", "refresh-1");

    let err = client(store, transport).execute(PendingRequest::post(BOOKINGS_PATH)).await.unwrap_err();
    assert_eq!(err, ApiError::Conflict("Room already booked".into()));
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let refreshes = Arc::new(AtomicUsize::new(0));
    let transport = backend("access-2", refreshes.clone());
    let (store, _storage) = store_with_tokens(transport.clone(), "access-1", "refresh-1");
    let api = client(store, transport.clone());

    let (a, b) = tokio::join!(
        api.execute(PendingRequest::get(BOOKINGS_PATH)),
        api.execute(PendingRequest::get(BOOKINGS_PATH)),
    );
    assert_eq!(a.unwrap().status, 200);
    assert_eq!(b.unwrap().status, 200);
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);

    let retried: Vec<_> = transport
        .calls_to(BOOKINGS_PATH)
        .into_iter()
        .filter(|c| c.authorization() == Some("Bearer access-2"))
        .collect();
    assert_eq!(retried.len(), 2);
}

#[tokio::test]
async fn late_unauthorized_reuses_renewed_token() {
    let refreshes = Arc::new(AtomicUsize::new(0));
    let transport = backend("access-2", refreshes.clone());
    let (store, _storage) = store_with_tokens(transport.clone(), "access-1", "refresh-1");
    let api = client(store, transport.clone());

    // First request completes the whole refresh cycle before the second starts.
    api.execute(PendingRequest::get(BOOKINGS_PATH)).await.unwrap();
    api.execute(PendingRequest::get(BOOKINGS_PATH)).await.unwrap();
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
}

// =============================================================================
// pass-through failures
// =============================================================================

#[tokio::test]
async fn non_auth_failures_pass_through() {
    let transport = MockTransport::new(|_| json_response(500, &serde_json::json!({ "detail": "boom" })));
    let (store, _storage) = store_with_tokens(transport.clone(), "access-1", "refresh-1");

    let err = client(store.clone(), transport.clone()).execute(PendingRequest::get(ROOMS_PATH)).await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 500, .. }));
    assert_eq!(transport.calls().len(), 1);
    assert!(store.is_authenticated());
}

#[tokio::test]
async fn network_failure_passes_through() {
    let transport = MockTransport::new(|_| Err(ApiError::Network("connection reset".into())));
    let (store, _storage) = store_with_tokens(transport.clone(), "access-1", "refresh-1");

    let err = client(store.clone(), transport).execute(PendingRequest::get(ROOMS_PATH)).await.unwrap_err();
    assert_eq!(err, ApiError::Network("connection reset".into()));
    assert!(store.is_authenticated());
}

#[test]
fn compose_without_token_strips_authorization() {
    let request = PendingRequest::get(ROOMS_PATH).with_bearer("old");
    assert_eq!(compose(&request, None).authorization(), None);
    assert_eq!(compose(&request, Some("new")).authorization(), Some("Bearer new"));
}
