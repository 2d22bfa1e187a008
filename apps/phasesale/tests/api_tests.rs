//! Integration tests for the phasesale HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await in auth tests - tests are serialized
// intentionally to avoid env var conflicts
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use base64::Engine as _;
use phasesale::api::{
    AdminResponse, AppState, BalanceResponse, EventsResponse, HealthResponse, OPERATOR_HEADER,
    PaymentResponse, QuoteResponse, SnapshotResponse, StatusResponse, create_router,
    error_response,
};
use phasesale_core::primitives::SECONDS_PER_DAY;
use phasesale_core::{
    Address, Collaborators, Currency, InMemoryLedger, ManualClock, OperatorSet, Phase,
    SaleConfiguration, SaleEngine, SaleError, SaleEvent, SaleSchedule, SaleSnapshot, SaleTerms,
    SnapshotStore, Timestamp, Tokens, Treasury, snapshot_from_bytes,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mutex to serialize tests since auth tests modify env vars.
static AUTH_TEST_MUTEX: Mutex<()> = Mutex::new(());

const API_KEY_VAR: &str = "PHASESALE_API_KEY";
const T: u64 = 1_700_000_000;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Guard wrapper that holds the mutex and ensures cleanup on drop.
struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
        unsafe { std::env::remove_var(API_KEY_VAR) };
    }
}

/// A served sale with its clock and treasury exposed to the test.
struct Harness {
    server: TestServer,
    clock: ManualClock,
    treasury: Arc<Mutex<Treasury>>,
}

fn at(days: u64, secs: u64) -> Timestamp {
    Timestamp(T + days * SECONDS_PER_DAY + secs)
}

fn build_harness() -> Harness {
    build_harness_with(AppState::new)
}

fn build_harness_with(state: impl FnOnce(SaleEngine) -> AppState) -> Harness {
    let clock = ManualClock::new(Timestamp(T));
    let treasury = Arc::new(Mutex::new(Treasury::new()));
    let engine = SaleEngine::new(
        SaleConfiguration::new(
            SaleSchedule::new(at(1, 0), 10, at(20, 0), 30),
            SaleTerms::default(),
            Address::new("beneficiary"),
        ),
        Collaborators {
            ledger: Box::new(InMemoryLedger::new()),
            fund_sink: Box::new(Arc::clone(&treasury)),
            access: Box::new(OperatorSet::new([Address::new("ops")])),
            clock: Box::new(clock.clone()),
        },
    )
    .unwrap();

    Harness {
        server: TestServer::new(create_router(state(engine))).unwrap(),
        clock,
        treasury,
    }
}

/// Create a test server hosting a fresh sale.
/// Returns a guard that must be kept alive during the test.
fn create_test_server() -> (Harness, TestGuard) {
    let guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var(API_KEY_VAR) };
    (build_harness(), TestGuard { _guard: guard })
}

/// Snapshot store whose writes fail while `failing` is set.
#[derive(Clone, Default)]
struct FlakyStore {
    failing: Arc<AtomicBool>,
    saved: Arc<AtomicUsize>,
}

impl SnapshotStore for FlakyStore {
    fn save_snapshot(&self, _snapshot: &SaleSnapshot) -> Result<(), SaleError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SaleError::Storage("disk full".to_string()));
        }
        self.saved.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Create a pre-sale test server persisting through `store`.
fn create_persisted_server(store: &FlakyStore) -> (Harness, TestGuard) {
    let guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var(API_KEY_VAR) };
    let store = store.clone();
    let harness = build_harness_with(move |engine| AppState::with_store(engine, store));
    harness.clock.set(at(1, 1));
    (harness, TestGuard { _guard: guard })
}

/// Create a test server whose sale is already in the pre-sale window.
fn create_presale_server() -> (Harness, TestGuard) {
    let (harness, guard) = create_test_server();
    harness.clock.set(at(1, 1));
    (harness, guard)
}

fn header(value: &str) -> HeaderValue {
    value.parse::<HeaderValue>().unwrap()
}

async fn pay(server: &TestServer, payer: &str, amount: u128) -> axum_test::TestResponse {
    server
        .post("/payment")
        .json(&json!({ "payer": payer, "amount": amount }))
        .await
}

async fn admin(server: &TestServer, command: &str, operator: &str) -> axum_test::TestResponse {
    server
        .post(&format!("/admin/{}", command))
        .add_header(HeaderName::from_static(OPERATOR_HEADER), header(operator))
        .await
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (h, _guard) = create_test_server();

    let response = h.server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// STATUS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_status_fresh_sale() {
    let (h, _guard) = create_test_server();

    let response = h.server.get("/status").await;

    response.assert_status_ok();
    let status: StatusResponse = response.json();
    assert_eq!(status.phase, Phase::Preparing);
    assert_eq!(status.effective_phase, Phase::Preparing);
    assert_eq!(status.stats.investor_count, 0);
    assert_eq!(status.stats.held_funds, Currency::ZERO);
}

#[tokio::test]
async fn test_status_reports_effective_phase_without_committing() {
    let (h, _guard) = create_presale_server();

    let status: StatusResponse = h.server.get("/status").await.json();
    assert_eq!(status.phase, Phase::Preparing);
    assert_eq!(status.effective_phase, Phase::PreSale);

    let events: EventsResponse = h.server.get("/events").await.json();
    assert!(events.events.is_empty());
}

// =============================================================================
// PAYMENT ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_payment_in_presale() {
    let (h, _guard) = create_presale_server();

    let response = pay(&h.server, "alice", 500).await;

    response.assert_status_ok();
    let payment: PaymentResponse = response.json();
    assert!(payment.success);
    assert_eq!(payment.tokens, Some(Tokens(650_000)));
    assert_eq!(payment.rate, Some(1_300));
    assert_eq!(payment.bonus_applied, Some(false));
    assert_eq!(payment.phase, Some(Phase::PreSale));

    let status: StatusResponse = h.server.get("/status").await.json();
    assert_eq!(status.phase, Phase::PreSale);
    assert_eq!(status.stats.investor_count, 1);
    assert_eq!(status.stats.presale_raised, Currency(500));
    assert_eq!(status.stats.held_funds, Currency(500));
}

#[tokio::test]
async fn test_large_payment_gets_bonus() {
    let (h, _guard) = create_presale_server();

    let payment: PaymentResponse = pay(&h.server, "alice", 1_000).await.json();
    assert_eq!(payment.bonus_applied, Some(true));
    assert_eq!(payment.rate, Some(1_560));
    assert_eq!(payment.tokens, Some(Tokens(1_560_000)));
}

#[tokio::test]
async fn test_payment_before_presale_conflicts() {
    let (h, _guard) = create_test_server();

    let response = pay(&h.server, "alice", 500).await;

    assert_eq!(response.status_code().as_u16(), 409);
    let payment: PaymentResponse = response.json();
    assert!(!payment.success);
    assert!(payment.error.is_some());
}

#[tokio::test]
async fn test_zero_payment_rejected() {
    let (h, _guard) = create_presale_server();

    let response = pay(&h.server, "alice", 0).await;

    assert_eq!(response.status_code().as_u16(), 400);
}

#[tokio::test]
async fn test_empty_payer_rejected() {
    let (h, _guard) = create_presale_server();

    let response = pay(&h.server, "   ", 500).await;

    assert_eq!(response.status_code().as_u16(), 400);
    let payment: PaymentResponse = response.json();
    assert!(payment.error.unwrap().contains("Invalid payment"));
}

#[tokio::test]
async fn test_invalid_json_body() {
    let (h, _guard) = create_presale_server();

    let response = h
        .server
        .post("/payment")
        .bytes(bytes::Bytes::from("not valid json"))
        .content_type("application/json")
        .await;

    assert!(response.status_code().is_client_error());
}

// =============================================================================
// QUOTE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_quote_does_not_purchase() {
    let (h, _guard) = create_presale_server();

    let response = h.server.post("/quote").json(&json!({ "amount": 1_000 })).await;

    response.assert_status_ok();
    let quote: QuoteResponse = response.json();
    let quote = quote.quote.unwrap();
    assert!(quote.bonus_applied);
    assert_eq!(quote.tokens, Tokens(1_560_000));

    let status: StatusResponse = h.server.get("/status").await.json();
    assert_eq!(status.stats.presale_tokens_sold, Tokens::ZERO);
}

#[tokio::test]
async fn test_quote_before_presale_conflicts() {
    let (h, _guard) = create_test_server();

    let response = h.server.post("/quote").json(&json!({ "amount": 10 })).await;

    assert_eq!(response.status_code().as_u16(), 409);
}

// =============================================================================
// BALANCE AND EVENTS TESTS
// =============================================================================

#[tokio::test]
async fn test_balance_after_purchase() {
    let (h, _guard) = create_presale_server();
    pay(&h.server, "alice", 500).await.assert_status_ok();

    let response = h.server.get("/balance/alice").await;

    response.assert_status_ok();
    let balance: BalanceResponse = response.json();
    assert_eq!(balance.address, "alice");
    assert_eq!(balance.tokens, Some(Tokens(650_000)));

    let unknown: BalanceResponse = h.server.get("/balance/bob").await.json();
    assert_eq!(unknown.tokens, Some(Tokens::ZERO));
}

#[tokio::test]
async fn test_events_follow_commit_order() {
    let (h, _guard) = create_presale_server();
    pay(&h.server, "alice", 500).await.assert_status_ok();

    let events: EventsResponse = h.server.get("/events").await.json();

    assert_eq!(events.events.len(), 2);
    assert!(matches!(
        events.events[0],
        SaleEvent::PhaseChanged {
            from: Phase::Preparing,
            to: Phase::PreSale,
            ..
        }
    ));
    assert!(matches!(
        events.events[1],
        SaleEvent::TokensPurchased { tokens: Tokens(650_000), .. }
    ));

    let last: EventsResponse = h.server.get("/events?limit=1").await.json();
    assert_eq!(last.events, events.events[1..].to_vec());
}

// =============================================================================
// ADMIN ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_admin_requires_operator_header() {
    let (h, _guard) = create_presale_server();

    let response = h.server.post("/admin/halt").await;

    assert_eq!(response.status_code().as_u16(), 403);
}

#[tokio::test]
async fn test_admin_rejects_non_operator() {
    let (h, _guard) = create_presale_server();

    let response = admin(&h.server, "halt", "mallory").await;

    assert_eq!(response.status_code().as_u16(), 403);
    let body: AdminResponse = response.json();
    assert!(!body.success);
    assert_eq!(body.phase, Phase::Preparing);
}

#[tokio::test]
async fn test_begin_commits_presale() {
    let (h, _guard) = create_presale_server();

    let response = admin(&h.server, "begin", "ops").await;

    response.assert_status_ok();
    let body: AdminResponse = response.json();
    assert_eq!(body.phase, Phase::PreSale);
    assert_eq!(body.released, None);
}

#[tokio::test]
async fn test_halt_blocks_payments_until_resume() {
    let (h, _guard) = create_presale_server();
    pay(&h.server, "alice", 500).await.assert_status_ok();

    let halted: AdminResponse = admin(&h.server, "halt", "ops").await.json();
    assert_eq!(halted.phase, Phase::Halt);

    assert_eq!(pay(&h.server, "bob", 500).await.status_code().as_u16(), 409);
    assert_eq!(
        admin(&h.server, "halt", "ops").await.status_code().as_u16(),
        409
    );

    let resumed: AdminResponse = admin(&h.server, "resume", "ops").await.json();
    assert_eq!(resumed.phase, Phase::PreSale);

    pay(&h.server, "bob", 500).await.assert_status_ok();
}

#[tokio::test]
async fn test_conclude_after_main_sale() {
    let (h, _guard) = create_presale_server();
    pay(&h.server, "alice", 500).await.assert_status_ok();

    h.clock.set(at(25, 0));
    pay(&h.server, "bob", 300).await.assert_status_ok();

    let early = admin(&h.server, "conclude", "ops").await;
    assert_eq!(early.status_code().as_u16(), 409);

    h.clock.set(at(51, 0));
    let response = admin(&h.server, "conclude", "ops").await;

    response.assert_status_ok();
    let body: AdminResponse = response.json();
    assert_eq!(body.phase, Phase::Success);
    assert_eq!(body.released, Some(Currency(800)));
    assert_eq!(
        h.treasury.lock().unwrap().releases(),
        &[(Address::new("beneficiary"), Currency(800))]
    );

    let status: StatusResponse = h.server.get("/status").await.json();
    assert_eq!(status.stats.held_funds, Currency::ZERO);
}

#[tokio::test]
async fn test_conclude_while_halted_aborts() {
    let (h, _guard) = create_presale_server();
    pay(&h.server, "alice", 500).await.assert_status_ok();
    admin(&h.server, "halt", "ops").await.assert_status_ok();

    let body: AdminResponse = admin(&h.server, "conclude", "ops").await.json();

    assert_eq!(body.phase, Phase::Aborted);
    assert_eq!(body.released, Some(Currency(500)));
}

// =============================================================================
// SNAPSHOT TESTS
// =============================================================================

#[tokio::test]
async fn test_snapshot_decodes() {
    let (h, _guard) = create_presale_server();
    pay(&h.server, "alice", 500).await.assert_status_ok();

    let response = h.server.get("/snapshot").await;

    response.assert_status_ok();
    let body: SnapshotResponse = response.json();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(body.data.unwrap())
        .unwrap();
    let snapshot = snapshot_from_bytes(&bytes).unwrap();
    assert_eq!(snapshot.state.phase, Phase::PreSale);
    assert_eq!(snapshot.state.presale.raised, Currency(500));
}

// =============================================================================
// PERSISTENCE FAILURE TESTS
// =============================================================================

#[tokio::test]
async fn test_unpersisted_payment_is_server_error() {
    let store = FlakyStore::default();
    let (h, _guard) = create_persisted_server(&store);
    store.failing.store(true, Ordering::SeqCst);

    let response = pay(&h.server, "alice", 500).await;

    assert_eq!(response.status_code().as_u16(), 500);
    let payment: PaymentResponse = response.json();
    assert!(!payment.success);
    assert!(payment.error.unwrap().contains("not persisted"));

    // The purchase committed in memory even though the write failed.
    let status: StatusResponse = h.server.get("/status").await.json();
    assert_eq!(status.stats.presale_raised, Currency(500));
}

#[tokio::test]
async fn test_mutations_refused_until_snapshot_saved() {
    let store = FlakyStore::default();
    let (h, _guard) = create_persisted_server(&store);
    pay(&h.server, "alice", 500).await.assert_status_ok();
    assert_eq!(store.saved.load(Ordering::SeqCst), 1);

    store.failing.store(true, Ordering::SeqCst);
    assert_eq!(pay(&h.server, "bob", 500).await.status_code().as_u16(), 500);

    let refused = pay(&h.server, "carol", 500).await;
    assert_eq!(refused.status_code().as_u16(), 503);
    let refused_admin = admin(&h.server, "halt", "ops").await;
    assert_eq!(refused_admin.status_code().as_u16(), 503);
    let body: AdminResponse = refused_admin.json();
    assert_eq!(body.phase, Phase::PreSale);

    // Reads stay available and show nothing from the refused calls.
    let status: StatusResponse = h.server.get("/status").await.json();
    assert_eq!(status.stats.investor_count, 2);
    assert_eq!(status.phase, Phase::PreSale);

    store.failing.store(false, Ordering::SeqCst);
    pay(&h.server, "carol", 500).await.assert_status_ok();
    // The pending snapshot and the new purchase were both written.
    assert_eq!(store.saved.load(Ordering::SeqCst), 3);

    let status: StatusResponse = h.server.get("/status").await.json();
    assert_eq!(status.stats.investor_count, 3);
}

#[tokio::test]
async fn test_rejected_call_does_not_write_snapshot() {
    let store = FlakyStore::default();
    let (h, _guard) = create_persisted_server(&store);

    assert_eq!(pay(&h.server, "alice", 0).await.status_code().as_u16(), 400);

    assert_eq!(store.saved.load(Ordering::SeqCst), 0);
}

// =============================================================================
// ERROR HANDLING TESTS
// =============================================================================

#[test]
fn test_error_response_uses_engine_status() {
    let overflow = error_response(&SaleError::Overflow);
    assert_eq!(overflow.status().as_u16(), 400);

    let storage = error_response(&SaleError::Storage("disk".to_string()));
    assert_eq!(storage.status().as_u16(), 500);
}

#[tokio::test]
async fn test_404_on_unknown_endpoint() {
    let (h, _guard) = create_test_server();

    let response = h.server.get("/unknown").await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_cors_allows_local_console_by_default() {
    let (h, _guard) = create_test_server();

    let response = h
        .server
        .method(axum::http::Method::OPTIONS, "/payment")
        .add_header(axum::http::header::ORIGIN, header("http://localhost:3000"))
        .add_header(
            axum::http::header::ACCESS_CONTROL_REQUEST_METHOD,
            header("POST"),
        )
        .await;

    assert_eq!(
        response.header(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN),
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn test_method_not_allowed() {
    let (h, _guard) = create_test_server();

    // /payment is POST only
    let response = h.server.get("/payment").await;
    assert_eq!(response.status_code().as_u16(), 405);
}

// =============================================================================
// AUTHENTICATION MIDDLEWARE TESTS
// =============================================================================

/// Create a test server with authentication enabled.
/// Must be called while holding AUTH_TEST_MUTEX.
fn create_auth_test_server(api_key: &str) -> TestServer {
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var(API_KEY_VAR, api_key) };
    build_harness().server
}

/// Clean up auth env var after test.
fn cleanup_auth_env() {
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var(API_KEY_VAR) };
}

#[tokio::test]
async fn test_auth_valid_bearer_token() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let api_key = "test-secret-key-12345";
    let server = create_auth_test_server(api_key);

    let response = server
        .get("/status")
        .add_header(
            axum::http::header::AUTHORIZATION,
            header(&format!("Bearer {}", api_key)),
        )
        .await;

    cleanup_auth_env();

    response.assert_status_ok();
    let status: StatusResponse = response.json();
    assert_eq!(status.phase, Phase::Preparing);
}

#[tokio::test]
async fn test_auth_valid_raw_token() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let api_key = "test-raw-key-67890";
    let server = create_auth_test_server(api_key);

    let response = server
        .get("/status")
        .add_header(axum::http::header::AUTHORIZATION, header(api_key))
        .await;

    cleanup_auth_env();

    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_invalid_token_rejected() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("correct-key");

    let response = server
        .get("/status")
        .add_header(axum::http::header::AUTHORIZATION, header("Bearer wrong-key"))
        .await;

    cleanup_auth_env();

    assert_eq!(response.status_code().as_u16(), 401);
}

#[tokio::test]
async fn test_auth_missing_header_rejected() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("required-key");

    let response = pay(&server, "alice", 500).await;

    cleanup_auth_env();

    assert_eq!(response.status_code().as_u16(), 401);
}

#[tokio::test]
async fn test_auth_bearer_prefix_only_rejected() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("actual-key");

    let response = server
        .get("/status")
        .add_header(axum::http::header::AUTHORIZATION, header("Bearer "))
        .await;

    cleanup_auth_env();

    assert_eq!(response.status_code().as_u16(), 401);
}

#[tokio::test]
async fn test_auth_health_endpoint_bypasses_auth() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("secret-key-for-bypass-test");

    let response = server.get("/health").await;

    cleanup_auth_env();

    response.assert_status_ok();
}
