//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState, JOURNAL_CAPACITY,
    types::{
        AdminResponse, BalanceResponse, ErrorResponse, EventsQuery, EventsResponse,
        HealthResponse, PaymentRequest, PaymentResponse, QuoteRequest, QuoteResponse, SnapshotResponse,
        StatusResponse, parse_address,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use phasesale_core::{Address, Currency, SaleEngine, SaleError, snapshot_to_bytes};

/// Header carrying the operator address for `/admin/*` commands.
pub const OPERATOR_HEADER: &str = "x-operator";

/// Default number of events returned by `GET /events`.
const DEFAULT_EVENT_LIMIT: usize = 100;

/// HTTP status for an engine error.
pub fn error_status(error: &SaleError) -> StatusCode {
    match error {
        SaleError::Configuration(_) | SaleError::ZeroAmount | SaleError::Overflow => {
            StatusCode::BAD_REQUEST
        }
        SaleError::Unauthorized => StatusCode::FORBIDDEN,
        SaleError::InvalidPhase(_)
        | SaleError::Halted
        | SaleError::CapExceeded { .. }
        | SaleError::AlreadyHalted
        | SaleError::NotHalted
        | SaleError::NotEligible => StatusCode::CONFLICT,
        SaleError::LedgerTransferFailed(_)
        | SaleError::WithdrawalFailed(_)
        | SaleError::Storage(_)
        | SaleError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Plain error body for endpoints without a dedicated response type.
pub fn error_response(error: &SaleError) -> Response {
    (error_status(error), Json(ErrorResponse::new(error.to_string()))).into_response()
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Phase and statistics. Never commits a transition.
pub async fn status_handler(State(state): State<AppState>) -> Response {
    let engine = state.engine.read().await;
    let effective_phase = match engine.current_phase() {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "Phase evaluation failed");
            return error_response(&e);
        }
    };

    let response = StatusResponse {
        phase: engine.phase(),
        effective_phase,
        description: effective_phase.description().to_string(),
        stats: engine.stats(),
    };

    (StatusCode::OK, Json(response)).into_response()
}

// =============================================================================
// EVENTS HANDLER
// =============================================================================

pub async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .min(JOURNAL_CAPACITY);
    let journal = state.journal.read().await;
    let skip = journal.len().saturating_sub(limit);
    let events = journal.iter().skip(skip).cloned().collect();

    (StatusCode::OK, Json(EventsResponse { events }))
}

// =============================================================================
// BALANCE HANDLER
// =============================================================================

pub async fn balance_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> impl IntoResponse {
    let address = match parse_address(&raw) {
        Ok(a) => a,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(BalanceResponse::error(raw, format!("Invalid address: {}", e))),
            );
        }
    };

    let engine = state.engine.read().await;
    match engine.balance_of(&address) {
        Ok(tokens) => (
            StatusCode::OK,
            Json(BalanceResponse::success(&address, tokens)),
        ),
        Err(e) => (
            error_status(&e),
            Json(BalanceResponse::error(raw, e.to_string())),
        ),
    }
}

// =============================================================================
// SNAPSHOT HANDLER
// =============================================================================

pub async fn snapshot_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.engine.read().await.export_snapshot();
    match snapshot_to_bytes(&snapshot) {
        Ok(bytes) => (StatusCode::OK, Json(SnapshotResponse::success(&bytes))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(SnapshotResponse::error(format!("Snapshot failed: {}", e))),
        ),
    }
}

// =============================================================================
// PAYMENT HANDLER
// =============================================================================

pub async fn payment_handler(
    State(state): State<AppState>,
    Json(request): Json<PaymentRequest>,
) -> impl IntoResponse {
    let payment = match request.to_payment() {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(PaymentResponse::error(format!("Invalid payment: {}", e))),
            );
        }
    };
    let payer = payment.payer.clone();

    let mut engine = state.engine.write().await;
    if let Err(e) = state.ensure_persisted(&engine) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(PaymentResponse::error(format!("Sale state not persisted: {}", e))),
        );
    }

    let result = engine.receive(payment);
    let published = state.publish(&mut engine).await;

    match (result, published) {
        (Ok(receipt), Ok(())) => (StatusCode::OK, Json(PaymentResponse::success(&receipt))),
        (Ok(receipt), Err(e)) => {
            tracing::error!(%payer, tokens = %receipt.tokens, "Payment credited but not persisted");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PaymentResponse::error(format!(
                    "Payment accepted but not persisted: {}",
                    e
                ))),
            )
        }
        (Err(e), _) => {
            tracing::info!(%payer, amount = request.amount, error = %e, "Payment rejected");
            (error_status(&e), Json(PaymentResponse::error(e.to_string())))
        }
    }
}

// =============================================================================
// QUOTE HANDLER
// =============================================================================

pub async fn quote_handler(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> impl IntoResponse {
    let engine = state.engine.read().await;
    match engine.quote(Currency(request.amount)) {
        Ok(quote) => (StatusCode::OK, Json(QuoteResponse::success(quote))),
        Err(e) => (error_status(&e), Json(QuoteResponse::error(e.to_string()))),
    }
}

// =============================================================================
// ADMIN HANDLERS
// =============================================================================

fn operator_from(headers: &HeaderMap) -> Option<Address> {
    headers
        .get(OPERATOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_address(v).ok())
}

/// Run one operator command under the write lock.
///
/// `command` returns the released amount for `conclude`, `None` otherwise.
async fn run_admin<F>(
    state: &AppState,
    headers: &HeaderMap,
    name: &'static str,
    command: F,
) -> (StatusCode, Json<AdminResponse>)
where
    F: FnOnce(&mut SaleEngine, &Address) -> Result<Option<Currency>, SaleError>,
{
    let mut engine = state.engine.write().await;

    let Some(operator) = operator_from(headers) else {
        tracing::warn!(command = name, "Operator command without X-Operator header");
        return (
            StatusCode::FORBIDDEN,
            Json(AdminResponse::error(
                engine.phase(),
                "Missing X-Operator header",
            )),
        );
    };

    if let Err(e) = state.ensure_persisted(&engine) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(AdminResponse::error(
                engine.phase(),
                format!("Sale state not persisted: {}", e),
            )),
        );
    }

    let result = command(&mut *engine, &operator);
    let published = state.publish(&mut engine).await;
    let phase = engine.phase();

    match (result, published) {
        (Ok(_), Err(e)) => {
            tracing::error!(command = name, %operator, %phase, "Operator command applied but not persisted");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AdminResponse::error(
                    phase,
                    format!("Command applied but not persisted: {}", e),
                )),
            )
        }
        (Ok(released), Ok(())) => {
            tracing::info!(command = name, %operator, %phase, "Operator command applied");
            let response = match released {
                Some(amount) => AdminResponse::concluded(phase, amount),
                None => AdminResponse::success(phase),
            };
            (StatusCode::OK, Json(response))
        }
        (Err(e), _) => {
            tracing::warn!(command = name, %operator, error = %e, "Operator command rejected");
            (
                error_status(&e),
                Json(AdminResponse::error(phase, e.to_string())),
            )
        }
    }
}

pub async fn begin_handler(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    run_admin(&state, &headers, "begin", |engine, operator| {
        engine.begin_sale(operator).map(|_| None)
    })
    .await
}

pub async fn halt_handler(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    run_admin(&state, &headers, "halt", |engine, operator| {
        engine.halt_sale(operator).map(|()| None)
    })
    .await
}

pub async fn resume_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    run_admin(&state, &headers, "resume", |engine, operator| {
        engine.resume_sale(operator).map(|_| None)
    })
    .await
}

pub async fn conclude_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    run_admin(&state, &headers, "conclude", |engine, operator| {
        engine.conclude_sale(operator).map(Some)
    })
    .await
}
