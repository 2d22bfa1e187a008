//! # phasesale HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Phase and sale statistics
//! - `GET /events` - Most recent sale events
//! - `GET /balance/{address}` - Ledger balance of a holder
//! - `GET /snapshot` - Base64 binary snapshot of the sale
//! - `POST /payment` - Submit a payment
//! - `POST /quote` - Price a payment without submitting it
//! - `POST /admin/begin|halt|resume|conclude` - Operator commands (`X-Operator` header)
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `PHASESALE_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `PHASESALE_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `PHASESALE_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{API_KEY_ENV, get_api_key_from_env};
pub use handlers::{OPERATOR_HEADER, error_response, error_status};
pub use middleware::{RATE_LIMIT_ENV, create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    AdminResponse, BalanceResponse, ErrorResponse, EventsQuery, EventsResponse, HealthResponse,
    MAX_ADDRESS_LENGTH, PaymentRequest, PaymentResponse, QuoteRequest, QuoteResponse,
    SnapshotResponse, StatusResponse, parse_address,
};

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use phasesale_core::{SaleEngine, SaleError, SaleEvent, SnapshotStore};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Environment variable holding the allowed CORS origins.
pub const CORS_ORIGINS_ENV: &str = "PHASESALE_CORS_ORIGINS";

/// Number of events kept for `GET /events`.
pub const JOURNAL_CAPACITY: usize = 512;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// The hosted sale. Mutating handlers hold the write lock for the whole call.
    pub engine: Arc<RwLock<SaleEngine>>,
    /// Recent events drained from the engine, oldest first.
    pub journal: Arc<RwLock<VecDeque<SaleEvent>>>,
    /// Where snapshots are written after each committed change, if persistent.
    store: Option<Arc<dyn SnapshotStore>>,
    /// Set while the engine holds committed state the store has not accepted.
    unsaved: Arc<AtomicBool>,
}

impl AppState {
    /// State for a volatile sale.
    #[must_use]
    pub fn new(engine: SaleEngine) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
            journal: Arc::new(RwLock::new(VecDeque::new())),
            store: None,
            unsaved: Arc::new(AtomicBool::new(false)),
        }
    }

    /// State for a sale persisted in `store`.
    #[must_use]
    pub fn with_store(engine: SaleEngine, store: impl SnapshotStore + 'static) -> Self {
        Self {
            store: Some(Arc::new(store)),
            ..Self::new(engine)
        }
    }

    /// Whether the last committed state failed to persist.
    #[must_use]
    pub fn is_unsaved(&self) -> bool {
        self.unsaved.load(Ordering::SeqCst)
    }

    /// Drain committed events from `engine`: log them, journal them, and
    /// persist the new state.
    ///
    /// Called with the engine write lock held, so snapshots are written in
    /// commit order. An error means the call committed in memory (and in the
    /// ledger) but the snapshot is stale.
    pub async fn publish(&self, engine: &mut SaleEngine) -> Result<(), SaleError> {
        let events = engine.drain_events();
        if events.is_empty() {
            return Ok(());
        }

        for event in &events {
            log_event(event);
        }

        {
            let mut journal = self.journal.write().await;
            for event in events {
                if journal.len() >= JOURNAL_CAPACITY {
                    journal.pop_front();
                }
                journal.push_back(event);
            }
        }

        self.persist(engine)
    }

    /// Retry a failed snapshot write. Mutating handlers call this first and
    /// refuse the request while it fails.
    pub fn ensure_persisted(&self, engine: &SaleEngine) -> Result<(), SaleError> {
        if !self.is_unsaved() {
            return Ok(());
        }
        tracing::warn!("Retrying sale snapshot before accepting a mutation");
        self.persist(engine)
    }

    fn persist(&self, engine: &SaleEngine) -> Result<(), SaleError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        match store.save_snapshot(&engine.export_snapshot()) {
            Ok(()) => {
                if self.unsaved.swap(false, Ordering::SeqCst) {
                    tracing::info!("Sale snapshot persisted again");
                }
                Ok(())
            }
            Err(e) => {
                self.unsaved.store(true, Ordering::SeqCst);
                tracing::error!(error = %e, "Failed to persist sale snapshot");
                Err(e)
            }
        }
    }
}

fn log_event(event: &SaleEvent) {
    match event {
        SaleEvent::PhaseChanged {
            from,
            to,
            description,
        } => tracing::info!(event = event.kind(), %from, %to, "{}", description),
        SaleEvent::TokensPurchased {
            payer,
            amount,
            tokens,
        } => tracing::info!(event = event.kind(), %payer, %amount, %tokens, "Tokens purchased"),
        SaleEvent::SaleHalted { by, saved } => {
            tracing::warn!(event = event.kind(), operator = %by, %saved, "Sale halted")
        }
        SaleEvent::SaleResumed { by, restored } => {
            tracing::info!(event = event.kind(), operator = %by, %restored, "Sale resumed")
        }
        SaleEvent::FundsReleased {
            beneficiary,
            amount,
        } => tracing::info!(event = event.kind(), %beneficiary, %amount, "Funds released"),
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const LOCAL_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:8080",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:8080",
];

fn origin_list<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<HeaderValue> {
    raw.map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = o, "Ignoring malformed CORS origin");
                None
            }
        })
        .collect()
}

/// CORS for payment relays and operator consoles.
///
/// `PHASESALE_CORS_ORIGINS` is `*`, or a comma-separated origin list. Unset
/// or without a usable entry, only local consoles are allowed.
fn build_cors_layer() -> CorsLayer {
    let configured = std::env::var(CORS_ORIGINS_ENV).ok();
    if configured.as_deref() == Some("*") {
        tracing::warn!("CORS open to every origin");
        return CorsLayer::permissive();
    }

    let mut origins = configured
        .as_deref()
        .map(|list| origin_list(list.split(',')))
        .unwrap_or_default();
    if origins.is_empty() {
        origins = origin_list(LOCAL_ORIGINS.into_iter());
    }
    tracing::info!(origins = origins.len(), "CORS origins configured");

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(OPERATOR_HEADER),
        ])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting - if enabled
/// 5. Authentication - if `PHASESALE_API_KEY` is set
pub fn create_router(state: AppState) -> Router {
    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set {} to enable authentication.",
            API_KEY_ENV
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/events", get(handlers::events_handler))
        .route("/balance/{address}", get(handlers::balance_handler))
        .route("/snapshot", get(handlers::snapshot_handler))
        .route("/payment", post(handlers::payment_handler))
        .route("/quote", post(handlers::quote_handler))
        .route("/admin/begin", post(handlers::begin_handler))
        .route("/admin/halt", post(handlers::halt_handler))
        .route("/admin/resume", post(handlers::resume_handler))
        .route("/admin/conclude", post(handlers::conclude_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(axum::extract::DefaultBodyLimit::max(64 * 1024)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Start the HTTP server and run until Ctrl+C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), SaleError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| SaleError::Storage(format!("Bind failed: {}", e)))?;

    tracing::info!("phasesale HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| SaleError::Storage(format!("Server error: {}", e)))
}
