//! HTTP API server with observability for the booking portal.
//!
//! Provides REST endpoints for accounts, appointment booking, admin
//! aggregation, and the agreement status callback, with structured
//! logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod policy;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use booking::{
    BookingOrchestrator, InMemoryAgreementGateway, InMemoryMailer, InMemoryPaymentGateway,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::AuthService;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/auth/signup", post(routes::auth::signup::<S>))
        .route("/auth/login", post(routes::auth::login::<S>))
        .route(
            "/auth/forgot-password",
            post(routes::auth::forgot_password::<S>),
        )
        .route(
            "/auth/reset-password",
            post(routes::auth::reset_password::<S>),
        )
        .route("/auth/user", get(routes::auth::current_user))
        .route("/appointments", post(routes::appointments::book::<S>))
        .route(
            "/appointments/my",
            get(routes::appointments::list_mine::<S>),
        )
        .route("/appointments/{id}", get(routes::appointments::get::<S>))
        .route(
            "/appointments/{id}",
            patch(routes::appointments::update::<S>),
        )
        .route("/admin/appointments", get(routes::admin::list::<S>))
        .route("/admin/stats", get(routes::admin::stats::<S>))
        .route("/payment/process", post(routes::payment::process::<S>))
        .route("/agreement/webhook", post(routes::agreement::webhook::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state with in-memory gateways.
///
/// The gateway handles stored in the state share interior state with
/// the copies handed to the orchestrator and auth service.
pub fn create_default_state<S: Store + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    let payment = InMemoryPaymentGateway::new();
    let agreement = InMemoryAgreementGateway::new();
    let mailer = InMemoryMailer::new();

    let auth = AuthService::new(store.clone(), mailer.clone());
    let orchestrator = BookingOrchestrator::new(
        store.clone(),
        payment.clone(),
        agreement.clone(),
        mailer.clone(),
    );

    Arc::new(AppState {
        store,
        auth,
        orchestrator,
        payment,
        agreement,
        mailer,
    })
}
