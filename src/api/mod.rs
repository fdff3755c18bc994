//! HTTP surface: axum router, handlers, DTOs and error mapping.
//!
//! - `routes.rs`: handlers, one per endpoint
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: `AppError` to status code mapping, panic responses

use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::application::AccountService;

pub mod dto;
pub mod errors;
pub mod routes;

/// HTTP layer settings.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub request_timeout: Duration,
    /// Recorded on every request span as `service`
    pub service_name: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            service_name: "saldo".to_string(),
        }
    }
}

/// Build the full HTTP router over a shared account service.
pub fn build_app(service: AccountService, settings: &HttpSettings) -> Router {
    let api = Router::new()
        .route("/users", post(routes::create_user))
        .route("/users/:username/balance", get(routes::get_balance))
        .route("/users/:username/transactions", get(routes::list_transactions))
        .route("/transactions/credit", post(routes::deposit))
        .route("/transactions/debit", post(routes::withdraw));

    // Credentials cannot be combined with a literal `*` origin, so the
    // request origin is echoed back instead.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true);

    let service_name = settings.service_name.clone();

    Router::new()
        .route("/health", get(routes::health))
        .nest("/api", api)
        .with_state(service)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(
                    move |request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("-");
                        tracing::info_span!(
                            "http_request",
                            service = %service_name,
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id,
                        )
                    },
                ))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::custom(errors::handle_panic))
                .layer(TimeoutLayer::new(settings.request_timeout))
                .layer(cors),
        )
}
