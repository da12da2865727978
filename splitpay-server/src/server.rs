//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1/payments", api::payments::router())
        .nest("/api/v1/service", api::service::router())
        .nest("/api/v1/admin", api::admin::router())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Engine;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use splitpay_core::booking::BookingAggregate;
    use splitpay_core::config::{
        AdminConfig, ConfigStore, ExpiryConfig, GatewayConfig, LogFormat, MerchantConfig,
        ServerConfig, SharedConfig,
    };
    use splitpay_core::events::domain_event_channel;
    use splitpay_core::gateway::MinorUnitScale;
    use splitpay_core::ledger::SplitLedger;
    use splitpay_core::store::PgSplitStore;
    use splitpay_sdk::objects::{GatewayWebhookPayload, GetBookingRequest, WebhookMetadata};
    use splitpay_sdk::signature::{
        ADMIN_AUTH_HEADER, GATEWAY_SIGNATURE_HEADER, SIGNATURE_HEADER, SignedObject, sign_body,
    };
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::RwLock;
    use tower::ServiceExt;
    use url::Url;
    use uuid::Uuid;

    const MERCHANT_SECRET: &[u8] = b"merchant-secret";
    const WEBHOOK_SECRET: &[u8] = b"webhook-secret";
    const ADMIN_SECRET: &str = "admin-secret";

    fn admin_hash() -> String {
        use argon2::{
            Argon2, PasswordHasher,
            password_hash::{SaltString, rand_core::OsRng},
        };
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(ADMIN_SECRET.as_bytes(), &salt)
            .unwrap()
            .to_string()
    }

    /// A router whose database is never reached by these tests.
    fn test_router() -> Router {
        let gateway = GatewayConfig {
            base_url: Url::parse("http://127.0.0.1:9/").unwrap(),
            secret_key: "sk_test".to_string(),
            webhook_secret: WEBHOOK_SECRET.into(),
            minor_unit_scale: MinorUnitScale::default(),
            timeout: Duration::from_secs(1),
        };
        let config = SharedConfig {
            server: Arc::new(RwLock::new(ServerConfig {
                listen: "127.0.0.1:0".parse().unwrap(),
                public_base_url: None,
                log_format: LogFormat::Pretty,
            })),
            admin: Arc::new(RwLock::new(AdminConfig::new(admin_hash()))),
            merchant: Arc::new(RwLock::new(MerchantConfig::new(
                "Venue Marketplace".to_string(),
                MERCHANT_SECRET,
            ))),
            gateway: Arc::new(RwLock::new(gateway.clone())),
            expiry: ConfigStore::new(ExpiryConfig::default()),
        };

        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://splitpay@127.0.0.1:9/splitpay")
            .unwrap();
        let store = Arc::new(PgSplitStore::new(pool));
        let (events_tx, _events_rx) = domain_event_channel();
        let engine: Engine = Engine::new(
            SplitLedger::new(Arc::clone(&store), time::Duration::hours(48)),
            BookingAggregate::new(store),
            Arc::new(gateway.http_gateway()),
            events_tx,
        );
        build_router(AppState::new(config, engine))
    }

    fn webhook_body(event_type: &str) -> Vec<u8> {
        serde_json::to_vec(&GatewayWebhookPayload {
            event_type: event_type.to_string(),
            reference: "SPL-test".to_string(),
            amount: 15_000,
            currency: "NGN".into(),
            metadata: WebhookMetadata {
                request_id: Uuid::now_v7(),
                booking_id: None,
            },
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_service_api_requires_signature() {
        let response = test_router()
            .oneshot(
                Request::post("/api/v1/service/bookings/status")
                    .body(Body::from(r#"{"booking_id":"0192a3c4-0000-7000-8000-000000000001"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_service_api_rejects_wrong_key() {
        let signed = SignedObject::new(
            GetBookingRequest {
                booking_id: Uuid::now_v7(),
            },
            b"some-other-secret",
        )
        .unwrap();
        let response = test_router()
            .oneshot(
                Request::post("/api/v1/service/bookings/status")
                    .header(SIGNATURE_HEADER, signed.to_header())
                    .body(Body::from(signed.json))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_signature_checks() {
        let body = webhook_body("charge.success");

        let missing = test_router()
            .oneshot(
                Request::post("/api/v1/payments/webhook")
                    .body(Body::from(body.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let forged = test_router()
            .oneshot(
                Request::post("/api/v1/payments/webhook")
                    .header(GATEWAY_SIGNATURE_HEADER, sign_body(&body, b"forged"))
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_unsupported_event() {
        let body = webhook_body("transfer.success");
        let response = test_router()
            .oneshot(
                Request::post("/api/v1/payments/webhook")
                    .header(GATEWAY_SIGNATURE_HEADER, sign_body(&body, WEBHOOK_SECRET))
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_webhook_rejects_malformed_body() {
        let body = br#"{"event_type":"charge.success"}"#.to_vec();
        let response = test_router()
            .oneshot(
                Request::post("/api/v1/payments/webhook")
                    .header(GATEWAY_SIGNATURE_HEADER, sign_body(&body, WEBHOOK_SECRET))
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_api_requires_secret() {
        let uri = format!("/api/v1/admin/bookings/{}", Uuid::now_v7());

        let missing = test_router()
            .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = test_router()
            .oneshot(
                Request::get(uri.as_str())
                    .header(ADMIN_AUTH_HEADER, "not-the-secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }
}
