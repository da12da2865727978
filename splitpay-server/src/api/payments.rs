//! Payment outcome endpoints.
//!
//! Both channels feed the same engine operation; whichever arrives second
//! finds the request already paid and changes nothing.
//!
//! # Endpoints
//!
//! - `POST /callback` - the payer's browser, back from the gateway checkout
//! - `POST /webhook`  - server-to-server notification from the gateway

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use bytes::Bytes;
use splitpay_core::gateway::{GatewayError, PaymentOutcome};
use splitpay_core::reconciliation::{ReconcileError, ReconciliationResult};
use splitpay_sdk::objects::{CallbackOutcome, CallbackResponse, PaymentCallbackRequest, WebhookAck};
use splitpay_sdk::signature::GATEWAY_SIGNATURE_HEADER;

use super::reconcile_error_status;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/callback", post(payment_callback))
        .route("/webhook", post(gateway_webhook))
}

/// `POST /callback`: report from the payer's browser.
///
/// The body is untrusted; the engine verifies it with the gateway before
/// anything is written.
async fn payment_callback(
    State(state): State<AppState>,
    Json(payload): Json<PaymentCallbackRequest>,
) -> Result<Json<CallbackResponse>, CallbackError> {
    let request_id = payload.request_id;
    let result = state
        .engine
        .handle_payment_outcome(PaymentOutcome::from(payload))
        .await
        .map_err(CallbackError)?;

    let outcome = match &result {
        ReconciliationResult::Applied { .. } if result.booking_confirmed() => {
            CallbackOutcome::Confirmed
        }
        ReconciliationResult::Applied { .. } => CallbackOutcome::PartiallyPaid,
        ReconciliationResult::AlreadyTerminal { .. } => CallbackOutcome::AlreadyProcessed,
        ReconciliationResult::Declined { .. } => CallbackOutcome::Declined,
    };

    Ok(Json(CallbackResponse {
        request_id,
        outcome,
        booking_confirmed: result.booking_confirmed(),
    }))
}

#[derive(Debug)]
struct CallbackError(ReconcileError);

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        reconcile_error_status(&self.0).into_response()
    }
}

/// `POST /webhook`: gateway notification.
///
/// A non-2xx answer makes the gateway retry, so only failures a retry could
/// fix are reported as errors.
async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, WebhookError> {
    let signature = headers
        .get(GATEWAY_SIGNATURE_HEADER)
        .ok_or(WebhookError::MissingSignature)?
        .to_str()
        .map_err(|_| WebhookError::MissingSignature)?;

    let verifier = state.config.gateway.read().await.webhook_verifier();
    let outcome = match verifier.verify_webhook(signature, &body) {
        Ok(outcome) => outcome,
        Err(GatewayError::UnsupportedEvent(event_type)) => {
            tracing::debug!(event_type = %event_type, "Ignoring unsupported webhook event");
            return Ok(Json(WebhookAck { received: true }));
        }
        Err(GatewayError::InvalidSignature(e)) => {
            tracing::warn!(error = %e, "Rejected webhook with bad signature");
            return Err(WebhookError::InvalidSignature);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed webhook");
            return Err(WebhookError::Malformed);
        }
    };

    match state.engine.handle_payment_outcome(outcome).await {
        Ok(_) => Ok(Json(WebhookAck { received: true })),
        Err(e) if e.acknowledges_webhook() => {
            tracing::info!(error = %e, "Webhook acknowledged without change");
            Ok(Json(WebhookAck { received: true }))
        }
        Err(e) => Err(WebhookError::Reconcile(e)),
    }
}

#[derive(Debug)]
enum WebhookError {
    MissingSignature,
    InvalidSignature,
    Malformed,
    Reconcile(ReconcileError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            WebhookError::MissingSignature => (
                StatusCode::UNAUTHORIZED,
                "missing Splitpay-Gateway-Signature header",
            )
                .into_response(),
            WebhookError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, "signature verification failed").into_response()
            }
            WebhookError::Malformed => {
                (StatusCode::BAD_REQUEST, "invalid webhook body").into_response()
            }
            WebhookError::Reconcile(e) => reconcile_error_status(&e).into_response(),
        }
    }
}
