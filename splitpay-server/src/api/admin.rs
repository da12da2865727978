//! Admin API handlers.
//!
//! These endpoints are for operators and require the
//! `Splitpay-Admin-Authorization` header with the plaintext admin secret.
//!
//! # Endpoints
//!
//! - `GET  /bookings/{booking_id}`      - booking with all split requests
//! - `POST /splits/{request_id}/expire` - expire a pending request now

use axum::{
    Json, Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use splitpay_core::reconciliation::ReconcileError;
use splitpay_sdk::objects::{BookingResponse, SplitResponse};
use uuid::Uuid;

use super::{booking_to_response, reconcile_error_status, split_to_response};
use crate::api::extractors::AdminAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings/{booking_id}", get(show_booking))
        .route("/splits/{request_id}/expire", post(expire_split))
}

async fn show_booking(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AdminApiError> {
    let booking = state
        .engine
        .bookings()
        .get(booking_id)
        .await
        .map_err(ReconcileError::from)?;
    let splits = state
        .engine
        .ledger()
        .requests_for_booking(booking_id)
        .await
        .map_err(ReconcileError::from)?;
    Ok(Json(booking_to_response(&booking, &splits)))
}

/// Expire a request ahead of its deadline. A paid request is returned
/// unchanged.
async fn expire_split(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(request_id): Path<Uuid>,
) -> Result<Json<SplitResponse>, AdminApiError> {
    let request = state.engine.expire_request(request_id).await?;
    tracing::info!(
        request_id = %request_id,
        status = %request.status,
        "Admin expired split request"
    );
    Ok(Json(split_to_response(&request)))
}

#[derive(Debug)]
pub(crate) struct AdminApiError(ReconcileError);

impl From<ReconcileError> for AdminApiError {
    fn from(value: ReconcileError) -> Self {
        Self(value)
    }
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> Response {
        reconcile_error_status(&self.0).into_response()
    }
}
