//! Service API handlers.
//!
//! These endpoints are called by the marketplace backend and require
//! a signed body verified via the `Splitpay-Signature` header.
//!
//! # Endpoints
//!
//! - `POST /bookings`          - register a new pending booking
//! - `POST /bookings/status`   - booking status with its split requests
//! - `POST /bookings/splits`   - split a booking among participants
//! - `POST /bookings/cancel`   - cancel a pending booking
//! - `POST /splits/recipient`  - record the registered payer of a request
//! - `POST /splits/initiate`   - start a gateway charge for a request

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use splitpay_core::booking::BookingError;
use splitpay_core::entities::booking::NewBooking;
use splitpay_core::ledger::LedgerError;
use splitpay_core::reconciliation::ReconcileError;
use splitpay_sdk::objects::{
    AssignRecipientRequest, CancelBookingRequest, CreateBookingRequest, CreateSplitRequest,
    GetBookingRequest, InitiateSplitPaymentRequest, PaymentInitiationResponse,
    SplitCreatedResponse,
};
use url::Url;

use super::{booking_to_response, reconcile_error_status, split_to_response};
use crate::api::extractors::SignedBody;
use crate::state::AppState;

/// Build the Service API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/status", post(get_booking_status))
        .route("/bookings/splits", post(create_split))
        .route("/bookings/cancel", post(cancel_booking))
        .route("/splits/recipient", post(assign_recipient))
        .route("/splits/initiate", post(initiate_payment))
}

/// `POST /bookings`: register a new pending booking.
async fn create_booking(
    State(state): State<AppState>,
    SignedBody(payload): SignedBody<CreateBookingRequest>,
) -> Result<impl IntoResponse, ServiceApiError> {
    let booking = state
        .engine
        .bookings()
        .register(NewBooking {
            venue_id: payload.venue_id,
            initiator_id: payload.initiator_id,
            total_amount: payload.total_amount,
            currency: payload.currency,
            party_size: payload.party_size,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(booking_to_response(&booking, &[]))))
}

/// `POST /bookings/status`: booking status with its split requests.
async fn get_booking_status(
    State(state): State<AppState>,
    SignedBody(payload): SignedBody<GetBookingRequest>,
) -> Result<impl IntoResponse, ServiceApiError> {
    let booking = state.engine.bookings().get(payload.booking_id).await?;
    let splits = state
        .engine
        .ledger()
        .requests_for_booking(payload.booking_id)
        .await?;
    Ok(Json(booking_to_response(&booking, &splits)))
}

/// `POST /bookings/splits`: divide the booking total into payment requests.
async fn create_split(
    State(state): State<AppState>,
    SignedBody(payload): SignedBody<CreateSplitRequest>,
) -> Result<impl IntoResponse, ServiceApiError> {
    let requests = state
        .engine
        .ledger()
        .create_split(
            payload.booking_id,
            payload.requester_id,
            payload.participant_count,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SplitCreatedResponse {
            booking_id: payload.booking_id,
            requests: requests.iter().map(split_to_response).collect(),
        }),
    ))
}

/// `POST /bookings/cancel`: cancel a pending booking.
///
/// Pending split requests are expired along with it.
async fn cancel_booking(
    State(state): State<AppState>,
    SignedBody(payload): SignedBody<CancelBookingRequest>,
) -> Result<impl IntoResponse, ServiceApiError> {
    state.engine.cancel_booking(payload.booking_id).await?;
    let booking = state.engine.bookings().get(payload.booking_id).await?;
    let splits = state
        .engine
        .ledger()
        .requests_for_booking(payload.booking_id)
        .await?;
    Ok(Json(booking_to_response(&booking, &splits)))
}

/// `POST /splits/recipient`: record who will pay a request.
async fn assign_recipient(
    State(state): State<AppState>,
    SignedBody(payload): SignedBody<AssignRecipientRequest>,
) -> Result<impl IntoResponse, ServiceApiError> {
    let ledger = state.engine.ledger();
    let assigned = ledger
        .assign_recipient(payload.request_id, payload.recipient_id)
        .await?;
    let request = ledger.get_request(payload.request_id).await?;
    if !assigned && request.recipient_id != Some(payload.recipient_id) {
        return Err(ServiceApiError::RecipientConflict);
    }
    Ok(Json(split_to_response(&request)))
}

/// `POST /splits/initiate`: start a gateway charge for one request.
///
/// Without an explicit `callback_url` the gateway sends the payer back to
/// this service's own callback endpoint.
async fn initiate_payment(
    State(state): State<AppState>,
    SignedBody(payload): SignedBody<InitiateSplitPaymentRequest>,
) -> Result<impl IntoResponse, ServiceApiError> {
    let callback_url = match payload.callback_url.as_deref() {
        Some(raw) => Some(Url::parse(raw).map_err(|_| ServiceApiError::InvalidCallbackUrl)?),
        None => state.config.server.read().await.payment_callback_url(),
    };

    let initiation = state
        .engine
        .initiate_payment(payload.request_id, callback_url)
        .await?;

    Ok(Json(PaymentInitiationResponse {
        request_id: payload.request_id,
        reference: initiation.reference,
        redirect_url: initiation.redirect_url,
        client_secret: initiation.client_secret,
    }))
}

/// Errors that can occur in Service API handlers.
#[derive(Debug)]
enum ServiceApiError {
    Booking(BookingError),
    Ledger(LedgerError),
    Reconcile(ReconcileError),
    /// The request already belongs to another payer, or is no longer pending.
    RecipientConflict,
    InvalidCallbackUrl,
}

impl From<BookingError> for ServiceApiError {
    fn from(value: BookingError) -> Self {
        Self::Booking(value)
    }
}

impl From<LedgerError> for ServiceApiError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

impl From<ReconcileError> for ServiceApiError {
    fn from(value: ReconcileError) -> Self {
        Self::Reconcile(value)
    }
}

impl IntoResponse for ServiceApiError {
    fn into_response(self) -> Response {
        match self {
            ServiceApiError::Booking(BookingError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "booking not found").into_response()
            }
            ServiceApiError::Booking(BookingError::AlreadyConfirmed(_)) => {
                (StatusCode::CONFLICT, "booking is already confirmed").into_response()
            }
            ServiceApiError::Booking(BookingError::Invalid(reason)) => {
                (StatusCode::BAD_REQUEST, reason).into_response()
            }
            ServiceApiError::Booking(e) => {
                tracing::error!(error = %e, "Service API booking error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            ServiceApiError::Ledger(LedgerError::InvalidAmount { .. }) => (
                StatusCode::BAD_REQUEST,
                "booking total cannot be split among that many participants",
            )
                .into_response(),
            ServiceApiError::Ledger(LedgerError::BookingNotFound(_)) => {
                (StatusCode::NOT_FOUND, "booking not found").into_response()
            }
            ServiceApiError::Ledger(LedgerError::RequestNotFound(_)) => {
                (StatusCode::NOT_FOUND, "split payment request not found").into_response()
            }
            ServiceApiError::Ledger(LedgerError::BookingNotPending(_)) => {
                (StatusCode::CONFLICT, "booking is not pending").into_response()
            }
            ServiceApiError::Ledger(LedgerError::SplitAlreadyExists(_)) => {
                (StatusCode::CONFLICT, "booking is already split").into_response()
            }
            ServiceApiError::Ledger(LedgerError::ReferenceAlreadyUsed(_)) => (
                StatusCode::CONFLICT,
                "payment reference is already applied to another request",
            )
                .into_response(),
            ServiceApiError::Ledger(LedgerError::Store(e)) => {
                tracing::error!(error = %e, "Service API store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            ServiceApiError::Reconcile(e) => reconcile_error_status(&e).into_response(),
            ServiceApiError::RecipientConflict => (
                StatusCode::CONFLICT,
                "split payment request cannot take that recipient",
            )
                .into_response(),
            ServiceApiError::InvalidCallbackUrl => {
                (StatusCode::BAD_REQUEST, "invalid callback_url").into_response()
            }
        }
    }
}
