//! HTTP API surfaces.
//!
//! - `payments` takes payment outcomes from the payer's browser and the gateway.
//! - `service` is called by the marketplace backend (signed bodies).
//! - `admin` is for operators (admin secret header).

pub mod admin;
pub mod extractors;
pub mod payments;
pub mod service;

use axum::http::StatusCode;
use splitpay_core::entities::booking::Booking;
use splitpay_core::entities::split_request::SplitPaymentRequest;
use splitpay_core::reconciliation::ReconcileError;
use splitpay_sdk::objects::{BookingResponse, SplitResponse};

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

pub(crate) fn split_to_response(r: &SplitPaymentRequest) -> SplitResponse {
    SplitResponse {
        request_id: r.id,
        booking_id: r.booking_id,
        requester_id: r.requester_id,
        recipient_id: r.recipient_id,
        amount: r.amount,
        status: r.status.into(),
        payment_reference: r.payment_reference.clone(),
        paid_at: r.paid_at.map(|t| t.unix_timestamp()),
        expires_at: r.expires_at.unix_timestamp(),
    }
}

pub(crate) fn booking_to_response(b: &Booking, splits: &[SplitPaymentRequest]) -> BookingResponse {
    BookingResponse {
        booking_id: b.id,
        venue_id: b.venue_id,
        initiator_id: b.initiator_id,
        total_amount: b.total_amount,
        currency: b.currency.clone(),
        party_size: b.party_size,
        status: b.status.into(),
        created_at: b.created_at.unix_timestamp(),
        confirmed_at: b.confirmed_at.map(|t| t.unix_timestamp()),
        splits: splits.iter().map(split_to_response).collect(),
    }
}

// ---------------------------------------------------------------------------
// Shared error mapping
// ---------------------------------------------------------------------------

/// Status code and client-facing message for an engine error.
///
/// Internal failures are logged here and reported without detail.
pub(crate) fn reconcile_error_status(err: &ReconcileError) -> (StatusCode, &'static str) {
    match err {
        ReconcileError::VerificationFailed(reason) => {
            tracing::warn!(reason = %reason, "Payment verification failed");
            (StatusCode::BAD_GATEWAY, "payment could not be verified")
        }
        ReconcileError::Gateway(e) => {
            tracing::error!(error = %e, "Payment gateway error");
            (StatusCode::BAD_GATEWAY, "payment gateway unavailable")
        }
        ReconcileError::RequestExpired(_) => {
            (StatusCode::GONE, "split payment request has expired")
        }
        ReconcileError::RequestAlreadyPaid(_) => {
            (StatusCode::CONFLICT, "split payment request is already paid")
        }
        ReconcileError::ReferenceAlreadyUsed(_) => (
            StatusCode::CONFLICT,
            "payment reference is already applied to another request",
        ),
        ReconcileError::RequestNotFound(_) => {
            (StatusCode::NOT_FOUND, "split payment request not found")
        }
        ReconcileError::BookingNotFound(_) => (StatusCode::NOT_FOUND, "booking not found"),
        ReconcileError::BookingAlreadyConfirmed(_) => {
            (StatusCode::CONFLICT, "booking is already confirmed")
        }
        ReconcileError::Ledger(e) => {
            tracing::error!(error = %e, "Ledger error");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
        ReconcileError::Booking(e) => {
            tracing::error!(error = %e, "Booking error");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
        ReconcileError::Store(e) => {
            tracing::error!(error = %e, "Store error");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}
