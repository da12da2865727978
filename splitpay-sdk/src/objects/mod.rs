//! API request and response types.
//!
//! These are the API/DTO versions of the domain types. Database versions
//! (with `sqlx::Type`) live in `splitpay-core::entities`.

pub mod booking;
pub mod notification;
pub mod payment;
pub mod split;

pub use booking::{
    BookingResponse, BookingStatus, CancelBookingRequest, CreateBookingRequest, GetBookingRequest,
};
pub use notification::{
    InitiatorConfirmationPayload, ParticipantConfirmationPayload, SplitReceiptPayload,
    VenueConfirmationPayload,
};
pub use payment::{
    CallbackOutcome, CallbackResponse, GatewayWebhookPayload, OutcomeSource,
    PaymentCallbackRequest, WebhookAck, WebhookMetadata,
};
pub use split::{
    AssignRecipientRequest, CreateSplitRequest, InitiateSplitPaymentRequest,
    PaymentInitiationResponse, SplitCreatedResponse, SplitResponse, SplitStatus,
};
