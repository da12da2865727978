pub mod booking;
pub mod notification_delivery;
pub mod split_request;

use splitpay_sdk::objects::{BookingStatus as SdkBookingStatus, SplitStatus as SdkSplitStatus};

/// Booking status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `splitpay_sdk::objects::BookingStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "booking_status")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// `confirmed` and `cancelled` never change again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
        )
    }
}

impl From<BookingStatus> for SdkBookingStatus {
    fn from(value: BookingStatus) -> Self {
        match value {
            BookingStatus::Pending => SdkBookingStatus::Pending,
            BookingStatus::Confirmed => SdkBookingStatus::Confirmed,
            BookingStatus::Cancelled => SdkBookingStatus::Cancelled,
        }
    }
}

impl From<SdkBookingStatus> for BookingStatus {
    fn from(value: SdkBookingStatus) -> Self {
        match value {
            SdkBookingStatus::Pending => BookingStatus::Pending,
            SdkBookingStatus::Confirmed => BookingStatus::Confirmed,
            SdkBookingStatus::Cancelled => BookingStatus::Cancelled,
        }
    }
}

/// Split payment request status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `splitpay_sdk::objects::SplitStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "split_status")]
pub enum SplitStatus {
    Pending,
    Paid,
    Expired,
}

impl SplitStatus {
    /// `paid` and `expired` never change again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, SplitStatus::Pending)
    }

    pub fn can_transition_to(self, next: SplitStatus) -> bool {
        matches!(
            (self, next),
            (SplitStatus::Pending, SplitStatus::Paid) | (SplitStatus::Pending, SplitStatus::Expired)
        )
    }
}

impl std::fmt::Display for SplitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        SdkSplitStatus::from(*self).fmt(f)
    }
}

impl From<SplitStatus> for SdkSplitStatus {
    fn from(value: SplitStatus) -> Self {
        match value {
            SplitStatus::Pending => SdkSplitStatus::Pending,
            SplitStatus::Paid => SdkSplitStatus::Paid,
            SplitStatus::Expired => SdkSplitStatus::Expired,
        }
    }
}

impl From<SdkSplitStatus> for SplitStatus {
    fn from(value: SdkSplitStatus) -> Self {
        match value {
            SdkSplitStatus::Pending => SplitStatus::Pending,
            SdkSplitStatus::Paid => SplitStatus::Paid,
            SdkSplitStatus::Expired => SplitStatus::Expired,
        }
    }
}
