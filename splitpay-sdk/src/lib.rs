//! Wire types and request signing shared between the split-payment
//! service, its API clients, and the payment gateway integration.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(unsafe_code)]

pub mod objects;
pub mod signature;
