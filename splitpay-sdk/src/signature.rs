//! Signature algorithm and verification for all Splitpay APIs.
//!
//! The service API and inbound gateway webhooks use HMAC-SHA256 signatures
//! defined in this module. The wire format for the header is:
//!
//! ```text
//! Splitpay-Signature: {unix_timestamp}.{base64_signature}
//! ```
//!
//! The signed message is always `"{timestamp}.{raw_body}"`. Service API
//! requests are signed with the merchant secret, gateway webhooks with the
//! gateway webhook secret.

/// Header name for the service API HMAC signature.
pub const SIGNATURE_HEADER: &str = "Splitpay-Signature";

/// Header name for the gateway webhook HMAC signature.
pub const GATEWAY_SIGNATURE_HEADER: &str = "Splitpay-Gateway-Signature";

/// Header name for admin API authentication (plaintext secret).
pub const ADMIN_AUTH_HEADER: &str = "Splitpay-Admin-Authorization";

/// Maximum allowed age of a signature (in seconds).
pub const MAX_SIGNATURE_AGE: i64 = 5 * 60;

/// Marker trait for types that can participate in body signing via
/// [`SignedObject`].
pub trait Signature: for<'de> serde::Deserialize<'de> + serde::Serialize {}

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid header format")]
    InvalidFormat,
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("signature expired")]
    Expired,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

// ---------------------------------------------------------------------------
// SignedObject: body signing
// ---------------------------------------------------------------------------

/// A signed API body carrying its typed payload, timestamp, raw JSON, and
/// HMAC-SHA256 signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedObject<T: Signature> {
    pub body: T,
    pub timestamp: i64,
    pub json: String,
    pub signature: Box<[u8]>,
}

impl<T: Signature> SignedObject<T> {
    /// Serialize `body` and sign it with `key` at the current time.
    pub fn new(body: T, key: &[u8]) -> Result<Self, serde_json::Error> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let json = serde_json::to_string(&body)?;
        let signature = sign_raw(now, json.as_bytes(), key);
        Ok(Self {
            body,
            timestamp: now,
            json,
            signature,
        })
    }

    /// Reconstruct a [`SignedObject`] from a raw signature header value and
    /// the JSON request body string.
    ///
    /// This parses the header and deserializes the body but does **not**
    /// verify the HMAC; call [`verify`](Self::verify) for that.
    pub fn from_header_and_body(
        header_value: &str,
        body_json: String,
    ) -> Result<Self, SignatureError> {
        let (timestamp, signature) = parse_signature_header(header_value)?;
        let body: T = serde_json::from_str(&body_json)?;
        Ok(Self {
            body,
            timestamp,
            json: body_json,
            signature,
        })
    }

    /// Verify the HMAC signature and timestamp freshness, consuming `self`
    /// and returning the authenticated payload.
    pub fn verify(self, key: &[u8]) -> Result<T, SignatureError> {
        verify_raw(self.timestamp, self.json.as_bytes(), &self.signature, key)?;
        Ok(self.body)
    }

    /// Format the full signature header value (`{timestamp}.{b64}`).
    pub fn to_header(&self) -> String {
        format_signature_header(self.timestamp, &self.signature)
    }
}

// ---------------------------------------------------------------------------
// Raw body signing
// ---------------------------------------------------------------------------

fn signing_message(timestamp: i64, body: &[u8]) -> Vec<u8> {
    let timestamp = timestamp.to_string();
    let mut message = Vec::with_capacity(timestamp.len() + 1 + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'.');
    message.extend_from_slice(body);
    message
}

/// Compute `HMAC-SHA256("{timestamp}.{body}", key)`.
pub fn sign_raw(timestamp: i64, body: &[u8], key: &[u8]) -> Box<[u8]> {
    let signature = ring::hmac::sign(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        &signing_message(timestamp, body),
    );
    signature.as_ref().to_owned().into_boxed_slice()
}

/// Sign `body` at the current time and return the header value.
pub fn sign_body(body: &[u8], key: &[u8]) -> String {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    format_signature_header(now, &sign_raw(now, body, key))
}

/// Check `signature` against `"{timestamp}.{body}"` and the freshness window.
pub fn verify_raw(
    timestamp: i64,
    body: &[u8],
    signature: &[u8],
    key: &[u8],
) -> Result<(), SignatureError> {
    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        &signing_message(timestamp, body),
        signature,
    )?;
    check_timestamp(timestamp)?;
    Ok(())
}

/// Verify a raw header value against a raw body.
pub fn verify_header(header_value: &str, body: &[u8], key: &[u8]) -> Result<(), SignatureError> {
    let (timestamp, signature) = parse_signature_header(header_value)?;
    verify_raw(timestamp, body, &signature, key)
}

// ---------------------------------------------------------------------------
// Header parsing / formatting
// ---------------------------------------------------------------------------

/// Parse a signature header value (`{timestamp}.{base64}`) into
/// `(timestamp, raw_signature_bytes)`.
pub fn parse_signature_header(value: &str) -> Result<(i64, Box<[u8]>), SignatureError> {
    let (timestamp, encoded) = value.split_once('.').ok_or(SignatureError::InvalidFormat)?;
    let timestamp: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::InvalidFormat)?;
    let signature_bytes = fast32::base64::RFC4648_NOPAD
        .decode_str(encoded)
        .map_err(|_| SignatureError::InvalidBase64)?
        .into_boxed_slice();
    Ok((timestamp, signature_bytes))
}

/// Format a `{timestamp}.{base64}` header value from its parts.
pub fn format_signature_header(timestamp: i64, signature: &[u8]) -> String {
    format!(
        "{}.{}",
        timestamp,
        fast32::base64::RFC4648_NOPAD.encode(signature)
    )
}

/// Check that a signature timestamp is within [`MAX_SIGNATURE_AGE`].
pub fn check_timestamp(timestamp: i64) -> Result<(), SignatureError> {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    if now - timestamp > MAX_SIGNATURE_AGE {
        return Err(SignatureError::Expired);
    }
    Ok(())
}
