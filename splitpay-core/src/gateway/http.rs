//! HTTP adapter for a Paystack-style payment gateway.
//!
//! `POST {base}/transaction/initialize` starts a charge and
//! `GET {base}/transaction/verify/{reference}` reports its state. Both are
//! authenticated with the secret key as a bearer token; amounts cross the
//! wire in minor units.

use super::{
    GatewayError, GatewayVerification, InitiatePayment, MinorUnitScale, PaymentGateway,
    PaymentInitiation,
};
use async_trait::async_trait;
use compact_str::CompactString;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Envelope every gateway response is wrapped in.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    amount: i64,
    currency: &'a str,
    reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    metadata: InitializeMetadata,
}

#[derive(Debug, Serialize)]
struct InitializeMetadata {
    request_id: Uuid,
    booking_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    reference: String,
    #[serde(default)]
    authorization_url: Option<String>,
    #[serde(default)]
    access_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    reference: String,
    amount: i64,
    currency: CompactString,
    #[serde(default)]
    metadata: Option<VerifyMetadata>,
}

#[derive(Debug, Deserialize)]
struct VerifyMetadata {
    #[serde(default)]
    request_id: Option<Uuid>,
}

/// [`PaymentGateway`] backed by the gateway's REST API.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    http: Client,
    base_url: Url,
    secret_key: String,
    scale: MinorUnitScale,
}

impl HttpPaymentGateway {
    /// * `base_url` - API root, e.g. `https://api.paystack.co/`.
    /// * `secret_key` - sent as `Authorization: Bearer {secret_key}`.
    pub fn new(
        base_url: Url,
        secret_key: impl Into<String>,
        scale: MinorUnitScale,
        timeout: Duration,
    ) -> Self {
        Self {
            http: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
            secret_key: secret_key.into(),
            scale,
        }
    }

    /// Replace the default `reqwest::Client`.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.base_url.join(path)?)
    }

    fn new_reference() -> String {
        format!("SPL-{}", Uuid::now_v7().simple())
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip_all, err, fields(request_id = %payment.request_id))]
    async fn initiate(&self, payment: InitiatePayment) -> Result<PaymentInitiation, GatewayError> {
        let amount = self.scale.to_minor(payment.amount).ok_or_else(|| {
            GatewayError::InvalidResponse(format!(
                "amount {} is not representable in minor units",
                payment.amount
            ))
        })?;
        let reference = Self::new_reference();
        let body = InitializeBody {
            amount,
            currency: &payment.currency,
            reference: &reference,
            callback_url: payment.callback_url.as_ref().map(Url::as_str),
            metadata: InitializeMetadata {
                request_id: payment.request_id,
                booking_id: payment.booking_id,
            },
        };

        let resp = self
            .http
            .post(self.endpoint("transaction/initialize")?)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await?;
        let data: InitializeData = parse_response(resp).await?;

        Ok(PaymentInitiation {
            reference: data.reference,
            redirect_url: data.authorization_url,
            client_secret: data.access_code,
        })
    }

    #[tracing::instrument(skip_all, err, fields(reference = reference))]
    async fn verify(&self, reference: &str) -> Result<GatewayVerification, GatewayError> {
        let path = format!("transaction/verify/{}", urlencoding::encode(reference));
        let resp = self
            .http
            .get(self.endpoint(&path)?)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        let data: VerifyData = parse_response(resp).await?;

        Ok(GatewayVerification {
            succeeded: data.status == "success",
            reference: data.reference,
            request_id: data.metadata.and_then(|m| m.request_id),
            amount_paid: self.scale.to_major(data.amount),
            currency: data.currency,
        })
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, GatewayError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = resp.bytes().await?;
    let envelope: Envelope<T> = serde_json::from_slice(&bytes)
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
    if !envelope.status {
        return Err(GatewayError::InvalidResponse(envelope.message));
    }
    envelope
        .data
        .ok_or_else(|| GatewayError::InvalidResponse("missing data".to_string()))
}
