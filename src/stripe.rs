use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use reqwest::Client;
use ring::hmac;
use serde::Deserialize;
use thiserror::Error;
use tracing::error;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";
pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("failed to talk to stripe: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("stripe rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected response from stripe: {0}")]
    Decode(String),
}

impl StripeError {
    /// True when Stripe answered with a 4xx about the request itself.
    pub fn is_client_error(&self) -> bool {
        matches!(self, StripeError::Rejected { status, .. } if (400..500).contains(status))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckoutMode {
    Payment,
    Subscription,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Payment => "payment",
            CheckoutMode::Subscription => "subscription",
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Price {
    pub id: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub recurring: Option<serde_json::Value>,
}

impl Price {
    /// Recurring prices need a subscription session; everything else is a one-time payment.
    pub fn checkout_mode(&self) -> CheckoutMode {
        match &self.recurring {
            Some(value) if !value.is_null() => CheckoutMode::Subscription,
            _ => CheckoutMode::Payment,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CheckoutParams {
    pub price_id: String,
    pub quantity: u32,
    pub mode: CheckoutMode,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl CheckoutParams {
    /// Form-encoded body for `POST /v1/checkout/sessions`.
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form_body = vec![
            ("mode".to_string(), self.mode.as_str().to_string()),
            ("line_items[0][price]".to_string(), self.price_id.clone()),
            (
                "line_items[0][quantity]".to_string(),
                self.quantity.to_string(),
            ),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("allow_promotion_codes".to_string(), "true".to_string()),
        ];
        if let Some(email) = &self.customer_email {
            form_body.push(("customer_email".to_string(), email.clone()));
        }
        for (key, value) in &self.metadata {
            form_body.push((format!("metadata[{key}]"), value.clone()));
        }
        form_body
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid") || self.status.as_deref() == Some("complete")
    }

    pub fn recipient_email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|details| details.email.as_deref())
            .or(self.customer_email.as_deref())
            .filter(|email| !email.trim().is_empty())
    }
}

/// Checkout session ids look like `cs_test_a1B2...`.
pub fn is_valid_session_id(id: &str) -> bool {
    id.len() > 3
        && id.len() <= 255
        && id.starts_with("cs_")
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn retrieve_price(&self, price_id: &str) -> Result<Price, StripeError>;

    async fn create_checkout_session(
        &self,
        params: &CheckoutParams,
    ) -> Result<CheckoutSession, StripeError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, StripeError>;
}

pub struct StripeClient {
    client: Client,
    secret_key: String,
    api_base: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: Option<StripeErrorDetail>,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    pub fn new(client: Client, secret_key: impl Into<String>) -> Self {
        Self {
            client,
            secret_key: secret_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn read<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| body.clone());
            error!(?status, %message, "stripe returned an error");
            return Err(StripeError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|err| {
            error!(?err, "failed to parse stripe response");
            StripeError::Decode(err.to_string())
        })
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn retrieve_price(&self, price_id: &str) -> Result<Price, StripeError> {
        let response = self
            .client
            .get(format!("{}/v1/prices/{}", self.api_base, price_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn create_checkout_session(
        &self,
        params: &CheckoutParams,
    ) -> Result<CheckoutSession, StripeError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params.to_form())
            .send()
            .await?;
        Self::read(response).await
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, StripeError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.api_base, session_id
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::read(response).await
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    pub fn checkout_session(&self) -> Option<CheckoutSession> {
        serde_json::from_value(self.data.object.clone()).ok()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing or malformed signature header")]
    MalformedHeader,
    #[error("signature timestamp outside the tolerance window")]
    TimestampOutOfTolerance,
    #[error("no signature matches the payload")]
    Mismatch,
}

/// Checks a `Stripe-Signature` header (`t=...,v1=...`) against the raw request body.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for pair in header.split(',') {
        match pair.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }
    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::TimestampOutOfTolerance);
    }

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let signed = signed_payload(timestamp, payload);
    let matched = signatures
        .iter()
        .filter_map(|candidate| hex::decode(candidate).ok())
        .any(|tag| hmac::verify(&key, &signed, &tag).is_ok());
    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Hex `v1` signature for `payload` at `timestamp`, as Stripe computes it.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let tag = hmac::sign(&key, &signed_payload(timestamp, payload));
    hex::encode(tag.as_ref())
}

fn signed_payload(timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut signed = format!("{timestamp}.").into_bytes();
    signed.extend_from_slice(payload);
    signed
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn accepts_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = format!("t=1700000000,v1={}", compute_signature(SECRET, 1_700_000_000, payload));
        assert_eq!(
            verify_signature(payload, &header, SECRET, 1_700_000_100, 300),
            Ok(())
        );
    }

    #[test]
    fn rejects_tampered_payload_and_wrong_secret() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = format!("t=1700000000,v1={}", compute_signature(SECRET, 1_700_000_000, payload));
        assert_eq!(
            verify_signature(br#"{"id":"evt_2"}"#, &header, SECRET, 1_700_000_000, 300),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature(payload, &header, "whsec_other", 1_700_000_000, 300),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_or_malformed_headers() {
        let payload = b"{}";
        let header = format!("t=1000,v1={}", compute_signature(SECRET, 1000, payload));
        assert_eq!(
            verify_signature(payload, &header, SECRET, 5000, 300),
            Err(SignatureError::TimestampOutOfTolerance)
        );
        assert_eq!(
            verify_signature(payload, "v1=abcd", SECRET, 1000, 300),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            verify_signature(payload, "t=1000", SECRET, 1000, 300),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            verify_signature(payload, "t=1000,v1=zz", SECRET, 1000, 300),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn extreme_timestamps_are_out_of_tolerance() {
        for header in ["t=-9223372036854775808,v1=00", "t=9223372036854775807,v1=00"] {
            assert_eq!(
                verify_signature(b"{}", header, SECRET, 1_700_000_000, 300),
                Err(SignatureError::TimestampOutOfTolerance)
            );
        }
        assert_eq!(
            verify_signature(b"{}", "t=0,v1=00", SECRET, i64::MIN, 300),
            Err(SignatureError::TimestampOutOfTolerance)
        );
    }

    #[test]
    fn any_matching_v1_signature_is_enough() {
        let payload = b"{}";
        let good = compute_signature(SECRET, 42, payload);
        let header = format!("t=42, v1=deadbeef, v1={good}, v0=ignored");
        assert_eq!(verify_signature(payload, &header, SECRET, 42, 300), Ok(()));
    }

    #[test]
    fn paid_statuses() {
        let mut session = CheckoutSession::default();
        assert!(!session.is_paid());
        session.status = Some("open".to_string());
        session.payment_status = Some("unpaid".to_string());
        assert!(!session.is_paid());
        session.payment_status = Some("paid".to_string());
        assert!(session.is_paid());
        session.payment_status = Some("no_payment_required".to_string());
        session.status = Some("complete".to_string());
        assert!(session.is_paid());
    }

    #[test]
    fn session_id_shape() {
        assert!(is_valid_session_id("cs_test_a1B2c3"));
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("cs_"));
        assert!(!is_valid_session_id("pi_123"));
        assert!(!is_valid_session_id("cs_test/../../v1/prices"));
    }

    #[test]
    fn recipient_prefers_customer_details() {
        let session: CheckoutSession = serde_json::from_str(
            r#"{"id":"cs_1","customer_email":"old@example.com","customer_details":{"email":"new@example.com"}}"#,
        )
        .expect("session");
        assert_eq!(session.recipient_email(), Some("new@example.com"));
    }

    #[test]
    fn recurring_price_selects_subscription() {
        let one_time: Price =
            serde_json::from_str(r#"{"id":"price_1","active":true,"recurring":null}"#).expect("price");
        let monthly: Price =
            serde_json::from_str(r#"{"id":"price_2","active":true,"recurring":{"interval":"month"}}"#)
                .expect("price");
        assert_eq!(one_time.checkout_mode(), CheckoutMode::Payment);
        assert_eq!(monthly.checkout_mode(), CheckoutMode::Subscription);
    }

    #[test]
    fn checkout_form_encodes_metadata() {
        let mut metadata = BTreeMap::new();
        metadata.insert("html_parts".to_string(), "1".to_string());
        let params = CheckoutParams {
            price_id: "price_1".to_string(),
            quantity: 1,
            mode: CheckoutMode::Payment,
            success_url: "https://site.test/success".to_string(),
            cancel_url: "https://site.test/".to_string(),
            customer_email: None,
            metadata,
        };
        let form = params.to_form();
        assert!(form.contains(&("mode".to_string(), "payment".to_string())));
        assert!(form.contains(&("metadata[html_parts]".to_string(), "1".to_string())));
    }
}
