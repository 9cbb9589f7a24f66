use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::assembler::assemble_now;
use crate::chunking::{html_from_metadata, metadata_for_html};
use crate::config::Settings;
use crate::form::{read_site_data, FormSubmission};
use crate::logo::{generate_logos, LogoRequest, LogoSet};
use crate::mailer::{fulfillment_email, lead_email, Lead, SITE_ATTACHMENT_NAME};
use crate::plan::{locked_fields, FormField, Plan};
use crate::sheets::tracking_row;
use crate::stripe::{
    is_valid_session_id, verify_signature, CheckoutParams, CheckoutSession, PaymentProvider,
    StripeError, WebhookEvent, CHECKOUT_COMPLETED, SIGNATURE_HEADER,
};

use super::error::ApiError;
use super::state::AppState;
use super::views::{render_builder_page, render_cancel_page, render_success_page};

const BUSINESS_NAME_METADATA_CHARS: usize = 450;
const FALLBACK_BUSINESS_NAME: &str = "Your Business";
const MAX_QUANTITY: u32 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct PlanQuery {
    #[serde(default)]
    pub plan: Option<String>,
}

pub async fn builder_page(
    State(state): State<AppState>,
    Query(query): Query<PlanQuery>,
) -> Html<String> {
    let plan = query
        .plan
        .as_deref()
        .map(Plan::parse_or_basic)
        .unwrap_or_default();
    let checkout_ready = state.payments().is_some();
    Html(render_builder_page(plan, &locked_fields(plan), checkout_ready))
}

pub async fn success_page() -> Html<String> {
    Html(render_success_page())
}

pub async fn cancel_page() -> Html<String> {
    Html(render_cancel_page())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedFieldsResponse {
    pub plan: Plan,
    pub locked: Vec<FormField>,
    pub gallery_limit: usize,
}

pub async fn plan_locked_fields(Path(plan): Path<String>) -> Json<LockedFieldsResponse> {
    let plan = Plan::parse_or_basic(&plan);
    Json(LockedFieldsResponse {
        plan,
        locked: locked_fields(plan).into_iter().collect(),
        gallery_limit: plan.features().gallery_limit,
    })
}

pub async fn preview(multipart: Multipart) -> Result<Html<String>, ApiError> {
    let form = FormSubmission::from_multipart(multipart).await?;
    let site = read_site_data(&form)?;
    Ok(Html(assemble_now(&site)))
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub items: Vec<CheckoutItem>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
    #[serde(default, rename = "sitePayload")]
    pub site_payload: Option<SitePayload>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutItem {
    pub price: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SitePayload {
    pub business_name: String,
    pub description: String,
    pub html_base64: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
    pub id: String,
}

pub async fn create_checkout(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|err| ApiError::bad_request(format!("Invalid checkout request: {err}")))?;
    let settings = state.settings();

    let (price_id, quantity) = resolve_price(&request, settings)?;
    let metadata = checkout_metadata(&request, settings, &price_id)?;

    let payments = state
        .payments()
        .ok_or_else(|| ApiError::unavailable("Stripe payments are not configured."))?;

    let price = payments
        .retrieve_price(&price_id)
        .await
        .map_err(|err| provider_error(err, "Invalid or inactive price"))?;
    if !price.active {
        warn!(price = %price_id, "checkout requested for inactive price");
        return Err(ApiError::bad_request("Invalid or inactive price"));
    }

    let success_url = request
        .success_url
        .as_deref()
        .filter(|url| settings.same_origin(url))
        .map(with_session_placeholder)
        .unwrap_or_else(|| settings.success_url());
    let cancel_url = request
        .cancel_url
        .as_deref()
        .filter(|url| settings.same_origin(url))
        .map(str::to_string)
        .unwrap_or_else(|| settings.cancel_url());

    let params = CheckoutParams {
        price_id,
        quantity,
        mode: price.checkout_mode(),
        success_url,
        cancel_url,
        customer_email: None,
        metadata,
    };
    let session = payments
        .create_checkout_session(&params)
        .await
        .map_err(|err| provider_error(err, "Stripe rejected the checkout session"))?;
    let url = session.url.ok_or_else(|| {
        error!(session = %session.id, "stripe session has no checkout url");
        ApiError::bad_gateway("Unexpected response from payment processor.")
    })?;

    info!(session = %session.id, mode = params.mode.as_str(), "checkout session created");
    Ok(Json(CheckoutResponse {
        url,
        id: session.id,
    }))
}

/// Maps the request onto an allowlisted price id. Nothing the client sends is charged unchecked.
fn resolve_price(
    request: &CheckoutRequest,
    settings: &Settings,
) -> Result<(String, u32), ApiError> {
    if let Some(raw) = request.plan.as_deref().filter(|raw| !raw.trim().is_empty()) {
        let plan = Plan::from_id(raw).ok_or_else(|| ApiError::bad_request("Unknown plan selected"))?;
        let price_id = settings.prices.price_for(plan).ok_or_else(|| {
            ApiError::bad_request("Checkout is not available for the selected plan yet.")
        })?;
        return Ok((price_id.to_string(), 1));
    }

    let item = request
        .items
        .first()
        .ok_or_else(|| ApiError::bad_request("A plan or price is required"))?;
    let price_id = item.price.trim();
    if settings.prices.plan_for_price(price_id).is_none() {
        warn!(price = %price_id, "checkout requested for unlisted price");
        return Err(ApiError::bad_request("Invalid or inactive price"));
    }
    Ok((price_id.to_string(), item.quantity.clamp(1, MAX_QUANTITY)))
}

fn checkout_metadata(
    request: &CheckoutRequest,
    settings: &Settings,
    price_id: &str,
) -> Result<BTreeMap<String, String>, ApiError> {
    let mut metadata = BTreeMap::new();
    if let Some(plan) = settings.prices.plan_for_price(price_id) {
        metadata.insert("plan".to_string(), plan.as_str().to_string());
    }

    let Some(site) = request.site_payload.as_ref() else {
        return Ok(metadata);
    };
    let business_name: String = site
        .business_name
        .trim()
        .chars()
        .take(BUSINESS_NAME_METADATA_CHARS)
        .collect();
    if !business_name.is_empty() {
        metadata.insert("businessName".to_string(), business_name);
    }
    if !site.html_base64.trim().is_empty() {
        let chunks = metadata_for_html(&site.html_base64, metadata.len())?;
        metadata.extend(chunks);
    }
    Ok(metadata)
}

fn with_session_placeholder(url: &str) -> String {
    if url.contains("{CHECKOUT_SESSION_ID}") {
        url.to_string()
    } else if url.contains('?') {
        format!("{url}&session_id={{CHECKOUT_SESSION_ID}}")
    } else {
        format!("{url}?session_id={{CHECKOUT_SESSION_ID}}")
    }
}

fn provider_error(err: StripeError, rejected_message: &str) -> ApiError {
    if err.is_client_error() {
        warn!(%err, "stripe rejected request");
        ApiError::bad_request(rejected_message)
    } else {
        error!(%err, "stripe request failed");
        ApiError::bad_gateway("Unable to reach Stripe right now. Please try again.")
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub paid: bool,
}

pub async fn verify_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<VerifyResponse> {
    let session = paid_session(state.payments(), query.session_id.as_deref()).await;
    Json(VerifyResponse {
        paid: session.is_some(),
    })
}

/// Looks the session up with Stripe and returns it only when it is paid.
async fn paid_session(
    payments: Option<&dyn PaymentProvider>,
    session_id: Option<&str>,
) -> Option<CheckoutSession> {
    let session_id = session_id.map(str::trim).filter(|id| is_valid_session_id(id))?;
    let payments = payments?;
    match payments.retrieve_session(session_id).await {
        Ok(session) if session.is_paid() => Some(session),
        Ok(_) => None,
        Err(err) => {
            warn!(%err, session = %session_id, "session lookup failed");
            None
        }
    }
}

pub async fn download_site(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Response, ApiError> {
    let session = paid_session(state.payments(), query.session_id.as_deref())
        .await
        .ok_or_else(|| ApiError::new(StatusCode::PAYMENT_REQUIRED, "Payment required"))?;
    let html = html_from_metadata(&session.metadata).map_err(|err| {
        warn!(%err, session = %session.id, "paid session has no site attached");
        ApiError::new(StatusCode::NOT_FOUND, "No site is attached to this purchase")
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{SITE_ATTACHMENT_NAME}\""),
            ),
        ],
        html,
    )
        .into_response())
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), ApiError> {
    let settings = state.settings();
    let Some(secret) = settings.stripe_webhook_secret.as_deref() else {
        error!("STRIPE_WEBHOOK_SECRET is not set");
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook is not configured",
        ));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if let Err(err) = verify_signature(
        &body,
        signature,
        secret,
        Utc::now().timestamp(),
        settings.webhook_tolerance_secs,
    ) {
        warn!(%err, "webhook signature verification failed");
        return Err(ApiError::bad_request(format!("Webhook Error: {err}")));
    }

    let event: WebhookEvent = serde_json::from_slice(&body).map_err(|err| {
        warn!(?err, "webhook payload is not a stripe event");
        ApiError::bad_request("Webhook Error: malformed event")
    })?;

    match state.store().claim_event(&event.id, &event.kind).await {
        Ok(true) => {}
        Ok(false) => {
            info!(event = %event.id, "duplicate webhook delivery skipped");
            return Ok((StatusCode::OK, "duplicate"));
        }
        Err(err) => {
            error!(?err, event = %event.id, "failed to record webhook event");
            return Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
            ));
        }
    }

    if event.kind == CHECKOUT_COMPLETED {
        fulfill(&state, &event).await;
    } else {
        info!(kind = %event.kind, "unhandled webhook event type");
    }
    Ok((StatusCode::OK, "ok"))
}

/// Emails the purchased site. Every failure here is logged and swallowed.
async fn fulfill(state: &AppState, event: &WebhookEvent) {
    let Some(session) = event.checkout_session() else {
        warn!(event = %event.id, "completed event carries no checkout session");
        return;
    };
    let html = match html_from_metadata(&session.metadata) {
        Ok(html) => html,
        Err(err) => {
            info!(%err, session = %session.id, "nothing to send, no site in metadata");
            return;
        }
    };
    let Some(recipient) = session.recipient_email() else {
        info!(session = %session.id, "nothing to send, no customer email");
        return;
    };
    let Some(mailer) = state.mailer() else {
        warn!(session = %session.id, "RESEND_API_KEY is not set, site not delivered");
        return;
    };

    let business_name = session
        .metadata
        .get("businessName")
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .unwrap_or(FALLBACK_BUSINESS_NAME);
    let settings = state.settings();
    let email = fulfillment_email(
        &settings.from_email,
        recipient,
        business_name,
        &html,
        Some(settings.site_url.as_str()),
    );
    match mailer.send(&email).await {
        Ok(()) => info!(session = %session.id, "website sent to customer"),
        Err(err) => error!(%err, session = %session.id, "failed to deliver website"),
    }
}

pub async fn ai_logo(
    State(state): State<AppState>,
    payload: Result<Json<LogoRequest>, JsonRejection>,
) -> Result<Json<LogoSet>, ApiError> {
    let Json(request) =
        payload.map_err(|err| ApiError::bad_request(format!("Invalid logo request: {err}")))?;
    Ok(Json(generate_logos(state.images(), &request).await))
}

#[derive(Debug, Serialize)]
pub struct LeadResponse {
    pub ok: bool,
}

pub async fn capture_lead(
    State(state): State<AppState>,
    payload: Result<Json<Lead>, JsonRejection>,
) -> Result<Json<LeadResponse>, ApiError> {
    let Json(lead) = payload.map_err(|_| ApiError::bad_request("Invalid JSON"))?;
    let email = lead.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("A valid email is required"));
    }

    state.store().record_lead(&lead).await.map_err(|err| {
        error!(?err, "failed to store lead");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Could not save your details")
    })?;

    let settings = state.settings();
    match (state.mailer(), settings.lead_to_email.as_deref()) {
        (Some(mailer), Some(to)) => {
            let email = lead_email(&settings.from_email, to, &lead);
            mailer.send(&email).await.map_err(|err| {
                error!(%err, "failed to send lead notification");
                ApiError::bad_gateway("Could not notify the site owner")
            })?;
        }
        _ => warn!("lead notification skipped, mail is not configured"),
    }

    if let Some(sheets) = state.sheets() {
        let data = serde_json::to_value(&lead).unwrap_or(Value::Null);
        let row = tracking_row(&Utc::now().to_rfc3339(), "lead", Some(&data));
        sheets.forward(&row).await;
    }

    info!(source = %lead.source, "lead captured");
    Ok(Json(LeadResponse { ok: true }))
}

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub event: String,
    #[serde(default)]
    pub data: Option<Value>,
}

pub async fn track_event(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, ApiError> {
    let request: TrackRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("Bad Request"))?;
    info!(event = %request.event, "tracked event");

    if let Some(sheets) = state.sheets() {
        let row = tracking_row(
            &Utc::now().to_rfc3339(),
            &request.event,
            request.data.as_ref(),
        );
        sheets.forward(&row).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::{FromRequest, Request};
    use axum::http::HeaderValue;
    use serde_json::json;

    use super::*;
    use crate::chunking::encode_html;
    use crate::config::PriceTable;
    use crate::form::MAX_IMAGE_BYTES;
    use crate::images::{ImageApiError, ImageGenerator};
    use crate::logo::LogoSource;
    use crate::mailer::{MailError, Mailer, OutboundEmail};
    use crate::store::Store;
    use crate::stripe::{compute_signature, Price};

    const WEBHOOK_SECRET: &str = "whsec_test";

    #[derive(Default)]
    struct FakeStripe {
        created: Mutex<Vec<CheckoutParams>>,
        sessions: Mutex<Vec<CheckoutSession>>,
        inactive: bool,
        unreachable: bool,
    }

    #[async_trait]
    impl PaymentProvider for FakeStripe {
        async fn retrieve_price(&self, price_id: &str) -> Result<Price, StripeError> {
            if self.unreachable {
                return Err(StripeError::Decode("connection reset".to_string()));
            }
            Ok(Price {
                id: price_id.to_string(),
                active: !self.inactive,
                recurring: None,
            })
        }

        async fn create_checkout_session(
            &self,
            params: &CheckoutParams,
        ) -> Result<CheckoutSession, StripeError> {
            let mut created = self.created.lock().unwrap();
            created.push(params.clone());
            Ok(CheckoutSession {
                id: format!("cs_test_{}", created.len()),
                url: Some("https://checkout.stripe.test/pay".to_string()),
                ..CheckoutSession::default()
            })
        }

        async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, StripeError> {
            self.sessions
                .lock()
                .unwrap()
                .iter()
                .find(|session| session.id == session_id)
                .cloned()
                .ok_or(StripeError::Rejected {
                    status: 404,
                    message: "No such checkout session".to_string(),
                })
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutboundEmail>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn settings() -> Settings {
        Settings {
            site_url: "https://builder.test".to_string(),
            stripe_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            prices: PriceTable {
                basic: Some("price_basic".to_string()),
                pro: Some("price_pro".to_string()),
                business: None,
            },
            lead_to_email: Some("owner@builder.test".to_string()),
            ..Settings::default()
        }
    }

    async fn state_with(stripe: Arc<FakeStripe>, mailer: Arc<RecordingMailer>) -> AppState {
        let store = Store::initialize("sqlite::memory:").await.expect("store");
        AppState::new(settings(), store)
            .with_payments(stripe)
            .with_mailer(mailer)
    }

    fn paid_checkout(id: &str, html: Option<&str>) -> CheckoutSession {
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("businessName".to_string(), "Bloom Studio".to_string());
        if let Some(html) = html {
            metadata.extend(metadata_for_html(&encode_html(html), 1).expect("chunks"));
        }
        CheckoutSession {
            id: id.to_string(),
            payment_status: Some("paid".to_string()),
            status: Some("complete".to_string()),
            metadata,
            customer_email: Some("buyer@example.com".to_string()),
            ..CheckoutSession::default()
        }
    }

    fn signed_headers(body: &[u8], secret: &str) -> HeaderMap {
        let timestamp = Utc::now().timestamp();
        let signature = compute_signature(secret, timestamp, body);
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&format!("t={timestamp},v1={signature}")).expect("header"),
        );
        headers
    }

    fn completed_event(id: &str, html: &str) -> Vec<u8> {
        let mut metadata = serde_json::Map::new();
        metadata.insert("businessName".to_string(), json!("Bloom Studio"));
        for (key, value) in metadata_for_html(&encode_html(html), 1).expect("chunks") {
            metadata.insert(key, json!(value));
        }
        serde_json::to_vec(&json!({
            "id": id,
            "type": CHECKOUT_COMPLETED,
            "data": {
                "object": {
                    "id": "cs_test_1",
                    "payment_status": "paid",
                    "metadata": metadata,
                    "customer_details": { "email": "buyer@example.com" }
                }
            }
        }))
        .expect("event json")
    }

    fn checkout_request(value: Value) -> Result<Json<CheckoutRequest>, JsonRejection> {
        Ok(Json(serde_json::from_value(value).expect("request")))
    }

    #[tokio::test]
    async fn verify_fails_closed_for_missing_or_bad_ids() {
        let stripe = Arc::new(FakeStripe::default());
        let state = state_with(stripe, Arc::default()).await;

        for session_id in [None, Some(""), Some("   "), Some("pi_123"), Some("cs_<script>")] {
            let Json(response) = verify_session(
                State(state.clone()),
                Query(SessionQuery {
                    session_id: session_id.map(str::to_string),
                }),
            )
            .await;
            assert!(!response.paid, "{session_id:?} should not verify");
        }

        let Json(response) = verify_session(
            State(state),
            Query(SessionQuery {
                session_id: Some("cs_test_unknown".to_string()),
            }),
        )
        .await;
        assert!(!response.paid);
    }

    #[tokio::test]
    async fn verify_reports_paid_sessions() {
        let stripe = Arc::new(FakeStripe::default());
        stripe
            .sessions
            .lock()
            .unwrap()
            .push(paid_checkout("cs_test_paid", None));
        let mut open = paid_checkout("cs_test_open", None);
        open.payment_status = Some("unpaid".to_string());
        open.status = Some("open".to_string());
        stripe.sessions.lock().unwrap().push(open);
        let state = state_with(stripe, Arc::default()).await;

        let query = |id: &str| {
            Query(SessionQuery {
                session_id: Some(id.to_string()),
            })
        };
        let Json(paid) = verify_session(State(state.clone()), query("cs_test_paid")).await;
        let Json(open) = verify_session(State(state), query("cs_test_open")).await;
        assert!(paid.paid);
        assert!(!open.paid);
    }

    #[tokio::test]
    async fn verify_without_payments_configured_is_unpaid() {
        let store = Store::initialize("sqlite::memory:").await.expect("store");
        let state = AppState::new(settings(), store);
        let Json(response) = verify_session(
            State(state),
            Query(SessionQuery {
                session_id: Some("cs_test_paid".to_string()),
            }),
        )
        .await;
        assert!(!response.paid);
    }

    #[tokio::test]
    async fn checkout_rejects_unlisted_prices_without_creating_a_session() {
        let stripe = Arc::new(FakeStripe::default());
        let state = state_with(stripe.clone(), Arc::default()).await;

        for request in [
            json!({ "items": [{ "price": "price_attacker", "quantity": 1 }] }),
            json!({ "plan": "platinum" }),
            json!({ "plan": "business" }),
            json!({}),
        ] {
            let err = create_checkout(State(state.clone()), checkout_request(request))
                .await
                .expect_err("should be rejected");
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
        }
        assert!(stripe.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkout_rejects_inactive_price() {
        let stripe = Arc::new(FakeStripe {
            inactive: true,
            ..FakeStripe::default()
        });
        let state = state_with(stripe.clone(), Arc::default()).await;
        let err = create_checkout(State(state), checkout_request(json!({ "plan": "pro" })))
            .await
            .expect_err("inactive");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(stripe.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkout_reports_unreachable_provider_as_bad_gateway() {
        let stripe = Arc::new(FakeStripe {
            unreachable: true,
            ..FakeStripe::default()
        });
        let state = state_with(stripe, Arc::default()).await;
        let err = create_checkout(State(state), checkout_request(json!({ "plan": "basic" })))
            .await
            .expect_err("unreachable");
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn checkout_carries_site_in_metadata() {
        let stripe = Arc::new(FakeStripe::default());
        let state = state_with(stripe.clone(), Arc::default()).await;
        let html = "<html><body>Bloom</body></html>".repeat(40);

        let Json(response) = create_checkout(
            State(state),
            checkout_request(json!({
                "plan": "pro",
                "mode": "subscription",
                "success_url": "https://evil.test/steal",
                "cancel_url": "https://builder.test/back",
                "sitePayload": {
                    "businessName": "Bloom Studio",
                    "description": "Flowers",
                    "htmlBase64": encode_html(&html)
                }
            })),
        )
        .await
        .expect("checkout");

        assert_eq!(response.id, "cs_test_1");
        assert_eq!(response.url, "https://checkout.stripe.test/pay");

        let created = stripe.created.lock().unwrap();
        let params = &created[0];
        assert_eq!(params.price_id, "price_pro");
        assert_eq!(params.mode.as_str(), "payment");
        assert_eq!(
            params.success_url,
            "https://builder.test/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(params.cancel_url, "https://builder.test/back");
        assert_eq!(params.metadata["plan"], "pro");
        assert_eq!(params.metadata["businessName"], "Bloom Studio");

        let metadata: std::collections::HashMap<String, String> = params
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        assert_eq!(html_from_metadata(&metadata).expect("html"), html);
    }

    #[tokio::test]
    async fn checkout_rejects_oversized_and_invalid_sites() {
        let stripe = Arc::new(FakeStripe::default());
        let state = state_with(stripe.clone(), Arc::default()).await;

        let huge = encode_html(&"x".repeat(40_000));
        let err = create_checkout(
            State(state.clone()),
            checkout_request(json!({ "plan": "basic", "sitePayload": { "htmlBase64": huge } })),
        )
        .await
        .expect_err("too large");
        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);

        let err = create_checkout(
            State(state),
            checkout_request(json!({ "plan": "basic", "sitePayload": { "htmlBase64": "%%%" } })),
        )
        .await
        .expect_err("invalid");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(stripe.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_sends_nothing() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = state_with(Arc::default(), mailer.clone()).await;
        let body = completed_event("evt_1", "<html></html>");

        let forged = signed_headers(&body, "whsec_wrong");
        let err = stripe_webhook(State(state.clone()), forged, Bytes::from(body.clone()))
            .await
            .expect_err("forged");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = stripe_webhook(State(state), HeaderMap::new(), Bytes::from(body))
            .await
            .expect_err("unsigned");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn webhook_delivers_site_once() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = state_with(Arc::default(), mailer.clone()).await;
        let html = "<!DOCTYPE html><html><body>Bloom</body></html>";
        let body = completed_event("evt_paid", html);

        for _ in 0..2 {
            let headers = signed_headers(&body, WEBHOOK_SECRET);
            let (status, _) = stripe_webhook(State(state.clone()), headers, Bytes::from(body.clone()))
                .await
                .expect("ack");
            assert_eq!(status, StatusCode::OK);
        }

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["buyer@example.com".to_string()]);
        assert!(sent[0].subject.contains("Bloom Studio"));
        assert_eq!(sent[0].attachments[0].filename, SITE_ATTACHMENT_NAME);
        assert_eq!(sent[0].attachments[0].content, encode_html(html));
    }

    #[tokio::test]
    async fn webhook_without_site_acknowledges_quietly() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = state_with(Arc::default(), mailer.clone()).await;
        let body = serde_json::to_vec(&json!({
            "id": "evt_empty",
            "type": CHECKOUT_COMPLETED,
            "data": { "object": { "id": "cs_test_2", "customer_email": "buyer@example.com" } }
        }))
        .expect("json");

        let headers = signed_headers(&body, WEBHOOK_SECRET);
        let (status, _) = stripe_webhook(State(state), headers, Bytes::from(body))
            .await
            .expect("ack");
        assert_eq!(status, StatusCode::OK);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn download_requires_verified_payment() {
        let stripe = Arc::new(FakeStripe::default());
        stripe
            .sessions
            .lock()
            .unwrap()
            .extend([
                paid_checkout("cs_test_site", Some("<html>mine</html>")),
                paid_checkout("cs_test_bare", None),
            ]);
        let state = state_with(stripe, Arc::default()).await;
        let query = |id: &str| {
            Query(SessionQuery {
                session_id: Some(id.to_string()),
            })
        };

        let err = download_site(State(state.clone()), query("cs_test_nobody"))
            .await
            .expect_err("unpaid");
        assert_eq!(err.status, StatusCode::PAYMENT_REQUIRED);

        let err = download_site(State(state.clone()), query("cs_test_bare"))
            .await
            .expect_err("no site");
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let response = download_site(State(state), query("cs_test_site"))
            .await
            .expect("download");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"site.html\""
        );
    }

    #[tokio::test]
    async fn lead_requires_email_and_notifies_owner() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = state_with(Arc::default(), mailer.clone()).await;

        let err = capture_lead(State(state.clone()), Ok(Json(Lead::default())))
            .await
            .expect_err("no email");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let lead = Lead {
            name: "Sam".to_string(),
            email: "sam@example.com".to_string(),
            ..Lead::default()
        };
        let Json(response) = capture_lead(State(state.clone()), Ok(Json(lead)))
            .await
            .expect("lead");
        assert!(response.ok);
        assert_eq!(state.store().lead_count().await.expect("count"), 1);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["owner@builder.test".to_string()]);
    }

    #[tokio::test]
    async fn track_accepts_events_and_rejects_garbage() {
        let state = state_with(Arc::default(), Arc::default()).await;
        let status = track_event(
            State(state.clone()),
            Bytes::from_static(br#"{"event":"preview","data":{"plan":"pro"}}"#),
        )
        .await
        .expect("tracked");
        assert_eq!(status, StatusCode::NO_CONTENT);

        let err = track_event(State(state), Bytes::from_static(b"{not json"))
            .await
            .expect_err("garbage");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn locked_fields_follow_plan() {
        let Json(basic) = plan_locked_fields(Path("nonsense".to_string())).await;
        assert_eq!(basic.plan, Plan::Basic);
        assert!(basic.locked.contains(&FormField::Services));

        let Json(business) = plan_locked_fields(Path("business".to_string())).await;
        assert!(business.locked.is_empty());
        assert_eq!(business.gallery_limit, 12);
    }

    const BOUNDARY: &str = "sitecraft-test-boundary";

    /// Hand-built `multipart/form-data` body, decoded through axum's real extractor.
    #[derive(Default)]
    struct MultipartBody {
        bytes: Vec<u8>,
    }

    impl MultipartBody {
        fn text(mut self, name: &str, value: &str) -> Self {
            self.bytes.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
            self
        }

        fn unnamed(mut self, value: &str) -> Self {
            self.bytes.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data\r\n\r\n{value}\r\n").as_bytes(),
            );
            self
        }

        fn file(mut self, name: &str, filename: &str, mime: &str, content: &[u8]) -> Self {
            self.bytes.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {mime}\r\n\r\n"
                )
                .as_bytes(),
            );
            self.bytes.extend_from_slice(content);
            self.bytes.extend_from_slice(b"\r\n");
            self
        }

        async fn into_multipart(mut self) -> Multipart {
            self.bytes
                .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
            let request = Request::builder()
                .method("POST")
                .uri("/preview")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(self.bytes))
                .expect("request");
            Multipart::from_request(request, &()).await.expect("multipart")
        }
    }

    #[tokio::test]
    async fn preview_reads_a_real_multipart_form() {
        let oversized = vec![0u8; MAX_IMAGE_BYTES + 1];
        let multipart = MultipartBody::default()
            .text("businessName", "Bloom Studio")
            .text("plan", "pro")
            .text("services", "Bouquets\nWeddings")
            .unnamed("stray value")
            .file("logo", "logo.png", "image/png", b"PNGDATA")
            .file("gallery", "one.png", "image/png", b"GALLERY1")
            .file("gallery", "huge.png", "image/png", &oversized)
            .file("gallery", "notes.txt", "text/plain", b"not an image")
            .into_multipart()
            .await;

        let Html(html) = preview(multipart).await.expect("preview");
        assert!(html.contains("Bloom Studio"));
        assert!(html.contains("<h2>Services</h2>"));
        assert!(html.contains("Weddings"));
        assert!(html.contains("base64,UE5HREFUQQ=="));
        assert_eq!(html.matches(r#"alt="Gallery image""#).count(), 1);
        assert!(!html.contains("stray value"));
    }

    #[tokio::test]
    async fn preview_rejects_forms_without_a_business_name() {
        let multipart = MultipartBody::default()
            .text("businessName", "   ")
            .text("plan", "business")
            .into_multipart()
            .await;
        let err = preview(multipart).await.expect_err("missing name");
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);

        let multipart = MultipartBody::default()
            .text("businessName", "Bloom Studio")
            .file("logo", "logo.txt", "text/plain", b"hello")
            .into_multipart()
            .await;
        let err = preview(multipart).await.expect_err("bad logo");
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    struct DownImages;

    #[async_trait]
    impl ImageGenerator for DownImages {
        async fn generate(&self, _request: &LogoRequest) -> Result<Vec<String>, ImageApiError> {
            Err(ImageApiError::RateLimited)
        }
    }

    #[tokio::test]
    async fn ai_logo_falls_back_to_procedural_variants() {
        let state = state_with(Arc::default(), Arc::default())
            .await
            .with_images(Arc::new(DownImages));
        let request = LogoRequest {
            brand: "Bloom Studio".to_string(),
            industry: "florist".to_string(),
            ..LogoRequest::default()
        };

        let Json(set) = ai_logo(State(state), Ok(Json(request)))
            .await
            .expect("logos");
        assert_eq!(set.source, LogoSource::Procedural);
        assert_eq!(set.images.len(), 3);
        assert!(set
            .images
            .iter()
            .all(|image| image.starts_with("data:image/svg+xml;base64,")));
        assert_eq!(serde_json::to_value(&set).expect("json")["source"], "procedural");
    }

    #[tokio::test]
    async fn ai_logo_rejects_malformed_json() {
        let state = state_with(Arc::default(), Arc::default()).await;
        let request = Request::builder()
            .method("POST")
            .uri("/ai-logo")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let payload = Json::<LogoRequest>::from_request(request, &()).await;
        assert!(payload.is_err());

        let err = ai_logo(State(state), payload).await.expect_err("malformed");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
