use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use v_htmlescape::escape;

const RESEND_URL: &str = "https://api.resend.com/emails";
pub const SITE_ATTACHMENT_NAME: &str = "site.html";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to reach mail api: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail api rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub filename: String,
    /// Base64 file body.
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;
}

pub struct ResendMailer {
    client: Client,
    api_key: String,
}

impl ResendMailer {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        let response = self
            .client
            .post(RESEND_URL)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Purchase delivery: a short note with the generated site attached as `site.html`.
pub fn fulfillment_email(
    from: &str,
    to: &str,
    business_name: &str,
    site_html: &str,
    site_url: Option<&str>,
) -> OutboundEmail {
    let brand = escape(business_name);
    let help = site_url
        .map(|url| {
            format!(
                r#"<p style="margin:12px 0">Need help or want upgrades? Visit <a href="{url}" style="color:#2563eb;text-decoration:none">{url}</a></p>"#,
                url = escape(url)
            )
        })
        .unwrap_or_default();

    let html = format!(
        r#"<div style="font-family:system-ui,-apple-system,Segoe UI,Roboto,Arial,sans-serif;line-height:1.5;color:#0f172a">
  <h2 style="margin:0 0 8px">Your website is ready</h2>
  <p style="margin:0 0 12px">Thanks for your purchase for <strong>{brand}</strong>. Your site is attached as <code>{attachment}</code>.</p>
  <p style="margin:0 0 12px"><strong>How to use it:</strong><br/>1) Download the attachment<br/>2) Rename it if you like (e.g. <code>index.html</code>)<br/>3) Open it in your browser or upload it to your hosting</p>
  {help}
</div>"#,
        attachment = SITE_ATTACHMENT_NAME,
    );

    OutboundEmail {
        from: from.to_string(),
        to: vec![to.to_string()],
        subject: format!("Your new website for {business_name}"),
        html,
        reply_to: None,
        attachments: vec![Attachment {
            filename: SITE_ATTACHMENT_NAME.to_string(),
            content: STANDARD.encode(site_html.as_bytes()),
        }],
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Lead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    pub source: String,
    pub site_url: String,
}

/// Owner notification for a lead; every field is escaped.
pub fn lead_email(from: &str, to: &str, lead: &Lead) -> OutboundEmail {
    let field = |value: &str| {
        if value.trim().is_empty() {
            "&mdash;".to_string()
        } else {
            escape(value.trim()).to_string()
        }
    };
    let html = format!(
        r#"<div style="font-family:system-ui,-apple-system,Segoe UI,Roboto,Arial,sans-serif">
  <h2>New Website Lead</h2>
  <p><strong>Name:</strong> {name}</p>
  <p><strong>Email:</strong> {email}</p>
  <p><strong>Phone:</strong> {phone}</p>
  <p><strong>Source:</strong> {source}</p>
  <p><strong>Site URL:</strong> {site_url}</p>
  <p><strong>Message:</strong></p>
  <pre style="white-space:pre-wrap;background:#f6f8fa;padding:12px;border-radius:8px">{message}</pre>
</div>"#,
        name = field(&lead.name),
        email = field(&lead.email),
        phone = field(&lead.phone),
        source = field(&lead.source),
        site_url = field(&lead.site_url),
        message = field(&lead.message),
    );
    let subject_name = if lead.name.trim().is_empty() {
        "Website"
    } else {
        lead.name.trim()
    };

    OutboundEmail {
        from: from.to_string(),
        to: vec![to.to_string()],
        subject: format!("New Lead: {subject_name}"),
        html,
        reply_to: Some(lead.email.trim().to_string()).filter(|email| !email.is_empty()),
        attachments: Vec::new(),
    }
}
