use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::info;

use crate::config::Settings;
use crate::images::{ImageGenerator, OpenAiImages};
use crate::mailer::{Mailer, ResendMailer};
use crate::sheets::SheetsForwarder;
use crate::store::Store;
use crate::stripe::{PaymentProvider, StripeClient};

/// Shared handler state. Integrations left unconfigured stay `None`.
#[derive(Clone)]
pub struct AppState {
    settings: Arc<Settings>,
    store: Store,
    payments: Option<Arc<dyn PaymentProvider>>,
    mailer: Option<Arc<dyn Mailer>>,
    images: Option<Arc<dyn ImageGenerator>>,
    sheets: Option<SheetsForwarder>,
}

impl AppState {
    pub fn new(settings: Settings, store: Store) -> Self {
        Self {
            settings: Arc::new(settings),
            store,
            payments: None,
            mailer: None,
            images: None,
            sheets: None,
        }
    }

    /// Connects the store and builds every integration the settings enable.
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let store = Store::initialize(&settings.database_url).await?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .build()
            .context("failed to build http client")?;

        let payments = settings.stripe_secret_key.as_ref().map(|key| {
            Arc::new(
                StripeClient::new(client.clone(), key.clone())
                    .with_api_base(settings.stripe_api_base.clone()),
            ) as Arc<dyn PaymentProvider>
        });
        let mailer = settings
            .resend_api_key
            .as_ref()
            .map(|key| Arc::new(ResendMailer::new(client.clone(), key.clone())) as Arc<dyn Mailer>);
        let images = settings.openai_api_key.as_ref().map(|key| {
            Arc::new(OpenAiImages::new(client.clone(), key.clone())) as Arc<dyn ImageGenerator>
        });
        let sheets = settings
            .sheets_webhook
            .as_ref()
            .map(|url| SheetsForwarder::new(client.clone(), url.clone()));

        info!(
            payments = payments.is_some(),
            mail = mailer.is_some(),
            image_api = images.is_some(),
            sheets = sheets.is_some(),
            "integrations configured"
        );

        Ok(Self {
            settings: Arc::new(settings),
            store,
            payments,
            mailer,
            images,
            sheets,
        })
    }

    pub fn with_payments(mut self, payments: Arc<dyn PaymentProvider>) -> Self {
        self.payments = Some(payments);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_images(mut self, images: Arc<dyn ImageGenerator>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn payments(&self) -> Option<&dyn PaymentProvider> {
        self.payments.as_deref()
    }

    pub fn mailer(&self) -> Option<&dyn Mailer> {
        self.mailer.as_deref()
    }

    pub fn images(&self) -> Option<&dyn ImageGenerator> {
        self.images.as_deref()
    }

    pub fn sheets(&self) -> Option<&SheetsForwarder> {
        self.sheets.as_ref()
    }
}
