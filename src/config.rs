use thiserror::Error;

use crate::plan::Plan;
use crate::stripe::DEFAULT_API_BASE;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DATABASE_URL: &str = "sqlite://sitecraft.db?mode=rwc";
const DEFAULT_SITE_URL: &str = "http://localhost:8080";
const DEFAULT_FROM_EMAIL: &str = "no-reply@example.com";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value `{value}`")]
    InvalidValue { key: &'static str, value: String },
}

/// Stripe price ids per plan. Only ids listed here are ever charged.
#[derive(Clone, Debug, Default)]
pub struct PriceTable {
    pub basic: Option<String>,
    pub pro: Option<String>,
    pub business: Option<String>,
}

impl PriceTable {
    pub fn price_for(&self, plan: Plan) -> Option<&str> {
        match plan {
            Plan::Basic => self.basic.as_deref(),
            Plan::Pro => self.pro.as_deref(),
            Plan::Business => self.business.as_deref(),
        }
    }

    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        Plan::ALL
            .into_iter()
            .find(|plan| self.price_for(*plan) == Some(price_id))
    }
}

pub fn price_env_key(plan: Plan) -> &'static str {
    match plan {
        Plan::Basic => "STRIPE_PRICE_BASIC",
        Plan::Pro => "STRIPE_PRICE_PRO",
        Plan::Business => "STRIPE_PRICE_BUSINESS",
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub site_url: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_base: String,
    pub prices: PriceTable,
    pub resend_api_key: Option<String>,
    pub from_email: String,
    pub lead_to_email: Option<String>,
    pub openai_api_key: Option<String>,
    pub sheets_webhook: Option<String>,
    pub webhook_tolerance_secs: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: DEFAULT_API_BASE.to_string(),
            prices: PriceTable::default(),
            resend_api_key: None,
            from_email: DEFAULT_FROM_EMAIL.to_string(),
            lead_to_email: None,
            openai_api_key: None,
            sheets_webhook: None,
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment (after loading `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let webhook_tolerance_secs = match get("WEBHOOK_TOLERANCE_SECS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: "WEBHOOK_TOLERANCE_SECS",
                    value: raw,
                })?,
            None => defaults.webhook_tolerance_secs,
        };

        let site_url = get("SITE_URL").unwrap_or(defaults.site_url);
        if !(site_url.starts_with("http://") || site_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "SITE_URL",
                value: site_url,
            });
        }

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            site_url: site_url.trim_end_matches('/').to_string(),
            stripe_secret_key: get("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
            stripe_api_base: get("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            prices: PriceTable {
                basic: get(price_env_key(Plan::Basic)),
                pro: get(price_env_key(Plan::Pro)),
                business: get(price_env_key(Plan::Business)),
            },
            resend_api_key: get("RESEND_API_KEY"),
            from_email: get("FROM_EMAIL").unwrap_or(defaults.from_email),
            lead_to_email: get("LEAD_TO_EMAIL"),
            openai_api_key: get("OPENAI_API_KEY"),
            sheets_webhook: get("SHEETS_WEBHOOK"),
            webhook_tolerance_secs,
        })
    }

    pub fn success_url(&self) -> String {
        format!("{}/success?session_id={{CHECKOUT_SESSION_ID}}", self.site_url)
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/cancel", self.site_url)
    }

    /// Client-supplied redirect targets are only honoured on our own origin.
    pub fn same_origin(&self, url: &str) -> bool {
        url == self.site_url || url.starts_with(&format!("{}/", self.site_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let settings = settings(&[]).expect("settings");
        assert_eq!(settings.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(settings.webhook_tolerance_secs, 300);
        assert!(settings.stripe_secret_key.is_none());
        assert_eq!(
            settings.success_url(),
            "http://localhost:8080/success?session_id={CHECKOUT_SESSION_ID}"
        );
    }

    #[test]
    fn reads_prices_and_ignores_blank_values() {
        let settings = settings(&[
            ("STRIPE_PRICE_PRO", "price_pro"),
            ("STRIPE_PRICE_BASIC", "   "),
            ("SITE_URL", "https://builder.test/"),
        ])
        .expect("settings");
        assert_eq!(settings.prices.price_for(Plan::Pro), Some("price_pro"));
        assert_eq!(settings.prices.price_for(Plan::Basic), None);
        assert_eq!(settings.prices.plan_for_price("price_pro"), Some(Plan::Pro));
        assert_eq!(settings.site_url, "https://builder.test");
        assert!(settings.same_origin("https://builder.test/thanks"));
        assert!(!settings.same_origin("https://builder.test.evil.com/"));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(settings(&[("WEBHOOK_TOLERANCE_SECS", "soon")]).is_err());
        assert!(settings(&[("WEBHOOK_TOLERANCE_SECS", "-5")]).is_err());
        assert!(settings(&[("SITE_URL", "builder.test")]).is_err());
    }
}
