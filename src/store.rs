use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::mailer::Lead;

/// SQLite-backed lead list and webhook event ledger.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn initialize(database_url: &str) -> Result<Self> {
        let mut options = SqlitePoolOptions::new().max_connections(5);
        if database_url.contains(":memory:") {
            // every connection to `:memory:` opens a separate database
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options
            .connect(database_url)
            .await
            .with_context(|| format!("failed to connect to database at {database_url}"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS landing_leads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                phone TEXT NOT NULL,
                message TEXT NOT NULL,
                source TEXT NOT NULL,
                site_url TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to initialize landing_leads table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processed_events (
                event_id TEXT PRIMARY KEY,
                event_type TEXT NOT NULL,
                processed_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to initialize processed_events table")?;

        Ok(Self { pool })
    }

    /// Upserts a lead keyed by normalized email. Blank emails are ignored.
    pub async fn record_lead(&self, lead: &Lead) -> sqlx::Result<()> {
        let normalized_email = lead.email.trim().to_ascii_lowercase();
        if normalized_email.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO landing_leads (email, name, phone, message, source, site_url, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'), STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            ON CONFLICT(email) DO UPDATE SET
                name = excluded.name,
                phone = excluded.phone,
                message = excluded.message,
                source = excluded.source,
                site_url = excluded.site_url,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(normalized_email)
        .bind(lead.name.trim())
        .bind(lead.phone.trim())
        .bind(lead.message.trim())
        .bind(lead.source.trim())
        .bind(lead.site_url.trim())
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    pub async fn lead_count(&self) -> sqlx::Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM landing_leads")
            .fetch_one(&self.pool)
            .await
    }

    /// Records a webhook event id. Returns `false` when the id was already recorded.
    pub async fn claim_event(&self, event_id: &str, event_type: &str) -> sqlx::Result<bool> {
        let result = sqlx::query(
            "INSERT INTO processed_events (event_id, event_type) VALUES (?1, ?2) ON CONFLICT(event_id) DO NOTHING",
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
