use reqwest::Client;
use serde_json::Value;
use tracing::warn;

/// Posts rows to a spreadsheet webhook. Failures are logged and never surfaced.
#[derive(Clone)]
pub struct SheetsForwarder {
    client: Client,
    url: String,
}

impl SheetsForwarder {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub async fn forward(&self, row: &Value) {
        match self.client.post(&self.url).json(row).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "sheets webhook rejected row");
            }
            Ok(_) => {}
            Err(err) => warn!(?err, "sheets webhook forwarding failed"),
        }
    }
}

/// Flattens `{timestamp, event, ...data}` into one row.
pub fn tracking_row(timestamp: &str, event: &str, data: Option<&Value>) -> Value {
    let mut row = serde_json::Map::new();
    row.insert("timestamp".to_string(), Value::from(timestamp));
    row.insert("event".to_string(), Value::from(event));
    if let Some(Value::Object(extra)) = data {
        for (key, value) in extra {
            row.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    Value::Object(row)
}
