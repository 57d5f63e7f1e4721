use serde_json::Value;

/// Write-only, best-effort mirror of selected documents to a secondary
/// document store. Never read back, never allowed to fail the primary
/// operation; a failed write is logged and forgotten.
#[derive(Clone)]
pub struct Mirror {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl Mirror {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    /// Fire-and-forget write of one document into `collection`.
    pub fn record(&self, collection: &'static str, doc: Value) {
        let Some(base) = self.base_url.clone() else {
            return;
        };
        let client = self.client.clone();

        tokio::spawn(async move {
            let url = format!("{}/{collection}", base.trim_end_matches('/'));
            match client.post(&url).json(&doc).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    tracing::warn!(collection, status = %resp.status(), "mirror write rejected");
                }
                Err(err) => {
                    tracing::warn!(collection, "mirror write failed: {err}");
                }
                Ok(_) => {}
            }
        });
    }
}
