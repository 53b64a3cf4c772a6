//! Pins proposal metadata through the IPFS HTTP API.

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

pub struct IpfsPinner {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl IpfsPinner {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn add_url(&self) -> String {
        format!("{}/api/v0/add?pin=true", self.base_url.trim_end_matches('/'))
    }

    /// Pin `value` as a JSON document and return `ipfs://<cid>`.
    pub async fn pin_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let body = serde_json::to_vec(value).context("Failed to serialize metadata")?;
        let part = Part::bytes(body)
            .file_name("metadata.json")
            .mime_str("application/json")?;
        let form = Form::new().part("path", part);

        let mut request = self.http.post(self.add_url()).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-KEY", key);
        }

        let response: AddResponse = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .context("IPFS add request failed")?
            .json()
            .await
            .context("Unexpected IPFS add response")?;

        tracing::debug!(cid = %response.hash, "Metadata pinned");
        Ok(format!("ipfs://{}", response.hash))
    }
}
