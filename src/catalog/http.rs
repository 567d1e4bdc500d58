use crate::catalog::{Catalog, SnapshotSelector};
use crate::error::{PatchError, Result};
use crate::model::{Status, TemplateId, TemplateSnapshot};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_RESPONSE_BYTES: u64 = 10 * 1024 * 1024;

/// Catalog service client.
///
/// `GET {base}/templates/{template_id}/snapshots?min_status={status}` answers
/// with a JSON array of snapshots; `404` means the template is unknown.
pub struct HttpCatalog {
    client: Client,
    base: Url,
}

impl HttpCatalog {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Self::validate_base_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("masterpatch/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(false)
            .build()
            .map_err(|e| PatchError::Catalog(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base })
    }

    fn validate_base_url(url: &str) -> Result<Url> {
        let parsed = Url::parse(url)
            .map_err(|_| PatchError::Config(format!("Invalid catalog URL: {url}")))?;

        match parsed.scheme() {
            "https" => {}
            "http" => warn!("Catalog URL {} is not using TLS", url),
            scheme => {
                return Err(PatchError::Config(format!(
                    "Unsupported catalog scheme: {scheme}"
                )));
            }
        }

        if parsed.cannot_be_a_base() || parsed.host_str().is_none() {
            return Err(PatchError::Config(format!("Invalid catalog URL: {url}")));
        }

        Ok(parsed)
    }

    fn snapshots_url(&self, template_id: &TemplateId, min_status: Status) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| PatchError::Config(format!("Invalid catalog URL: {}", self.base)))?
            .pop_if_empty()
            .extend(["templates", template_id.as_str(), "snapshots"]);
        url.query_pairs_mut()
            .clear()
            .append_pair("min_status", &min_status.to_string());
        Ok(url)
    }

    fn fetch_snapshots(&self, url: &Url) -> Result<Option<Vec<TemplateSnapshot>>> {
        debug!("Fetching: {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| PatchError::Catalog(format!("request to {} failed: {}", url, e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(PatchError::Catalog(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let mut body = Vec::new();
        response
            .take(MAX_RESPONSE_BYTES + 1)
            .read_to_end(&mut body)
            .map_err(|e| PatchError::Catalog(format!("reading {} failed: {}", url, e)))?;
        if body.len() as u64 > MAX_RESPONSE_BYTES {
            return Err(PatchError::Catalog(
                "Catalog response exceeded 10MB limit".to_string(),
            ));
        }

        let snapshots: Vec<TemplateSnapshot> = serde_json::from_slice(&body).map_err(|e| {
            PatchError::Catalog(format!("Failed to parse catalog response: {}", e))
        })?;
        Ok(Some(snapshots))
    }
}

impl Catalog for HttpCatalog {
    fn latest_eligible(
        &self,
        template_id: &TemplateId,
        min_status: Status,
    ) -> Result<Option<TemplateSnapshot>> {
        let url = self.snapshots_url(template_id, min_status)?;
        let Some(snapshots) = self.fetch_snapshots(&url)? else {
            return Ok(None);
        };
        Ok(SnapshotSelector::select(&snapshots, template_id, min_status).cloned())
    }

    fn describe(&self) -> String {
        self.base.to_string()
    }
}
