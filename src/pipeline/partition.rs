//! Element extraction via an Unstructured-compatible partitioning API.
//!
//! The PDF is posted as a multipart form; the service answers with the JSON
//! element array that becomes `01_partitioned/<name>.json`. With the `hi_res`
//! strategy each element carries a bounding polygon, and Image/Table elements
//! carry their raster as an inline base64 payload.

use crate::config::{PartitionStrategy, PipelineConfig};
use crate::error::IngestError;
use crate::model::RawElement;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Turns one PDF into its ordered element list.
#[async_trait]
pub trait Partitioner: Send + Sync {
    async fn partition(&self, pdf: &Path) -> Result<Vec<RawElement>, IngestError>;
}

/// HTTP client for the hosted (or self-hosted) Unstructured API.
pub struct UnstructuredClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    strategy: PartitionStrategy,
    extract_image_block_types: Vec<String>,
    split_pdf_concurrency: usize,
}

impl UnstructuredClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, IngestError> {
        let api_key = config.require_unstructured_key()?.to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.partition_timeout_secs))
            .build()
            .map_err(|e| IngestError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.unstructured_url.clone(),
            api_key,
            strategy: config.strategy,
            extract_image_block_types: config.extract_image_block_types.clone(),
            split_pdf_concurrency: config.split_pdf_concurrency,
        })
    }

    /// Text fields sent alongside the file.
    fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("strategy", self.strategy.as_str().to_string()),
            ("coordinates", "true".to_string()),
            ("split_pdf_page", "true".to_string()),
            ("split_pdf_allow_failed", "true".to_string()),
            (
                "split_pdf_concurrency_level",
                self.split_pdf_concurrency.to_string(),
            ),
        ];
        for kind in &self.extract_image_block_types {
            fields.push(("extract_image_block_types", kind.clone()));
        }
        fields
    }
}

#[async_trait]
impl Partitioner for UnstructuredClient {
    async fn partition(&self, pdf: &Path) -> Result<Vec<RawElement>, IngestError> {
        let failed = |reason: String| IngestError::PartitionFailed {
            path: pdf.to_path_buf(),
            reason,
        };

        let bytes = tokio::fs::read(pdf).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IngestError::FileNotFound {
                    path: pdf.to_path_buf(),
                }
            } else {
                IngestError::ReadFailed {
                    path: pdf.to_path_buf(),
                    source: e,
                }
            }
        })?;
        let file_name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(|e| failed(e.to_string()))?;
        let form = self
            .form_fields()
            .into_iter()
            .fold(Form::new().part("files", part), |form, (k, v)| form.text(k, v));

        info!("Partitioning {} ({})", pdf.display(), self.strategy.as_str());
        let start = Instant::now();

        let response = self
            .client
            .post(&self.url)
            .header("unstructured-api-key", &self.api_key)
            .header("accept", "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    failed("request timed out".to_string())
                } else {
                    failed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("HTTP {}: {}", status, body.chars().take(300).collect::<String>())));
        }

        let elements: Vec<RawElement> = response
            .json()
            .await
            .map_err(|e| failed(format!("unexpected response body: {e}")))?;

        debug!(
            "Partitioned {} → {} elements in {:?}",
            pdf.display(),
            elements.len(),
            start.elapsed()
        );
        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> UnstructuredClient {
        let config = PipelineConfig::builder()
            .unstructured_api_key("test-key")
            .build()
            .unwrap();
        UnstructuredClient::new(&config).expect("client")
    }

    #[test]
    fn requires_api_key() {
        let err = UnstructuredClient::new(&PipelineConfig::default()).err().expect("no key");
        assert!(matches!(err, IngestError::MissingCredential { .. }));
    }

    #[test]
    fn form_carries_hi_res_options() {
        let fields = client().form_fields();
        assert!(fields.contains(&("strategy", "hi_res".to_string())));
        assert!(fields.contains(&("coordinates", "true".to_string())));
        assert!(fields.contains(&("split_pdf_concurrency_level", "15".to_string())));
        let kinds: Vec<_> = fields
            .iter()
            .filter(|(k, _)| *k == "extract_image_block_types")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(kinds, vec!["Image", "Table"]);
    }

    #[tokio::test]
    async fn missing_pdf_fails_before_any_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = client()
            .partition(&dir.path().join("absent.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound { .. }));
    }
}
