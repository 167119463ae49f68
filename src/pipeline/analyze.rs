//! Layout analysis: PDF bytes → [`RawLayoutResult`].
//!
//! [`LayoutAnalyzer`] is the seam between the pipeline and whatever produced
//! the block tree:
//!
//! * [`DocumentAiClient`] calls a Document AI layout processor over REST.
//! * [`SavedAnalysis`] reads a result saved earlier (offline runs, tests).
//! * A decoded [`RawLayoutResult`] is itself an analyzer that returns a copy.
//!
//! Analysis failures are fatal for the document and are not retried here.

use crate::config::{AnalyzerConfig, ENV_ACCESS_TOKEN, ENV_CREDENTIALS};
use crate::error::Layout2JsonError;
use crate::model::RawLayoutResult;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Produces the layout-analysis result for one PDF.
pub trait LayoutAnalyzer: Send + Sync {
    fn analyze<'a>(
        &'a self,
        pdf: &'a [u8],
    ) -> BoxFuture<'a, Result<RawLayoutResult, Layout2JsonError>>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

impl LayoutAnalyzer for RawLayoutResult {
    fn analyze<'a>(
        &'a self,
        _pdf: &'a [u8],
    ) -> BoxFuture<'a, Result<RawLayoutResult, Layout2JsonError>> {
        Box::pin(async move { Ok(self.clone()) })
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

// ── Saved result ─────────────────────────────────────────────────────────

/// Reads a previously saved analysis JSON instead of calling the service.
///
/// Accepts a bare `Document` or a `{"document": {...}}` response.
#[derive(Debug, Clone)]
pub struct SavedAnalysis {
    path: PathBuf,
}

impl SavedAnalysis {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<RawLayoutResult, Layout2JsonError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Layout2JsonError::FileNotFound {
                path: self.path.clone(),
            },
            std::io::ErrorKind::PermissionDenied => Layout2JsonError::PermissionDenied {
                path: self.path.clone(),
            },
            _ => Layout2JsonError::Internal(format!("Failed to read {}: {e}", self.path.display())),
        })?;
        RawLayoutResult::from_json_slice(&bytes).map_err(|e| {
            Layout2JsonError::InvalidAnalysis(format!("{}: {e}", self.path.display()))
        })
    }
}

impl LayoutAnalyzer for SavedAnalysis {
    fn analyze<'a>(
        &'a self,
        _pdf: &'a [u8],
    ) -> BoxFuture<'a, Result<RawLayoutResult, Layout2JsonError>> {
        Box::pin(async move {
            info!("Loading saved analysis: {}", self.path.display());
            self.load().await
        })
    }

    fn name(&self) -> &str {
        "saved"
    }
}

// ── Document AI ──────────────────────────────────────────────────────────

/// Processor metadata returned by [`DocumentAiClient::verify_setup`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, rename = "type")]
    pub processor_type: String,
    #[serde(default)]
    pub state: String,
}

/// REST client for a Document AI layout processor.
pub struct DocumentAiClient {
    config: AnalyzerConfig,
    http: reqwest::Client,
}

impl DocumentAiClient {
    pub fn new(config: AnalyzerConfig) -> Result<Self, Layout2JsonError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| Layout2JsonError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    /// Build a client from `DOCAI_*` environment variables.
    pub fn from_env() -> Result<Self, Layout2JsonError> {
        Self::new(AnalyzerConfig::from_env()?)
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Check that the processor exists and the credentials can reach it.
    pub async fn verify_setup(&self) -> Result<ProcessorInfo, Layout2JsonError> {
        let token = self.access_token().await?;
        let url = self.config.processor_url();
        debug!("Verifying processor: {}", url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .header("x-goog-user-project", &self.config.project_id)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let body = self.success_body(response).await?;

        serde_json::from_slice(&body)
            .map_err(|e| Layout2JsonError::InvalidAnalysis(format!("processor info: {e}")))
    }

    async fn process(&self, pdf: &[u8]) -> Result<RawLayoutResult, Layout2JsonError> {
        let token = self.access_token().await?;
        let url = self.config.process_url();
        info!(
            "Analyzing {} bytes with {}",
            pdf.len(),
            self.config.processor_name()
        );

        let body = serde_json::json!({
            "rawDocument": {
                "content": STANDARD.encode(pdf),
                "mimeType": "application/pdf",
            }
        });
        let body = serde_json::to_vec(&body)
            .map_err(|e| Layout2JsonError::Internal(format!("request body: {e}")))?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .header("x-goog-user-project", &self.config.project_id)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let bytes = self.success_body(response).await?;
        debug!("Analysis response: {} bytes", bytes.len());

        RawLayoutResult::from_json_slice(&bytes)
            .map_err(|e| Layout2JsonError::InvalidAnalysis(e.to_string()))
    }

    async fn success_body(&self, response: reqwest::Response) -> Result<Vec<u8>, Layout2JsonError> {
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(Layout2JsonError::AnalysisFailed {
                status: status.as_u16(),
                detail: excerpt(&String::from_utf8_lossy(&bytes), 500),
            });
        }
        Ok(bytes.to_vec())
    }

    fn transport_error(&self, e: reqwest::Error) -> Layout2JsonError {
        if e.is_timeout() {
            Layout2JsonError::AnalysisTimeout {
                secs: self.config.timeout_secs,
            }
        } else {
            Layout2JsonError::AnalysisTransport(e.to_string())
        }
    }

    /// Explicit token, else `gcloud auth application-default print-access-token`.
    async fn access_token(&self) -> Result<String, Layout2JsonError> {
        if let Some(token) = &self.config.access_token {
            return Ok(token.clone());
        }

        let not_configured = |hint: String| Layout2JsonError::AnalyzerNotConfigured {
            missing: "access token".to_string(),
            hint,
        };

        let mut cmd = tokio::process::Command::new("gcloud");
        cmd.args(["auth", "application-default", "print-access-token"]);
        if let Some(path) = &self.config.credentials_path {
            cmd.env(ENV_CREDENTIALS, path);
        }

        let output = cmd.output().await.map_err(|e| {
            not_configured(format!(
                "Set {ENV_ACCESS_TOKEN} or install the gcloud CLI ({e})."
            ))
        })?;
        if !output.status.success() {
            return Err(not_configured(format!(
                "gcloud could not print an access token: {}",
                excerpt(&String::from_utf8_lossy(&output.stderr), 300)
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(not_configured("gcloud printed an empty access token.".into()));
        }
        Ok(token)
    }
}

impl LayoutAnalyzer for DocumentAiClient {
    fn analyze<'a>(
        &'a self,
        pdf: &'a [u8],
    ) -> BoxFuture<'a, Result<RawLayoutResult, Layout2JsonError>> {
        Box::pin(self.process(pdf))
    }

    fn name(&self) -> &str {
        "document-ai"
    }
}

/// First `max` characters of `text`, trimmed, with `…` when cut.
fn excerpt(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
