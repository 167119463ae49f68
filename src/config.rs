//! Configuration types.
//!
//! Three independent knobs sets, one per external collaborator:
//!
//! * [`ParseConfig`]: rendering, cropping and walking a document. Built via
//!   [`ParseConfigBuilder`].
//! * [`NarrationConfig`]: the optional language-model pass over tables and
//!   diagrams. Built via [`NarrationConfigBuilder`].
//! * [`AnalyzerConfig`]: where the Document AI processor lives and how to
//!   authenticate. Normally read from the environment.
//!
//! # Design choice: builder over constructor
//! Callers set only what they care about and rely on documented defaults
//! for the rest; setters clamp to safe ranges and `build()` validates.

use crate::error::Layout2JsonError;
use crate::progress::ProgressCallback;
use crate::tree::DEFAULT_MAX_DEPTH;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Parse ────────────────────────────────────────────────────────────────

/// Configuration for one `parse` call.
///
/// # Example
/// ```rust
/// use layout2json::ParseConfig;
///
/// let config = ParseConfig::builder()
///     .output_dir("out")
///     .dpi(150)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ParseConfig {
    /// Directory for the JSON result and the `images/` crops. Default: `output`.
    pub output_dir: PathBuf,

    /// Rendering DPI for page rasters. Range: 72–400. Default: 200.
    ///
    /// Crops are cut from these rasters, so this is the resolution of every
    /// saved image region.
    pub dpi: u32,

    /// Cap on the longest edge of a rendered page, in pixels. Default: 4000.
    ///
    /// Keeps memory bounded for oversized pages (posters, A0 drawings)
    /// regardless of DPI.
    pub max_rendered_pixels: u32,

    /// Render pages and crop visual regions. Default: true.
    ///
    /// When false, visual nodes are still emitted but never get `filePath`.
    pub crop_images: bool,

    /// Nesting limit of the block walk. Default: 256.
    pub max_depth: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress events for the CLI or a host application.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            dpi: 200,
            max_rendered_pixels: 4000,
            crop_images: true,
            max_depth: DEFAULT_MAX_DEPTH,
            password: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ParseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseConfig")
            .field("output_dir", &self.output_dir)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("crop_images", &self.crop_images)
            .field("max_depth", &self.max_depth)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl ParseConfig {
    pub fn builder() -> ParseConfigBuilder {
        ParseConfigBuilder {
            config: Self::default(),
        }
    }

    /// Render scale factor relative to PDF points (72 per inch).
    pub fn render_scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// Builder for [`ParseConfig`].
#[derive(Debug)]
pub struct ParseConfigBuilder {
    config: ParseConfig,
}

impl ParseConfigBuilder {
    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.output_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn crop_images(mut self, v: bool) -> Self {
        self.config.crop_images = v;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ParseConfig, Layout2JsonError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(Layout2JsonError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(Layout2JsonError::InvalidConfig(
                "Output directory must not be empty".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(Layout2JsonError::InvalidConfig(
                "Download timeout must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Narration ────────────────────────────────────────────────────────────

/// Default narrative model when none is configured.
pub const DEFAULT_NARRATION_MODEL: &str = "gpt-4o";

/// Configuration for the narrative pass.
#[derive(Clone)]
pub struct NarrationConfig {
    /// LLM model identifier. Default: `gpt-4o`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the
    /// environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens per narrative. Default: 500.
    pub max_tokens: usize,

    /// Retry attempts on a failed model call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Concurrent model calls. Default: 4.
    pub concurrency: usize,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Describe `table` nodes. Default: true.
    pub narrate_tables: bool,

    /// Describe cropped visual nodes. Default: true.
    pub narrate_visuals: bool,

    /// Smallest page fraction a visual must cover to be described. Default: 0.05.
    pub min_visual_area: f64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.3,
            max_tokens: 500,
            max_retries: 3,
            retry_backoff_ms: 500,
            concurrency: 4,
            api_timeout_secs: 60,
            narrate_tables: true,
            narrate_visuals: true,
            min_visual_area: 0.05,
        }
    }
}

impl fmt::Debug for NarrationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NarrationConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("concurrency", &self.concurrency)
            .field("narrate_tables", &self.narrate_tables)
            .field("narrate_visuals", &self.narrate_visuals)
            .field("min_visual_area", &self.min_visual_area)
            .finish()
    }
}

impl NarrationConfig {
    pub fn builder() -> NarrationConfigBuilder {
        NarrationConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_NARRATION_MODEL)
    }
}

/// Builder for [`NarrationConfig`].
#[derive(Debug)]
pub struct NarrationConfigBuilder {
    config: NarrationConfig,
}

impl NarrationConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn narrate_tables(mut self, v: bool) -> Self {
        self.config.narrate_tables = v;
        self
    }

    pub fn narrate_visuals(mut self, v: bool) -> Self {
        self.config.narrate_visuals = v;
        self
    }

    pub fn min_visual_area(mut self, area: f64) -> Self {
        self.config.min_visual_area = area.clamp(0.0, 1.0);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<NarrationConfig, Layout2JsonError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(Layout2JsonError::InvalidConfig(
                "Max tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Layout2JsonError::InvalidConfig(
                "API timeout must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Analyzer ─────────────────────────────────────────────────────────────

pub const ENV_PROJECT_ID: &str = "DOCAI_PROJECT_ID";
pub const ENV_LOCATION: &str = "DOCAI_LOCATION";
pub const ENV_PROCESSOR_ID: &str = "DOCAI_PROCESSOR_ID";
pub const ENV_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const ENV_ACCESS_TOKEN: &str = "DOCAI_ACCESS_TOKEN";
pub const ENV_ENDPOINT: &str = "DOCAI_ENDPOINT";

/// Processor region used when none is configured.
pub const DEFAULT_LOCATION: &str = "us";

/// Where the Document AI processor lives and how to reach it.
#[derive(Clone, PartialEq, Eq)]
pub struct AnalyzerConfig {
    pub project_id: String,
    pub location: String,
    pub processor_id: String,
    /// Service-account key file, passed through to `gcloud`.
    pub credentials_path: Option<PathBuf>,
    /// Bearer token; when absent one is obtained from `gcloud`.
    pub access_token: Option<String>,
    /// Base URL override (e.g. a regional or private endpoint).
    pub endpoint: Option<String>,
    /// Timeout of the analysis call in seconds. Default: 300.
    pub timeout_secs: u64,
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("processor_id", &self.processor_id)
            .field("credentials_path", &self.credentials_path)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AnalyzerConfig {
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        processor_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            processor_id: processor_id.into(),
            credentials_path: None,
            access_token: None,
            endpoint: None,
            timeout_secs: 300,
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, Layout2JsonError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup` (an environment stand-in).
    ///
    /// Empty values count as unset. The project and processor are required;
    /// a credentials path, when given, must point at an existing file.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Layout2JsonError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let require = |key: &str| {
            get(key).ok_or_else(|| Layout2JsonError::AnalyzerNotConfigured {
                missing: key.to_string(),
                hint: format!(
                    "Set {ENV_PROJECT_ID}, {ENV_PROCESSOR_ID} and optionally {ENV_LOCATION} \
                     (default \"{DEFAULT_LOCATION}\"), or pass --analysis with a saved result."
                ),
            })
        };

        let project_id = require(ENV_PROJECT_ID)?;
        let processor_id = require(ENV_PROCESSOR_ID)?;
        let location = get(ENV_LOCATION).unwrap_or_else(|| DEFAULT_LOCATION.to_string());

        let credentials_path = get(ENV_CREDENTIALS).map(PathBuf::from);
        if let Some(path) = &credentials_path {
            if !path.is_file() {
                return Err(Layout2JsonError::AnalyzerNotConfigured {
                    missing: ENV_CREDENTIALS.to_string(),
                    hint: format!("Credentials file not found: {}", path.display()),
                });
            }
        }

        Ok(Self {
            credentials_path,
            access_token: get(ENV_ACCESS_TOKEN),
            endpoint: get(ENV_ENDPOINT),
            ..Self::new(project_id, location, processor_id)
        })
    }

    /// `projects/{p}/locations/{l}/processors/{id}`.
    pub fn processor_name(&self) -> String {
        format!(
            "projects/{}/locations/{}/processors/{}",
            self.project_id, self.location, self.processor_id
        )
    }

    /// Base URL of the REST API, without a trailing slash.
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}-documentai.googleapis.com", self.location),
        }
    }

    /// URL of the processor resource.
    pub fn processor_url(&self) -> String {
        format!("{}/v1/{}", self.base_url(), self.processor_name())
    }

    /// URL of the `:process` method.
    pub fn process_url(&self) -> String {
        format!("{}:process", self.processor_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_defaults() {
        let c = ParseConfig::default();
        assert_eq!(c.dpi, 200);
        assert_eq!(c.max_depth, 256);
        assert_eq!(c.output_dir, PathBuf::from("output"));
        assert!(c.crop_images);
        assert!((c.render_scale() - 200.0 / 72.0).abs() < 1e-6);
    }

    #[test]
    fn parse_builder_clamps() {
        let c = ParseConfig::builder()
            .dpi(1000)
            .max_depth(0)
            .max_rendered_pixels(5)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 400);
        assert_eq!(c.max_depth, 1);
        assert_eq!(c.max_rendered_pixels, 100);
    }

    #[test]
    fn parse_builder_rejects_empty_output_dir() {
        let err = ParseConfig::builder().output_dir("").build().unwrap_err();
        assert!(matches!(err, Layout2JsonError::InvalidConfig(_)));
    }

    #[test]
    fn password_is_redacted_in_debug() {
        let c = ParseConfig::builder().password("hunter2").build().unwrap();
        assert!(!format!("{c:?}").contains("hunter2"));
    }

    #[test]
    fn narration_defaults() {
        let c = NarrationConfig::default();
        assert_eq!(c.model_name(), "gpt-4o");
        assert_eq!(c.temperature, 0.3);
        assert_eq!(c.max_tokens, 500);
        assert_eq!(c.min_visual_area, 0.05);
    }

    #[test]
    fn narration_builder_validates() {
        assert!(NarrationConfig::builder().max_tokens(0).build().is_err());
        let c = NarrationConfig::builder()
            .concurrency(0)
            .temperature(5.0)
            .min_visual_area(2.0)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.min_visual_area, 1.0);
    }

    #[test]
    fn analyzer_from_lookup() {
        let c = AnalyzerConfig::from_lookup(env(&[
            (ENV_PROJECT_ID, "proj"),
            (ENV_PROCESSOR_ID, "abc123"),
            (ENV_ACCESS_TOKEN, "tok"),
        ]))
        .unwrap();
        assert_eq!(c.location, "us");
        assert_eq!(c.access_token.as_deref(), Some("tok"));
        assert_eq!(
            c.process_url(),
            "https://us-documentai.googleapis.com/v1/projects/proj/locations/us/processors/abc123:process"
        );
        assert!(!format!("{c:?}").contains("tok\""));
    }

    #[test]
    fn analyzer_requires_project_and_processor() {
        let err = AnalyzerConfig::from_lookup(env(&[(ENV_PROJECT_ID, "proj"), (ENV_PROCESSOR_ID, " ")]))
            .unwrap_err();
        match err {
            Layout2JsonError::AnalyzerNotConfigured { missing, .. } => {
                assert_eq!(missing, ENV_PROCESSOR_ID)
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(AnalyzerConfig::from_lookup(env(&[])).is_err());
    }

    #[test]
    fn analyzer_rejects_missing_credentials_file() {
        let err = AnalyzerConfig::from_lookup(env(&[
            (ENV_PROJECT_ID, "p"),
            (ENV_PROCESSOR_ID, "x"),
            (ENV_CREDENTIALS, "/definitely/not/here.json"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(ENV_CREDENTIALS));
    }

    #[test]
    fn analyzer_endpoint_override() {
        let c = AnalyzerConfig::from_lookup(env(&[
            (ENV_PROJECT_ID, "p"),
            (ENV_PROCESSOR_ID, "x"),
            (ENV_LOCATION, "eu"),
            (ENV_ENDPOINT, "http://127.0.0.1:9000/"),
        ]))
        .unwrap();
        assert_eq!(
            c.process_url(),
            "http://127.0.0.1:9000/v1/projects/p/locations/eu/processors/x:process"
        );
    }
}
