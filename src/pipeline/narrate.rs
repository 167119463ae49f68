//! Narrative generation: tables and diagrams → prose, after the walk.
//!
//! The pass never touches the block tree or the walker. It takes a finished
//! [`DocumentResult`], asks a [`Narrator`] for one narrative per eligible
//! node, and returns a rebuilt tree with `narrative` set where a call
//! succeeded. Failures are collected in the [`NarrationReport`]; they never
//! abort the document.
//!
//! Eligible nodes:
//! * `table` nodes with at least one row: the grid is rendered as Markdown
//!   and sent with a [`TableKind`]-specific instruction.
//! * visual nodes with a saved crop covering at least
//!   [`NarrationConfig::min_visual_area`] of the page: the crop is sent to a
//!   vision model. Small regions are usually logos or decoration.
//!
//! ## Retry Strategy
//!
//! Each call gets `api_timeout_secs`; failed or timed-out calls are retried
//! with exponential backoff (`retry_backoff_ms * 2^(retry - 1)`). With 500 ms
//! base and 3 retries the wait sequence is 500 ms → 1 s → 2 s.

use crate::config::NarrationConfig;
use crate::error::{Layout2JsonError, NarrationError};
use crate::model::{DocumentResult, OutputNode};
use crate::pipeline::{encode, postprocess};
use crate::progress::{ProgressCallback, Stage};
use crate::prompts::{
    table_prompt, visual_prompt, VisualKind, TABLE_SYSTEM_PROMPT, VISUAL_SYSTEM_PROMPT,
};
use crate::tree::TableKind;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Error returned by a single [`Narrator::describe`] call.
pub type NarratorError = Box<dyn std::error::Error + Send + Sync>;

/// What a narrator is asked to describe.
#[derive(Clone)]
pub enum NarrationContent {
    Table { markdown: String, kind: TableKind },
    Visual { image: ImageData, kind: VisualKind },
}

impl NarrationContent {
    /// Short label of the content for logs.
    pub fn type_hint(&self) -> String {
        match self {
            NarrationContent::Table { kind, .. } => format!("{} table", kind.as_str()),
            NarrationContent::Visual { kind, .. } => format!("{kind:?}").to_lowercase(),
        }
    }
}

/// One narrator answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarratorReply {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl NarratorReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Describes tables and images in prose.
///
/// Implementations make a single attempt; timeouts and retries are applied
/// by [`narrate_document`].
pub trait Narrator: Send + Sync {
    fn describe<'a>(
        &'a self,
        content: &'a NarrationContent,
    ) -> BoxFuture<'a, Result<NarratorReply, NarratorError>>;
}

// ── LLM narrator ─────────────────────────────────────────────────────────

/// [`Narrator`] backed by an `edgequake_llm` provider.
pub struct LlmNarrator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmNarrator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &NarrationConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: &NarrationConfig) -> Result<Self, Layout2JsonError> {
        Ok(Self::new(resolve_provider(config)?, config))
    }

    fn messages(content: &NarrationContent) -> Vec<ChatMessage> {
        match content {
            NarrationContent::Table { markdown, kind } => vec![
                ChatMessage::system(TABLE_SYSTEM_PROMPT),
                ChatMessage::user(table_prompt(markdown, *kind)),
            ],
            NarrationContent::Visual { image, kind } => vec![
                ChatMessage::system(VISUAL_SYSTEM_PROMPT),
                ChatMessage::user_with_images(visual_prompt(*kind), vec![image.clone()]),
            ],
        }
    }
}

impl Narrator for LlmNarrator {
    fn describe<'a>(
        &'a self,
        content: &'a NarrationContent,
    ) -> BoxFuture<'a, Result<NarratorReply, NarratorError>> {
        Box::pin(async move {
            let messages = Self::messages(content);
            let response = self
                .provider
                .chat(&messages, Some(&self.options))
                .await
                .map_err(|e| -> NarratorError { e.to_string().into() })?;
            Ok(NarratorReply {
                text: response.content,
                prompt_tokens: response.prompt_tokens as u64,
                completion_tokens: response.completion_tokens as u64,
            })
        })
    }
}

fn build_options(config: &NarrationConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Layout2JsonError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Layout2JsonError::NarratorNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with the configured model.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_provider(
    config: &NarrationConfig,
) -> Result<Arc<dyn LLMProvider>, Layout2JsonError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_name());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", config.model_name());
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Layout2JsonError::NarratorNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

// ── Document pass ────────────────────────────────────────────────────────

/// Outcome of a narrative pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationReport {
    /// Nodes that received a narrative.
    pub narrated: usize,
    /// Visual nodes left out (no crop, or too small).
    pub skipped_visuals: usize,
    pub failures: Vec<NarrationError>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub duration_ms: u64,
}

enum JobInput {
    Table { markdown: String, kind: TableKind },
    Visual { path: PathBuf, kind: VisualKind },
}

struct Job {
    /// Pre-order position of the node in the document.
    index: usize,
    node_id: String,
    input: JobInput,
}

/// Attach narratives to every eligible node of `document`.
pub async fn narrate_document(
    document: DocumentResult,
    narrator: &dyn Narrator,
    config: &NarrationConfig,
    progress: Option<&ProgressCallback>,
) -> (DocumentResult, NarrationReport) {
    let start = Instant::now();
    let mut report = NarrationReport::default();
    if let Some(cb) = progress {
        cb.on_stage_start(Stage::Narrate);
    }

    let jobs = collect_jobs(&document, config, &mut report);
    let total = jobs.len();
    info!(
        "Narrating {} nodes ({} visuals skipped)",
        total, report.skipped_visuals
    );

    let done = AtomicUsize::new(0);
    let results: Vec<(usize, String, Result<NarratorReply, NarrationError>)> =
        stream::iter(jobs.into_iter().map(|job| {
            let done = &done;
            async move {
                let result = run_job(&job, narrator, config).await;
                if let Some(cb) = progress {
                    match &result {
                        Ok(_) => {
                            let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                            cb.on_node_narrated(&job.node_id, n, total);
                        }
                        Err(e) => cb.on_node_error(&job.node_id, &e.to_string()),
                    }
                }
                (job.index, job.node_id, result)
            }
        }))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    let mut narratives = HashMap::with_capacity(results.len());
    for (index, node_id, result) in results {
        match result {
            Ok(reply) => {
                debug!("Node {}: narrative of {} chars", node_id, reply.text.len());
                report.prompt_tokens += reply.prompt_tokens;
                report.completion_tokens += reply.completion_tokens;
                narratives.insert(index, reply.text);
            }
            Err(e) => {
                warn!("{}", e);
                report.failures.push(e);
            }
        }
    }
    report.narrated = narratives.len();

    let mut counter = 0;
    let structure = document
        .structure
        .into_iter()
        .map(|node| attach(node, &mut counter, &mut narratives))
        .collect();

    report.duration_ms = start.elapsed().as_millis() as u64;
    if let Some(cb) = progress {
        cb.on_stage_complete(Stage::Narrate, report.duration_ms);
    }
    (
        DocumentResult {
            metadata: document.metadata,
            structure,
        },
        report,
    )
}

fn collect_jobs(
    document: &DocumentResult,
    config: &NarrationConfig,
    report: &mut NarrationReport,
) -> Vec<Job> {
    let mut jobs = Vec::new();
    for (index, node) in document.nodes().enumerate() {
        if node.node_type.is_table() {
            if !config.narrate_tables {
                continue;
            }
            let Some(data) = node.data.as_ref().filter(|d| d.row_count() > 0) else {
                continue;
            };
            jobs.push(Job {
                index,
                node_id: node.id.clone(),
                input: JobInput::Table {
                    markdown: data.to_markdown(),
                    kind: TableKind::detect(&data.simple_matrix),
                },
            });
        } else if node.node_type.is_visual() {
            if !config.narrate_visuals {
                continue;
            }
            match (&node.file_path, node.bbox) {
                (Some(path), Some(bbox)) if bbox.area() >= config.min_visual_area => {
                    jobs.push(Job {
                        index,
                        node_id: node.id.clone(),
                        input: JobInput::Visual {
                            path: path.clone(),
                            kind: VisualKind::from_label(node.node_type.as_str()),
                        },
                    });
                }
                _ => report.skipped_visuals += 1,
            }
        }
    }
    jobs
}

async fn run_job(
    job: &Job,
    narrator: &dyn Narrator,
    config: &NarrationConfig,
) -> Result<NarratorReply, NarrationError> {
    let content = match &job.input {
        JobInput::Table { markdown, kind } => NarrationContent::Table {
            markdown: markdown.clone(),
            kind: *kind,
        },
        JobInput::Visual { path, kind } => {
            let unreadable = |detail: String| NarrationError::CropUnreadable {
                node_id: job.node_id.clone(),
                path: path.clone(),
                detail,
            };
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| unreadable(e.to_string()))?;
            let image = encode::encode_crop(&bytes).map_err(|e| unreadable(e.to_string()))?;
            NarrationContent::Visual { image, kind: *kind }
        }
    };
    describe_with_retry(narrator, &content, &job.node_id, config).await
}

async fn describe_with_retry(
    narrator: &dyn Narrator,
    content: &NarrationContent,
    node_id: &str,
    config: &NarrationConfig,
) -> Result<NarratorReply, NarrationError> {
    let limit = Duration::from_secs(config.api_timeout_secs);
    let mut last_err = String::new();
    let mut timed_out = false;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config
                .retry_backoff_ms
                .saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "Node {}: retry {}/{} after {}ms",
                node_id, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(limit, narrator.describe(content)).await {
            Ok(Ok(reply)) => {
                let text = postprocess::clean_narrative(&reply.text);
                if text.is_empty() {
                    timed_out = false;
                    last_err = "empty narrative".to_string();
                    continue;
                }
                debug!("Node {}: {} narrated", node_id, content.type_hint());
                return Ok(NarratorReply { text, ..reply });
            }
            Ok(Err(e)) => {
                timed_out = false;
                last_err = e.to_string();
                warn!("Node {}: attempt {} failed: {}", node_id, attempt + 1, last_err);
            }
            Err(_) => {
                timed_out = true;
                warn!(
                    "Node {}: attempt {} timed out after {}s",
                    node_id,
                    attempt + 1,
                    config.api_timeout_secs
                );
            }
        }
    }

    if timed_out {
        Err(NarrationError::Timeout {
            node_id: node_id.to_string(),
            secs: config.api_timeout_secs,
        })
    } else {
        Err(NarrationError::LlmFailed {
            node_id: node_id.to_string(),
            retries: config.max_retries,
            detail: last_err,
        })
    }
}

/// Rebuild `node` with narratives keyed by pre-order position.
fn attach(
    node: OutputNode,
    counter: &mut usize,
    narratives: &mut HashMap<usize, String>,
) -> OutputNode {
    let narrative = narratives.remove(&*counter);
    *counter += 1;
    let children = node
        .children
        .into_iter()
        .map(|child| attach(child, counter, narratives))
        .collect();
    OutputNode {
        children,
        narrative: narrative.or(node.narrative),
        ..node
    }
}
