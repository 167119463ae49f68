//! CLI binary for layout2json.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ParseConfig` / `NarrationConfig` / `AnalyzerConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use layout2json::config::{
    ENV_ACCESS_TOKEN, ENV_CREDENTIALS, ENV_ENDPOINT, ENV_LOCATION, ENV_PROCESSOR_ID,
    ENV_PROJECT_ID,
};
use layout2json::{
    narrate_document, parse, write_document, AnalyzerConfig, DocumentAiClient, LayoutAnalyzer,
    LlmNarrator, NarrationConfig, ParseConfig, ParseProgressCallback, ProgressCallback,
    SavedAnalysis, Stage,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress: a spinner naming the current stage, with one log line
/// per finished stage and per failed narrative.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ParseProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(capitalise(&stage.to_string()));
        self.bar.set_message("…");
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<16} {}",
            green("✓"),
            capitalise(&stage.to_string()),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_degraded(&self, stage: Stage, reason: &str) {
        self.bar.println(format!(
            "  {} {:<16} {}",
            cyan("⚠"),
            capitalise(&stage.to_string()),
            dim(&truncate(reason, 80)),
        ));
    }

    fn on_node_narrated(&self, node_id: &str, done: usize, total: usize) {
        self.bar.set_message(format!("{done}/{total}  node {node_id}"));
    }

    fn on_node_error(&self, node_id: &str, error: &str) {
        self.bar.println(format!(
            "  {} node {:<10} {}",
            red("✗"),
            node_id,
            red(&truncate(error, 80)),
        ));
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Truncate very long messages to keep output tidy.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyze with Document AI and write output/report.json + output/images/
  layout2json report.pdf

  # Reuse a saved analysis (no Document AI call)
  layout2json report.pdf --analysis report.layout.json -o out

  # Add narratives to tables and diagrams
  layout2json report.pdf --narrate --model gpt-4o

  # Print the JSON tree to stdout
  layout2json report.pdf --stdout > tree.json

  # Check that the processor and credentials work
  layout2json --verify

ENVIRONMENT VARIABLES:
  DOCAI_PROJECT_ID                Google Cloud project
  DOCAI_LOCATION                  Processor location (default: us)
  DOCAI_PROCESSOR_ID              Layout-parser processor id
  GOOGLE_APPLICATION_CREDENTIALS  Service-account key file
  DOCAI_ACCESS_TOKEN              Bearer token (skips gcloud)
  DOCAI_ENDPOINT                  API base URL override
  OPENAI_API_KEY                  OpenAI API key (for --narrate)
  EDGEQUAKE_LLM_PROVIDER          Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL                 Override model ID
  PDFIUM_LIB_PATH                 Path to libpdfium (or its directory)
"#;

/// Convert a PDF's layout analysis into a hierarchical JSON tree.
#[derive(Parser, Debug)]
#[command(
    name = "layout2json",
    version,
    about = "Convert Document AI layout analysis of a PDF into hierarchical JSON",
    long_about = "Run a PDF through a Document AI layout processor (or load a saved analysis) \
and write a JSON tree of headings, paragraphs, lists, tables and figures. Figures are cropped \
from the rendered pages; tables and figures can optionally be described in prose by an LLM.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "verify")]
    input: Option<String>,

    /// Directory for <name>.json and images/.
    #[arg(short, long, env = "LAYOUT2JSON_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Saved analysis JSON to use instead of calling Document AI.
    #[arg(long, env = "LAYOUT2JSON_ANALYSIS")]
    analysis: Option<PathBuf>,

    /// Describe tables and diagrams with an LLM.
    #[arg(long, env = "LAYOUT2JSON_NARRATE")]
    narrate: bool,

    /// Rendering DPI for image crops (72–400).
    #[arg(long, env = "LAYOUT2JSON_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Maximum nesting depth of the block tree.
    #[arg(long, env = "LAYOUT2JSON_MAX_DEPTH", default_value_t = 256)]
    max_depth: usize,

    /// Do not render pages or crop images.
    #[arg(long, env = "LAYOUT2JSON_NO_IMAGES")]
    no_images: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "LAYOUT2JSON_PASSWORD")]
    password: Option<String>,

    /// Google Cloud project of the processor.
    #[arg(long, env = ENV_PROJECT_ID)]
    project_id: Option<String>,

    /// Processor location (us, eu, ...).
    #[arg(long, env = ENV_LOCATION)]
    location: Option<String>,

    /// Layout-parser processor id.
    #[arg(long, env = ENV_PROCESSOR_ID)]
    processor_id: Option<String>,

    /// Service-account key file.
    #[arg(long, env = ENV_CREDENTIALS)]
    credentials: Option<PathBuf>,

    /// Bearer token for Document AI.
    #[arg(long, env = ENV_ACCESS_TOKEN, hide_env_values = true)]
    access_token: Option<String>,

    /// Document AI base URL override.
    #[arg(long, env = ENV_ENDPOINT)]
    endpoint: Option<String>,

    /// LLM model ID for narratives (default: gpt-4o).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Number of concurrent LLM calls.
    #[arg(short, long, env = "LAYOUT2JSON_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "LAYOUT2JSON_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "LAYOUT2JSON_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the JSON tree to stdout instead of writing <name>.json.
    #[arg(long)]
    stdout: bool,

    /// Check the Document AI processor and credentials, then exit.
    #[arg(long)]
    verify: bool,

    /// Disable progress spinner.
    #[arg(long, env = "LAYOUT2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LAYOUT2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "LAYOUT2JSON_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; it
    // provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.verify;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Verify mode ──────────────────────────────────────────────────────
    if cli.verify {
        let client = DocumentAiClient::new(analyzer_config(&cli)?)
            .context("Failed to create Document AI client")?;
        let info = client
            .verify_setup()
            .await
            .context("Processor verification failed")?;
        println!("Processor:    {}", info.name);
        println!("Display name: {}", info.display_name);
        println!("Type:         {}", info.processor_type);
        println!("State:        {}", info.state);
        return Ok(());
    }

    let input = cli
        .input
        .clone()
        .context("An input PDF path or URL is required")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = progress
        .clone()
        .map(|cb| cb as Arc<dyn ParseProgressCallback>);

    let mut builder = ParseConfig::builder()
        .output_dir(&cli.output_dir)
        .dpi(cli.dpi)
        .max_depth(cli.max_depth)
        .crop_images(!cli.no_images)
        .download_timeout_secs(cli.download_timeout);
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(ref cb) = progress_cb {
        builder = builder.progress_callback(Arc::clone(cb));
    }
    let config = builder.build().context("Invalid configuration")?;

    let analyzer: Box<dyn LayoutAnalyzer> = match cli.analysis {
        Some(ref path) => Box::new(SavedAnalysis::new(path)),
        None => Box::new(
            DocumentAiClient::new(analyzer_config(&cli)?)
                .context("Failed to create Document AI client")?,
        ),
    };

    // ── Run parse ────────────────────────────────────────────────────────
    let output = parse(&input, analyzer.as_ref(), &config)
        .await
        .context("Parse failed")?;
    let json_path = output.json_path(&config.output_dir);
    let stats = output.stats.clone();
    let mut document = output.document;

    // ── Optional narratives ──────────────────────────────────────────────
    let mut narration = None;
    if cli.narrate {
        let narration_config = narration_config(&cli)?;
        let narrator =
            LlmNarrator::from_config(&narration_config).context("LLM provider not available")?;
        let (narrated, report) =
            narrate_document(document, &narrator, &narration_config, progress_cb.as_ref()).await;
        document = narrated;
        narration = Some(report);
    }

    // ── Write ────────────────────────────────────────────────────────────
    if cli.stdout {
        let json = serde_json::to_string_pretty(&document).context("Failed to serialise output")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
    } else {
        write_document(&document, &json_path)
            .await
            .context("Failed to write output")?;
    }

    if let Some(ref cb) = progress {
        cb.finish();
    }

    // ── Summary ──────────────────────────────────────────────────────────
    if !cli.quiet {
        eprintln!(
            "{}  {} nodes  {} tables  {} images  {}ms{}",
            if stats.render_degraded { cyan("⚠") } else { green("✔") },
            stats.node_count,
            stats.table_count,
            stats.image_count,
            stats.total_duration_ms,
            if cli.stdout {
                String::new()
            } else {
                format!("  →  {}", bold(&json_path.display().to_string()))
            },
        );
        if stats.crops_saved + stats.crops_skipped > 0 {
            eprintln!(
                "   {} crops saved  /  {} skipped",
                dim(&stats.crops_saved.to_string()),
                dim(&stats.crops_skipped.to_string()),
            );
        }
        if let Some(report) = narration {
            eprintln!(
                "   {} narratives  /  {} failed  —  {} tokens in  /  {} tokens out",
                dim(&report.narrated.to_string()),
                if report.failures.is_empty() {
                    dim("0")
                } else {
                    red(&report.failures.len().to_string())
                },
                dim(&report.prompt_tokens.to_string()),
                dim(&report.completion_tokens.to_string()),
            );
        }
    }

    Ok(())
}

/// Map CLI args (which already fall back to the `DOCAI_*` env vars) to
/// `AnalyzerConfig`.
fn analyzer_config(cli: &Cli) -> Result<AnalyzerConfig> {
    let lookup = |key: &str| -> Option<String> {
        match key {
            ENV_PROJECT_ID => cli.project_id.clone(),
            ENV_LOCATION => cli.location.clone(),
            ENV_PROCESSOR_ID => cli.processor_id.clone(),
            ENV_CREDENTIALS => cli
                .credentials
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            ENV_ACCESS_TOKEN => cli.access_token.clone(),
            ENV_ENDPOINT => cli.endpoint.clone(),
            _ => None,
        }
    };
    AnalyzerConfig::from_lookup(lookup).context("Document AI is not configured")
}

/// Map CLI args to `NarrationConfig`.
fn narration_config(cli: &Cli) -> Result<NarrationConfig> {
    let mut builder = NarrationConfig::builder()
        .concurrency(cli.concurrency)
        .api_timeout_secs(cli.api_timeout);
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    builder.build().context("Invalid narration configuration")
}
