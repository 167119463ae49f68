//! End-to-end integration tests for layout2json.
//!
//! These tests use real PDF files in `./test_cases/`, call a live Document AI
//! layout processor and (for narratives) a live LLM. They are gated behind
//! the `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 DOCAI_PROJECT_ID=... DOCAI_PROCESSOR_ID=... \
//!     cargo test --test e2e -- --nocapture

use layout2json::{
    narrate_document, parse, parse_to_file, DocumentAiClient, DocumentResult, LlmNarrator,
    NarrationConfig, ParseConfig,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir(name: &str) -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_cases/output")
        .join(name);
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn client() -> DocumentAiClient {
    DocumentAiClient::from_env().expect("DOCAI_* environment must be configured for e2e tests")
}

/// Assert the tree passes basic sanity checks.
fn assert_tree_quality(doc: &DocumentResult, context: &str) {
    assert!(doc.metadata.page_count > 0, "[{context}] no pages");
    assert!(!doc.structure.is_empty(), "[{context}] empty structure");

    for node in doc.nodes() {
        if let Some(b) = node.bbox {
            assert!(
                (0.0..=1.0).contains(&b.min_x) && b.min_x <= b.max_x && b.min_y <= b.max_y,
                "[{context}] node {} has a malformed bbox {:?}",
                node.id,
                b
            );
        }
        if let Some(path) = &node.file_path {
            assert!(path.exists(), "[{context}] missing crop {}", path.display());
        }
        if node.node_type.is_table() {
            assert!(node.data.is_some(), "[{context}] table {} without data", node.id);
        }
    }

    println!(
        "[{context}] ✓  {} nodes, quality checks passed",
        doc.nodes().count()
    );
}

// ── Processor checks ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_verify_processor() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let info = client().verify_setup().await.expect("verify_setup");
    assert!(!info.name.is_empty());
    println!("Processor: {:?}", info);
}

// ── Parse tests ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_parse_arxiv_paper() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    let config = ParseConfig::builder()
        .output_dir(output_dir("attention"))
        .build()
        .unwrap();

    let (json_path, output) = parse_to_file(path.to_string_lossy(), &client(), &config)
        .await
        .expect("parse_to_file should succeed");

    assert!(json_path.exists());
    assert_tree_quality(&output.document, "attention");
    assert!(output.stats.table_count > 0, "the paper has tables");
    assert!(output.stats.crops_saved > 0, "the paper has figures");
    println!("Stats: {:?}", output.stats);
}

#[tokio::test]
async fn test_parse_without_images() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("irs_form_1040.pdf"));
    let config = ParseConfig::builder()
        .output_dir(output_dir("irs"))
        .crop_images(false)
        .build()
        .unwrap();

    let output = parse(path.to_string_lossy(), &client(), &config)
        .await
        .expect("parse should succeed");

    assert_tree_quality(&output.document, "irs");
    assert!(output.crops.is_empty());
    assert!(output.document.nodes().all(|n| n.file_path.is_none()));
}

#[tokio::test]
async fn test_parse_with_narratives() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    let config = ParseConfig::builder()
        .output_dir(output_dir("attention_narrated"))
        .build()
        .unwrap();
    let output = parse(path.to_string_lossy(), &client(), &config)
        .await
        .expect("parse should succeed");

    let narration = NarrationConfig::default();
    let narrator = LlmNarrator::from_config(&narration).expect("LLM provider must be configured");
    let (doc, report) = narrate_document(output.document, &narrator, &narration, None).await;

    assert!(report.narrated > 0, "expected at least one narrative");
    for node in doc.nodes() {
        if let Some(text) = &node.narrative {
            assert!(!text.trim().is_empty());
            assert!(!text.starts_with("```"));
        }
    }
    println!(
        "Narrated {} nodes, {} failed, {} tokens in",
        report.narrated,
        report.failures.len(),
        report.prompt_tokens
    );
}
