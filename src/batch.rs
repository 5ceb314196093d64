//! Batch entry points: run a whole task over a directory.
//!
//! Two tasks exist, matching the CLI menu:
//!
//! * [`ingest_pdfs`]: partition → enrich → chunk → export → markdown →
//!   annotate, for every PDF in `input_dir`;
//! * [`create_debugging_markdown`]: chunk files → collapsible debug markdown.
//!
//! Every stage checks for its own output file first, so re-running a task
//! resumes where the last run stopped. A failing document is recorded in the
//! [`BatchReport`] and the loop moves on; only configuration problems (input
//! directory missing, nothing to read) abort the task.

use crate::config::{OutputLayout, OverwritePolicy, PipelineConfig};
use crate::error::IngestError;
use crate::model::{load_chunks, load_elements, Element};
use crate::output::{BatchReport, DocumentOutcome, DocumentSummary};
use crate::pipeline::annotate::{annotate_document, AnnotateOptions, AnnotationOutcome, PageOutcome};
use crate::pipeline::chunk::Chunker;
use crate::pipeline::enrich::enrich_file;
use crate::pipeline::export::export_chunks;
use crate::pipeline::input::{document_name, list_json, list_pdfs, repair_double_json_extension, validate_pdf};
use crate::pipeline::partition::Partitioner;
use crate::pipeline::reconstruct::reconstruct;
use crate::pipeline::render::RasterizerFactory;
use crate::pipeline::summarize::ImageSummarizer;
use crate::progress::{BatchProgressCallback, Stage};
use crate::store;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

pub use crate::store::write_atomic;

/// The collaborators [`ingest_pdfs`] drives.
///
/// The rasteriser factory is shared with blocking worker threads, so it is
/// held by `Arc` rather than borrowed.
pub struct Collaborators<'a> {
    pub partitioner: &'a dyn Partitioner,
    pub summarizer: &'a dyn ImageSummarizer,
    pub chunker: &'a dyn Chunker,
    pub rasterizers: Arc<dyn RasterizerFactory>,
}

/// Ingest every PDF in `config.input_dir`.
///
/// # Errors
/// Only when the task cannot start: the input directory is missing or
/// unreadable. Everything after that is reported per document.
pub async fn ingest_pdfs(
    config: &PipelineConfig,
    collaborators: Collaborators<'_>,
    progress: &dyn BatchProgressCallback,
) -> Result<BatchReport, IngestError> {
    let start = Instant::now();
    config.check_input_dir()?;
    let pdfs = list_pdfs(&config.input_dir)?;
    progress.on_batch_start(pdfs.len());

    let mut report = BatchReport::default();
    if pdfs.is_empty() {
        info!("No PDF files in {}", config.input_dir.display());
        progress.on_batch_complete(0, 0);
        return Ok(report);
    }
    info!("Processing {} PDF files...", pdfs.len());

    let layout = config.layout();

    // ── Stage 1: Partition (concurrent) ──────────────────────────────────
    let partitioned: HashMap<PathBuf, Result<(), String>> = stream::iter(pdfs.iter().map(|pdf| {
        let layout = &layout;
        let partitioner = collaborators.partitioner;
        async move {
            let result = partition_one(pdf, partitioner, layout, progress)
                .await
                .map_err(|e| e.to_string());
            (pdf.clone(), result)
        }
    }))
    .buffer_unordered(config.partition_workers.max(1))
    .collect()
    .await;

    let annotate_options = AnnotateOptions::from_config(config);

    // ── Stages 2–6: per document, in name order ──────────────────────────
    for pdf in &pdfs {
        let name = document_name(pdf);
        let result = match partitioned.get(pdf) {
            Some(Ok(())) => process_document(
                pdf,
                &name,
                config,
                &layout,
                &collaborators,
                &annotate_options,
                progress,
            )
            .await
            .map_err(|e| e.to_string()),
            Some(Err(e)) => Err(e.clone()),
            None => Err("document was not partitioned".to_string()),
        };

        match &result {
            Ok(_) => progress.on_document_complete(&name),
            Err(e) => {
                error!("Error processing {}: {}", name, e);
                progress.on_document_error(&name, e);
            }
        }
        report.documents.push(DocumentOutcome { name, result });
    }

    info!(
        "Ingestion finished: {} succeeded, {} failed in {:?}",
        report.succeeded(),
        report.failed(),
        start.elapsed()
    );
    progress.on_batch_complete(report.succeeded(), report.failed());
    Ok(report)
}

async fn partition_one(
    pdf: &Path,
    partitioner: &dyn Partitioner,
    layout: &OutputLayout,
    progress: &dyn BatchProgressCallback,
) -> Result<(), IngestError> {
    let name = document_name(pdf);
    let output = layout.partitioned(&name);
    if output.exists() {
        debug!("{} already partitioned", name);
        progress.on_document_skipped(&name, Stage::Partition);
        return Ok(());
    }

    validate_pdf(pdf)?;
    progress.on_stage(&name, Stage::Partition);
    let elements = partitioner.partition(pdf).await?;
    store::write_json_atomic(&output, &elements)?;
    info!("{}: {} elements partitioned", name, elements.len());
    Ok(())
}

async fn process_document(
    pdf: &Path,
    name: &str,
    config: &PipelineConfig,
    layout: &OutputLayout,
    collaborators: &Collaborators<'_>,
    annotate_options: &AnnotateOptions,
    progress: &dyn BatchProgressCallback,
) -> Result<DocumentSummary, IngestError> {
    let mut summary = DocumentSummary::default();
    let partitioned = layout.partitioned(name);

    // ── Enrich ───────────────────────────────────────────────────────────
    progress.on_stage(name, Stage::Enrich);
    summary.enrichment = enrich_file(&partitioned, collaborators.summarizer, progress).await?;

    // ── Chunk ────────────────────────────────────────────────────────────
    let chunked = layout.chunked(name);
    if chunked.exists() {
        progress.on_document_skipped(name, Stage::Chunk);
        summary.skipped_stages.push(Stage::Chunk);
    } else {
        progress.on_stage(name, Stage::Chunk);
        let raw = store::read_raw(&partitioned)?;
        let chunks = collaborators.chunker.chunk(&raw);
        store::write_json_atomic(&chunked, &chunks)?;
    }

    // ── Export ───────────────────────────────────────────────────────────
    progress.on_stage(name, Stage::Export);
    let raw_chunks = store::read_raw(&chunked)?;
    summary.chunks = raw_chunks.len();
    let exported = export_chunks(&raw_chunks);
    store::write_json_atomic(&layout.exported(name), &exported.items)?;

    // ── Markdown ─────────────────────────────────────────────────────────
    let elements = load_elements(&partitioned)?;
    summary.elements = elements.items.len();
    summary.faults.extend(elements.faults.iter().cloned());

    let markdown_path = layout.markdown(name);
    if markdown_path.exists() && config.overwrite == OverwritePolicy::Skip {
        progress.on_document_skipped(name, Stage::Markdown);
        summary.skipped_stages.push(Stage::Markdown);
    } else {
        progress.on_stage(name, Stage::Markdown);
        let rebuilt = reconstruct(&elements.items);
        summary.faults.extend(rebuilt.faults);
        store::write_atomic(&markdown_path, rebuilt.markdown.as_bytes())?;
        summary.written.push(markdown_path);
    }

    // ── Annotate ─────────────────────────────────────────────────────────
    progress.on_stage(name, Stage::Annotate);
    let pages = annotate_blocking(
        Arc::clone(&collaborators.rasterizers),
        pdf,
        elements.items,
        name,
        layout,
        annotate_options,
    )
    .await?;
    for page in pages {
        match page.result {
            Ok(AnnotationOutcome::Skipped) => summary.pages_skipped += 1,
            Ok(AnnotationOutcome::Rendered { faults, .. }) => {
                summary.pages_annotated += 1;
                summary.faults.extend(faults);
            }
            Err(fault) => summary.page_faults.push(fault),
        }
    }

    Ok(summary)
}

/// Rasterise and draw every page on the blocking pool.
async fn annotate_blocking(
    rasterizers: Arc<dyn RasterizerFactory>,
    pdf: &Path,
    elements: Vec<Element>,
    name: &str,
    layout: &OutputLayout,
    options: &AnnotateOptions,
) -> Result<Vec<PageOutcome>, IngestError> {
    let pdf = pdf.to_path_buf();
    let name = name.to_string();
    let layout = layout.clone();
    let options = options.clone();

    tokio::task::spawn_blocking(move || {
        let rasterizer = rasterizers.open(&pdf)?;
        annotate_document(rasterizer.as_ref(), &elements, &name, &layout, &options)
    })
    .await
    .map_err(|e| IngestError::Internal(format!("Annotation task panicked: {}", e)))?
}

/// Render every chunk file in `02_chunked` as collapsible debug markdown in
/// `04_markdown`.
///
/// Purely local and synchronous: no collaborator is involved.
pub fn create_debugging_markdown(
    config: &PipelineConfig,
    progress: &dyn BatchProgressCallback,
) -> Result<BatchReport, IngestError> {
    let layout = config.layout();
    let chunked_dir = layout.chunked_dir();
    repair_double_json_extension(&chunked_dir)?;
    let files = list_json(&chunked_dir)?;
    progress.on_batch_start(files.len());

    let mut report = BatchReport::default();
    if files.is_empty() {
        info!("No chunked files to process in {}", chunked_dir.display());
        progress.on_batch_complete(0, 0);
        return Ok(report);
    }

    for file in &files {
        let name = document_name(file);
        let result = debug_markdown_one(file, &name, config, &layout, progress).map_err(|e| e.to_string());
        match &result {
            Ok(_) => {
                info!("Processed {}", file.display());
                progress.on_document_complete(&name);
            }
            Err(e) => {
                error!("Error processing {}: {}", file.display(), e);
                progress.on_document_error(&name, e);
            }
        }
        report.documents.push(DocumentOutcome { name, result });
    }

    progress.on_batch_complete(report.succeeded(), report.failed());
    Ok(report)
}

fn debug_markdown_one(
    file: &Path,
    name: &str,
    config: &PipelineConfig,
    layout: &OutputLayout,
    progress: &dyn BatchProgressCallback,
) -> Result<DocumentSummary, IngestError> {
    let mut summary = DocumentSummary::default();
    let output = layout.debug_markdown(name);
    if output.exists() && config.overwrite == OverwritePolicy::Skip {
        progress.on_document_skipped(name, Stage::DebugMarkdown);
        summary.skipped_stages.push(Stage::DebugMarkdown);
        return Ok(summary);
    }

    progress.on_stage(name, Stage::DebugMarkdown);
    let chunks = load_chunks(file)?;
    summary.chunks = chunks.items.len();
    summary.faults = chunks.faults;

    let rebuilt = reconstruct(&chunks.items);
    summary.faults.extend(rebuilt.faults);
    store::write_atomic(&output, rebuilt.markdown.as_bytes())?;
    summary.written.push(output);
    Ok(summary)
}

/// Whether any markdown output of either task already exists. The CLI uses
/// this to decide whether to ask before overwriting.
pub fn has_existing_markdown(config: &PipelineConfig) -> bool {
    let layout = config.layout();
    [layout.markdown_dir(), layout.debug_markdown_dir()]
        .iter()
        .any(|dir| {
            list_with_extension(dir, "md")
                .map(|n| n > 0)
                .unwrap_or(false)
        })
}

fn list_with_extension(dir: &Path, ext: &str) -> std::io::Result<usize> {
    Ok(std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|x| x == ext))
        .count())
}
