//! Image enrichment: give every Image element a generated description.
//!
//! The partition file is both input and checkpoint. After each successful
//! summary the whole file is rewritten atomically, so an interrupted run
//! loses at most the image in flight, and a re-run only submits images whose
//! `metadata.image_description` is still missing or blank.

use crate::error::IngestError;
use crate::model::{MimeType, RawElement};
use crate::pipeline::summarize::ImageSummarizer;
use crate::progress::BatchProgressCallback;
use crate::store;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Counts for one enriched file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    /// Images that needed a description at the start of the run.
    pub candidates: usize,
    pub summarised: usize,
    pub failed: usize,
    /// Images described by an earlier run.
    pub already_described: usize,
    /// Images the partitioner shipped without a payload.
    pub without_payload: usize,
}

fn has_payload(element: &RawElement) -> bool {
    element
        .metadata
        .image_base64
        .as_deref()
        .is_some_and(|b64| !b64.trim().is_empty())
}

/// Summarise the undescribed images of one partition file in place.
///
/// A failed summary is logged and counted; the image stays a candidate for
/// the next run. Only read and write failures abort the file.
pub async fn enrich_file(
    path: &Path,
    summarizer: &dyn ImageSummarizer,
    progress: &dyn BatchProgressCallback,
) -> Result<EnrichmentReport, IngestError> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut elements = store::read_raw(path)?;
    let mut report = EnrichmentReport::default();

    let mut candidates = Vec::new();
    for (idx, element) in elements.iter().enumerate() {
        if element.element_type != "Image" {
            continue;
        }
        if element.has_description() {
            report.already_described += 1;
        } else if !has_payload(element) {
            warn!("{}: image {} has no payload, skipping", name, element.element_id);
            progress.on_image_skipped(&name, &element.element_id);
            report.without_payload += 1;
        } else {
            candidates.push(idx);
        }
    }
    report.candidates = candidates.len();
    debug!(
        "{}: {} images to summarise, {} already described",
        name, report.candidates, report.already_described
    );

    for (n, idx) in candidates.into_iter().enumerate() {
        let element = &elements[idx];
        let image_base64 = element.metadata.image_base64.clone().unwrap_or_default();
        let mime = element
            .metadata
            .image_mime_type
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(MimeType::new)
            .unwrap_or_default();

        match summarizer.summarize(&image_base64, &mime).await {
            Ok(summary) => {
                let element = &mut elements[idx];
                element.metadata.image_description = Some(summary.clone());
                element.text = Some(summary);
                store::write_json_atomic(path, &elements)?;
                report.summarised += 1;
                progress.on_image_summarised(&name, n + 1, report.candidates);
            }
            Err(e) => {
                warn!("{}: summary for image {} failed: {}", name, elements[idx].element_id, e);
                report.failed += 1;
            }
        }
    }

    info!(
        "{}: {} images summarised, {} failed, {} without payload",
        name, report.summarised, report.failed, report.without_payload
    );
    Ok(report)
}
