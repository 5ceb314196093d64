//! Result types returned by the batch runners.
//!
//! One [`DocumentOutcome`] per document: either a [`DocumentSummary`] of what
//! each stage did, or the message of the error that stopped the document.
//! Failures never cross document boundaries, so a report can mix both.

use crate::error::{ElementFault, PageFault};
use crate::pipeline::enrich::EnrichmentReport;
use crate::progress::Stage;
use std::path::PathBuf;

/// What happened to one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentSummary {
    /// Elements in the partition file.
    pub elements: usize,
    /// Chunks in the chunk file.
    pub chunks: usize,
    pub enrichment: EnrichmentReport,
    /// Pages drawn during this run.
    pub pages_annotated: usize,
    /// Pages whose overlay already existed.
    pub pages_skipped: usize,
    pub page_faults: Vec<PageFault>,
    /// Item-level faults met while parsing, rendering or annotating.
    pub faults: Vec<ElementFault>,
    /// Stages whose output already existed and was kept.
    pub skipped_stages: Vec<Stage>,
    /// Markdown files written during this run.
    pub written: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub name: String,
    pub result: Result<DocumentSummary, String>,
}

/// Outcome of one task over a directory.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub documents: Vec<DocumentOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.documents.iter().filter(|d| d.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.documents.len() - self.succeeded()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Failed documents with their error messages.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.documents.iter().filter_map(|d| match &d.result {
            Err(e) => Some((d.name.as_str(), e.as_str())),
            Ok(_) => None,
        })
    }

    pub fn total_faults(&self) -> usize {
        self.documents
            .iter()
            .filter_map(|d| d.result.as_ref().ok())
            .map(|s| s.faults.len() + s.page_faults.len())
            .sum()
    }
}
