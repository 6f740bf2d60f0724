use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::filter::FileFilter;
use crate::kb::KnowledgeBaseLoader;
use crate::source::{DocumentRef, SourceConnector, SourceKind};
use crate::staging::StagingArea;

/// Per-file result of one ingestion attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Loaded,
    Skipped { reason: String },
    Failed { error: String },
}

/// One attempted DocumentRef and how it ended.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionOutcome {
    pub doc: DocumentRef,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

/// Summary of one ingestion batch.
///
/// Outcomes appear in listing order, exactly one per ref that entered
/// filtering. Created empty at batch start, appended to as files are
/// processed, and immutable once returned to the caller.
#[derive(Debug, Serialize)]
pub struct IngestionReport {
    pub batch_id: Uuid,
    pub source_kind: SourceKind,
    pub started_at: DateTime<Utc>,
    outcomes: Vec<IngestionOutcome>,
}

impl IngestionReport {
    fn new(source_kind: SourceKind) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            source_kind,
            started_at: Utc::now(),
            outcomes: Vec::new(),
        }
    }

    fn push(&mut self, doc: DocumentRef, status: OutcomeStatus) {
        self.outcomes.push(IngestionOutcome { doc, status });
    }

    /// Ordered outcome sequence, one per attempted ref.
    pub fn outcomes(&self) -> &[IngestionOutcome] {
        &self.outcomes
    }

    pub fn loaded(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Loaded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Orchestrates Filter → Fetch → Stage → Load for one batch from one
/// connector.
///
/// Failure semantics:
/// - A listing-phase failure (`Auth`/`Listing`) aborts the batch with no
///   partial report — nothing was fetched yet.
/// - A per-item fetch or load failure is recorded as that item's `Failed`
///   outcome and never interrupts sibling items.
/// - A ref with an unsupported media type is recorded as `Skipped` and is
///   never fetched.
///
/// Batches are sequential: one runs to completion before the caller's next
/// action. Concurrent batches against the same knowledge base are the
/// caller's responsibility to prevent.
pub struct IngestionPipeline<'a> {
    staging: &'a StagingArea,
    loader: &'a dyn KnowledgeBaseLoader,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(staging: &'a StagingArea, loader: &'a dyn KnowledgeBaseLoader) -> Self {
        Self { staging, loader }
    }

    pub async fn run(&self, connector: &dyn SourceConnector) -> Result<IngestionReport> {
        let kind = connector.kind();

        let refs = connector.list().await?;
        log::info!("Ingesting {} listed file(s) from {}", refs.len(), kind);

        let mut report = IngestionReport::new(kind);

        for doc in refs {
            let Some(doc_type) = FileFilter::by_media_type(&doc.media_type) else {
                log::warn!(
                    "Skipping {} (unsupported format: {})",
                    doc.display_name,
                    doc.media_type
                );
                report.push(
                    doc,
                    OutcomeStatus::Skipped {
                        reason: "unsupported format".to_string(),
                    },
                );
                continue;
            };

            let blob = match connector.fetch(&doc, self.staging).await {
                Ok(blob) => blob,
                Err(e) => {
                    log::error!("✗ {}: {}", doc.display_name, e);
                    report.push(doc, OutcomeStatus::Failed { error: e.to_string() });
                    continue;
                }
            };

            match self.loader.load(&blob.local_path, doc_type).await {
                Ok(()) => {
                    log::info!("✓ {} ({} bytes)", doc.display_name, blob.size);
                    report.push(doc, OutcomeStatus::Loaded);
                }
                Err(e) => {
                    log::error!("✗ {}: {}", doc.display_name, e);
                    report.push(doc, OutcomeStatus::Failed { error: e.to_string() });
                }
            }
        }

        log::info!(
            "Batch {} complete: {} loaded, {} skipped, {} failed",
            report.batch_id,
            report.loaded(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }
}
