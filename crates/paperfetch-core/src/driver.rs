//! The download run: resolve every liked paper against the proceedings
//! catalog and fetch the match.
//!
//! Items are processed one at a time, in like order. Resolution diagnostics
//! and fetch failures are reported through [`DriverEvent`]s and the final
//! [`RunSummary`]; neither stops the run.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::catalog::CatalogEntry;
use crate::fetch::{self, FetchOutcome, FetchSettings, PdfSource};
use crate::likes::{PaperId, PaperIndex};
use crate::matching::{MatchOptions, Resolution, resolve_with};
use crate::{Config, CoreError};

/// The user's likes and the conference metadata they refer to.
#[derive(Debug, Clone, Default)]
pub struct LikedPapers {
    pub likes: Vec<PaperId>,
    pub papers: PaperIndex,
}

/// Why a liked item was not resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Confer has no metadata record for the id.
    MissingMetadata,
    /// The record has no usable title.
    NoTitle,
    /// The record has no abstract, so it is not a paper.
    EmptyAbstract,
    /// The resolver rejected the title.
    Unresolvable(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingMetadata => write!(f, "no metadata"),
            SkipReason::NoTitle => write!(f, "no title"),
            SkipReason::EmptyAbstract => write!(f, "no abstract"),
            SkipReason::Unresolvable(msg) => write!(f, "{}", msg),
        }
    }
}

/// Progress events emitted during a run.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    Skipped {
        index: usize,
        total: usize,
        id: PaperId,
        reason: SkipReason,
    },
    Resolved {
        index: usize,
        total: usize,
        id: PaperId,
        title: String,
        resolution: Box<Resolution>,
    },
    Fetched {
        index: usize,
        total: usize,
        id: PaperId,
        outcome: FetchOutcome,
    },
}

#[derive(Debug, Clone)]
pub enum ItemStatus {
    Skipped(SkipReason),
    /// `outcome` is `None` in dry-run mode.
    Resolved {
        resolution: Resolution,
        outcome: Option<FetchOutcome>,
    },
}

/// What happened to one liked item.
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub id: PaperId,
    pub title: Option<String>,
    pub status: ItemStatus,
}

/// Summary statistics for a complete run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub liked: usize,
    pub missing_metadata: usize,
    pub no_title: usize,
    pub empty_abstract: usize,
    pub unresolvable: usize,
    pub resolved: usize,
    pub low_confidence: usize,
    pub ambiguous: usize,
    pub written: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    /// Set when the run stopped early on cancellation.
    pub cancelled: bool,
    pub items: Vec<ItemReport>,
}

impl RunSummary {
    pub fn skipped(&self) -> usize {
        self.missing_metadata + self.no_title + self.empty_abstract + self.unresolvable
    }

    fn record(&mut self, report: ItemReport) {
        match &report.status {
            ItemStatus::Skipped(reason) => match reason {
                SkipReason::MissingMetadata => self.missing_metadata += 1,
                SkipReason::NoTitle => self.no_title += 1,
                SkipReason::EmptyAbstract => self.empty_abstract += 1,
                SkipReason::Unresolvable(_) => self.unresolvable += 1,
            },
            ItemStatus::Resolved {
                resolution,
                outcome,
            } => {
                self.resolved += 1;
                if resolution.is_low_confidence {
                    self.low_confidence += 1;
                }
                if resolution.is_ambiguous {
                    self.ambiguous += 1;
                }
                match outcome {
                    Some(FetchOutcome::Written { .. }) => self.written += 1,
                    Some(FetchOutcome::SkippedExisting { .. }) => self.skipped_existing += 1,
                    Some(FetchOutcome::Failed { .. }) => self.failed += 1,
                    None => {}
                }
            }
        }
        self.items.push(report);
    }
}

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub matching: MatchOptions,
    pub fetch: FetchSettings,
    pub dest_dir: PathBuf,
    /// Resolve and report without downloading anything.
    pub dry_run: bool,
}

impl RunOptions {
    pub fn new(config: &Config, dry_run: bool) -> Self {
        Self {
            matching: config.match_options,
            fetch: FetchSettings::from(config),
            dest_dir: config.download_dir.clone(),
            dry_run,
        }
    }
}

/// Resolve and fetch every liked paper.
///
/// Fails only when `catalog` is empty, before any item is processed. Every
/// per-item problem is recorded in the returned summary instead.
pub async fn download_liked_papers(
    liked: &LikedPapers,
    catalog: &[CatalogEntry],
    source: &dyn PdfSource,
    options: &RunOptions,
    progress: impl Fn(DriverEvent),
    cancel: &CancellationToken,
) -> Result<RunSummary, CoreError> {
    if catalog.is_empty() {
        return Err(CoreError::InvalidInput(
            "the proceedings catalog is empty".to_string(),
        ));
    }

    let total = liked.likes.len();
    let mut summary = RunSummary {
        liked: total,
        ..Default::default()
    };

    for (index, id) in liked.likes.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(processed = index, total, "run cancelled");
            summary.cancelled = true;
            break;
        }

        let skip = |reason: SkipReason, title: Option<String>| {
            tracing::debug!(id = %id, reason = %reason, "skipping liked item");
            progress(DriverEvent::Skipped {
                index,
                total,
                id: id.clone(),
                reason: reason.clone(),
            });
            ItemReport {
                id: id.clone(),
                title,
                status: ItemStatus::Skipped(reason),
            }
        };

        let Some(record) = liked.papers.get(id) else {
            summary.record(skip(SkipReason::MissingMetadata, None));
            continue;
        };
        let Some(title) = record.title() else {
            summary.record(skip(SkipReason::NoTitle, None));
            continue;
        };
        if !record.has_abstract() {
            summary.record(skip(SkipReason::EmptyAbstract, Some(title.to_string())));
            continue;
        }

        let resolution = match resolve_with(title, catalog, &options.matching) {
            Ok(resolution) => resolution,
            Err(e) => {
                let reason = SkipReason::Unresolvable(e.to_string());
                summary.record(skip(reason, Some(title.to_string())));
                continue;
            }
        };

        log_resolution(id, title, &resolution);
        progress(DriverEvent::Resolved {
            index,
            total,
            id: id.clone(),
            title: title.to_string(),
            resolution: Box::new(resolution.clone()),
        });

        let outcome = if options.dry_run {
            None
        } else {
            let best = &resolution.best_entry;
            let outcome = fetch::fetch(
                source,
                &options.fetch,
                best.external_id,
                &best.title,
                &options.dest_dir,
            )
            .await;
            progress(DriverEvent::Fetched {
                index,
                total,
                id: id.clone(),
                outcome: outcome.clone(),
            });
            Some(outcome)
        };

        summary.record(ItemReport {
            id: id.clone(),
            title: Some(title.to_string()),
            status: ItemStatus::Resolved {
                resolution,
                outcome,
            },
        });
    }

    tracing::info!(
        liked = summary.liked,
        resolved = summary.resolved,
        skipped = summary.skipped(),
        written = summary.written,
        existing = summary.skipped_existing,
        failed = summary.failed,
        "run complete"
    );
    Ok(summary)
}

fn log_resolution(id: &PaperId, title: &str, resolution: &Resolution) {
    let best = &resolution.best_entry;
    tracing::debug!(
        id = %id,
        title,
        matched = %best.title,
        external_id = best.external_id,
        score = resolution.best_score,
        runner_up = resolution.runner_up_score,
        "resolved liked paper"
    );
    if resolution.is_low_confidence {
        tracing::info!(id = %id, title, matched = %best.title, score = resolution.best_score, "low-confidence match");
    }
    if let (true, Some(runner_up)) = (resolution.is_ambiguous, &resolution.runner_up) {
        tracing::info!(
            id = %id,
            title,
            best = %best.title,
            runner_up = %runner_up.entry.title,
            gap = resolution.best_score - runner_up.score,
            "ambiguous match"
        );
    }
}
