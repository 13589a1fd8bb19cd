use std::collections::BTreeMap;

use futures::{Stream, StreamExt};
use m3u::{Attribute, StreamEntry};
use tracing::{debug, info};

use crate::governor::ValidatedEntry;
use crate::verdict::{RejectReason, ValidationVerdict};

/// Counts folded from every verdict of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub accepted: usize,
    pub rejected: BTreeMap<RejectReason, usize>,
}

impl RunSummary {
    pub fn record(&mut self, verdict: &ValidationVerdict) {
        self.total += 1;
        match verdict.reason() {
            None => self.accepted += 1,
            Some(reason) => *self.rejected.entry(reason).or_default() += 1,
        }
    }

    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn log_summary(&self) {
        info!(
            total = self.total,
            accepted = self.accepted,
            rejected = self.rejected_total(),
            "Validation summary"
        );
        for (reason, count) in &self.rejected {
            info!(reason = %reason, count, "Rejected entries");
        }
    }
}

/// Accepted entries in output order plus the run summary.
#[derive(Debug, Clone)]
pub struct AggregatedRun {
    pub entries: Vec<StreamEntry>,
    pub summary: RunSummary,
}

struct AcceptedEntry {
    sort_title: String,
    index: usize,
    entry: StreamEntry,
}

/// Folds results arriving in any order into a deterministic output.
pub struct ResultAggregator {
    annotation: Attribute,
    accepted: Vec<AcceptedEntry>,
    summary: RunSummary,
}

impl ResultAggregator {
    pub fn new(annotation: Attribute) -> Self {
        Self {
            annotation,
            accepted: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    pub fn push(&mut self, result: ValidatedEntry) {
        self.summary.record(&result.verdict);
        match &result.verdict {
            ValidationVerdict::Accepted(measurement) => {
                info!(
                    index = result.index,
                    title = result.entry.title(),
                    rate_kbps = %format!("{:.1}", measurement.rate_kbps),
                    ttfb_ms = measurement.ttfb.as_millis() as u64,
                    "Accepted"
                );
                self.accepted.push(AcceptedEntry {
                    sort_title: result.entry.title().to_lowercase(),
                    index: result.index,
                    entry: result.entry.annotated(&self.annotation),
                });
            }
            ValidationVerdict::Rejected(rejection) => {
                debug!(
                    index = result.index,
                    url = %rejection.url,
                    reason = %rejection.reason,
                    detail = %rejection.detail,
                    "Rejected"
                );
            }
        }
    }

    pub async fn consume<S>(mut self, mut results: S) -> AggregatedRun
    where
        S: Stream<Item = ValidatedEntry> + Unpin,
    {
        while let Some(result) = results.next().await {
            self.push(result);
        }
        self.finish()
    }

    /// Sorts by case-insensitive title, then input position.
    pub fn finish(mut self) -> AggregatedRun {
        self.accepted
            .sort_by(|a, b| a.sort_title.cmp(&b.sort_title).then(a.index.cmp(&b.index)));
        AggregatedRun {
            entries: self.accepted.into_iter().map(|a| a.entry).collect(),
            summary: self.summary,
        }
    }
}
