use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{error, info};
use uuid::Uuid;

use crate::arc::ContentApi;
use crate::engine::TransitionEngine;
use crate::state_machine::{ContentItem, ItemReport, OutcomeLog, RunSummary};

/// Knobs for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum number of items to start; 0 means no cap.
    pub limit: usize,
    /// Stories processed at once. Values below 1 are treated as 1.
    pub concurrency: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            limit: 0,
            concurrency: 1,
        }
    }
}

/// Feeds items to the engine and collects the run summary.
pub struct RunCoordinator<'a, A> {
    engine: TransitionEngine<'a, A>,
    options: RunOptions,
}

impl<'a, A: ContentApi> RunCoordinator<'a, A> {
    pub fn new(engine: TransitionEngine<'a, A>, options: RunOptions) -> Self {
        Self { engine, options }
    }

    pub async fn run<I>(&self, items: I) -> RunSummary
    where
        I: IntoIterator<Item = ContentItem>,
    {
        self.run_with_observer(items, |_| {}).await
    }

    /// Run every item (up to the cap) and call `observer` as each one finishes.
    ///
    /// An authentication failure stops new items from starting; the rest of the
    /// input is left untouched and the summary carries the halt reason.
    pub async fn run_with_observer<I, F>(&self, items: I, observer: F) -> RunSummary
    where
        I: IntoIterator<Item = ContentItem>,
        F: Fn(&ItemReport),
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let cap = match self.options.limit {
            0 => usize::MAX,
            n => n,
        };
        info!(%run_id, limit = self.options.limit, delete = self.engine.delete_enabled(), "run started");

        let log = OutcomeLog::default();
        let halted = AtomicBool::new(false);
        let engine = &self.engine;
        let (log_ref, halted_ref, observer_ref) = (&log, &halted, &observer);

        let reports: Vec<ItemReport> = stream::iter(items.into_iter().take(cap))
            .map(move |item| async move {
                if halted_ref.load(Ordering::SeqCst) {
                    return None;
                }
                let report = engine.process(&item, log_ref).await;
                if report.halts_run() {
                    error!(story = %report.story_id, "authentication failed, halting run");
                    halted_ref.store(true, Ordering::SeqCst);
                }
                observer_ref(&report);
                Some(report)
            })
            .buffered(self.options.concurrency.max(1))
            .filter_map(|report| async move { report })
            .collect()
            .await;

        let halted = reports.iter().find(|r| r.halts_run()).map(|r| {
            format!(
                "authentication failure on story {}; remaining items were not started",
                r.story_id
            )
        });
        info!(%run_id, items = reports.len(), records = log.len(), "run finished");

        RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            delete_enabled: self.engine.delete_enabled(),
            limit: self.options.limit,
            items: reports,
            records: log.into_records(),
            halted,
        }
    }
}
