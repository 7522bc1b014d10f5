use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::{ItemState, Step};
use crate::arc::{ApiError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Succeeded,
    AlreadySatisfied,
    Failed,
}

/// One step execution for one story. Written once, never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub story_id: String,
    pub step: Step,
    pub status: StepStatus,
    pub error_kind: Option<ErrorKind>,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl OutcomeRecord {
    pub fn succeeded(story_id: &str, step: Step) -> Self {
        Self::new(story_id, step, StepStatus::Succeeded, None, None)
    }

    pub fn already_satisfied(story_id: &str, step: Step, detail: &str) -> Self {
        Self::new(
            story_id,
            step,
            StepStatus::AlreadySatisfied,
            None,
            Some(detail.to_string()),
        )
    }

    pub fn failed(story_id: &str, step: Step, err: &ApiError) -> Self {
        Self::new(
            story_id,
            step,
            StepStatus::Failed,
            Some(err.kind()),
            Some(err.to_string()),
        )
    }

    fn new(
        story_id: &str,
        step: Step,
        status: StepStatus,
        error_kind: Option<ErrorKind>,
        detail: Option<String>,
    ) -> Self {
        Self {
            story_id: story_id.to_string(),
            step,
            status,
            error_kind,
            detail,
            timestamp: Utc::now(),
        }
    }
}

/// Append-only record log shared by every worker of a run.
#[derive(Debug, Default)]
pub struct OutcomeLog {
    records: Mutex<Vec<OutcomeRecord>>,
}

impl OutcomeLog {
    pub fn append(&self, record: OutcomeRecord) {
        // A poisoned lock only means another worker panicked mid-push; the vec is still valid.
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn into_records(self) -> Vec<OutcomeRecord> {
        self.records.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

/// Final position of one story after the engine is done with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub story_id: String,
    pub final_state: ItemState,
}

impl ItemReport {
    pub fn failure(&self) -> Option<(Step, ErrorKind)> {
        match self.final_state {
            ItemState::Failed { step, reason } => Some((step, reason)),
            _ => None,
        }
    }

    /// Authentication failures stop the whole run.
    pub fn halts_run(&self) -> bool {
        matches!(self.failure(), Some((_, ErrorKind::Authentication)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounts {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Everything a run produced, returned to the caller for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub delete_enabled: bool,
    pub limit: usize,
    pub items: Vec<ItemReport>,
    pub records: Vec<OutcomeRecord>,
    pub halted: Option<String>,
}

impl RunSummary {
    /// Per-step counts derived from the record log.
    pub fn step_counts(&self) -> BTreeMap<Step, StepCounts> {
        let mut counts: BTreeMap<Step, StepCounts> = BTreeMap::new();
        for record in &self.records {
            let entry = counts.entry(record.step).or_default();
            entry.attempted += 1;
            match record.status {
                StepStatus::Succeeded => entry.succeeded += 1,
                StepStatus::AlreadySatisfied => entry.skipped += 1,
                StepStatus::Failed => entry.failed += 1,
            }
        }
        counts
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|i| i.final_state.is_failed())
    }

    pub fn records_for<'a>(&'a self, story_id: &'a str) -> impl Iterator<Item = &'a OutcomeRecord> {
        self.records.iter().filter(move |r| r.story_id == story_id)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
