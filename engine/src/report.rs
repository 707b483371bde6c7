//! Outcomes of a sync pass.
//!
//! Every record a pass touches gets one [`Outcome`]. Outcomes roll up into a
//! [`TableReport`] per table and a [`PassReport`] per pass, which is both
//! printed as a one-line summary and serializable for machine consumers.

use crate::{reconcile::ConflictPolicy, snapshot::Side, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of syncing one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
    Skipped(String),
    Failed(String),
}

impl Outcome {
    /// True for outcomes that changed a store.
    pub fn is_write(&self) -> bool {
        matches!(self, Outcome::Created | Outcome::Updated)
    }
}

/// Outcome of one record, with the side that was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcome {
    pub id: RecordId,
    /// Side the write was aimed at; `None` when nothing was attempted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Side>,
    pub outcome: Outcome,
}

impl RecordOutcome {
    pub fn new(id: impl Into<RecordId>, target: Option<Side>, outcome: Outcome) -> Self {
        Self {
            id: id.into(),
            target,
            outcome,
        }
    }
}

/// Table-level result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TableStatus {
    /// Both snapshots were captured and the plan executed
    Synced,
    /// Remote table is empty and absent locally; creation waits for data
    Deferred,
    /// The table could not be processed this pass
    Failed(String),
}

/// Report for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReport {
    pub table: String,
    pub status: TableStatus,
    /// Whether the pass created the table in the local store
    pub created_locally: bool,
    pub records: Vec<RecordOutcome>,
}

impl TableReport {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            status: TableStatus::Synced,
            created_locally: false,
            records: Vec::new(),
        }
    }

    /// A table that failed before any record was processed.
    pub fn failed(table: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut report = Self::new(table);
        report.status = TableStatus::Failed(reason.into());
        report
    }

    pub fn deferred(table: impl Into<String>) -> Self {
        let mut report = Self::new(table);
        report.status = TableStatus::Deferred;
        report
    }

    pub fn push(&mut self, outcome: RecordOutcome) {
        self.records.push(outcome);
    }

    /// Count records matching a predicate.
    pub fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// Ids of records that failed.
    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed(_)))
    }
}

/// How the pass was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunMode {
    SingleShot,
    Continuous,
}

/// Report for a whole pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    /// Unique id of the pass, for correlating logs
    pub pass_id: String,
    pub mode: RunMode,
    pub policy: ConflictPolicy,
    /// Milliseconds since epoch
    pub started_at: Timestamp,
    /// Milliseconds since epoch
    pub finished_at: Timestamp,
    /// Set when the remote table list could not be fetched; no table was
    /// visited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
    pub tables: Vec<TableReport>,
}

impl PassReport {
    pub fn new(
        pass_id: impl Into<String>,
        mode: RunMode,
        policy: ConflictPolicy,
        started_at: Timestamp,
    ) -> Self {
        Self {
            pass_id: pass_id.into(),
            mode,
            policy,
            started_at,
            finished_at: started_at,
            remote_error: None,
            tables: Vec::new(),
        }
    }

    /// True when the pass could not reach the remote table list.
    pub fn remote_failed(&self) -> bool {
        self.remote_error.is_some()
    }

    /// Look up the report of one table.
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Aggregate counters across all tables.
    pub fn summary(&self) -> PassSummary {
        let mut summary = PassSummary::default();
        for table in &self.tables {
            summary.tables += 1;
            match table.status {
                TableStatus::Synced => {}
                TableStatus::Deferred => summary.tables_deferred += 1,
                TableStatus::Failed(_) => summary.tables_failed += 1,
            }
            if table.created_locally {
                summary.tables_created += 1;
            }
            for record in &table.records {
                match record.outcome {
                    Outcome::Created => summary.created += 1,
                    Outcome::Updated => summary.updated += 1,
                    Outcome::Unchanged => summary.unchanged += 1,
                    Outcome::Skipped(_) => summary.skipped += 1,
                    Outcome::Failed(_) => summary.failed += 1,
                }
            }
        }
        summary
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.summary();
        write!(
            f,
            "pass {} ({}, {} ms): {} tables ({} created, {} deferred, {} failed), \
             records: {} created, {} updated, {} unchanged, {} skipped, {} failed",
            self.pass_id,
            self.policy,
            self.finished_at.saturating_sub(self.started_at),
            s.tables,
            s.tables_created,
            s.tables_deferred,
            s.tables_failed,
            s.created,
            s.updated,
            s.unchanged,
            s.skipped,
            s.failed
        )?;
        if let Some(error) = &self.remote_error {
            write!(f, "; remote tables not listed: {}", error)?;
        }
        Ok(())
    }
}

/// Aggregate counters of a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSummary {
    pub tables: usize,
    pub tables_created: usize,
    pub tables_deferred: usize,
    pub tables_failed: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PassSummary {
    /// Records written to either store.
    pub fn writes(&self) -> usize {
        self.created + self.updated
    }
}
