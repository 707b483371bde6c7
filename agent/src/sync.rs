//! Pass executor - drives table plans through the two stores.

use crate::config::Config;
use crate::error::Result;
use crate::store::{LocalTables, RemoteTables};
use std::collections::BTreeSet;
use tablesync_engine::{
    infer_schema, plan_table, ConflictPolicy, Outcome, PassReport, PlannedWrite, RecordOutcome,
    RunMode, Side, TableName, TableReport, TableSnapshot, Timestamp, WriteKind,
};
use tracing::Instrument;
use uuid::Uuid;

/// Settings that shape every pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Which side wins a mismatch
    pub policy: ConflictPolicy,
    /// Also visit tables that exist only locally
    pub push_local_tables: bool,
}

impl From<&Config> for SyncOptions {
    fn from(config: &Config) -> Self {
        Self {
            policy: config.policy,
            push_local_tables: config.push_local_tables,
        }
    }
}

/// Reconciles the local store with the remote one, table by table.
pub struct Reconciler<L, R> {
    local: L,
    remote: R,
    options: SyncOptions,
}

impl<L: LocalTables, R: RemoteTables> Reconciler<L, R> {
    pub fn new(local: L, remote: R, options: SyncOptions) -> Self {
        Self {
            local,
            remote,
            options,
        }
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// Run one full pass.
    ///
    /// The remote table list decides which tables are visited. Table and
    /// record failures end up in the report, and so does a remote table list
    /// that cannot be fetched. Only failing to list the local tables returns
    /// an error.
    pub async fn run_pass(&self, mode: RunMode) -> Result<PassReport> {
        let pass_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("pass", id = %pass_id, policy = %self.options.policy);
        self.pass(pass_id, mode).instrument(span).await
    }

    async fn pass(&self, pass_id: String, mode: RunMode) -> Result<PassReport> {
        let mut report = PassReport::new(pass_id, mode, self.options.policy, now_millis());
        tracing::info!("Starting sync pass");

        let local_tables = self.local.list_tables().await?;
        let remote_tables = match self.remote.list_tables().await {
            Ok(tables) => tables,
            Err(e) => {
                tracing::error!("Cannot list remote tables, skipping this pass: {}", e);
                report.remote_error = Some(e.to_string());
                report.finished_at = now_millis();
                return Ok(report);
            }
        };

        let mut seen = BTreeSet::new();
        let mut visits: Vec<(String, bool)> = remote_tables
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .map(|name| (name, true))
            .collect();

        if self.options.push_local_tables {
            visits.extend(
                local_tables
                    .iter()
                    .filter(|name| !seen.contains(*name))
                    .map(|name| (name.clone(), false)),
            );
        }

        for (name, on_remote) in visits {
            let exists_locally = local_tables.contains(&name);
            let table_report = match self.sync_table(&name, on_remote, exists_locally).await {
                Ok(table_report) => table_report,
                Err(e) => {
                    tracing::warn!("Skipping table {}: {}", name, e);
                    TableReport::failed(name, e.to_string())
                }
            };
            report.tables.push(table_report);
        }

        report.finished_at = now_millis();
        tracing::info!("{}", report);
        Ok(report)
    }

    async fn sync_table(&self, name: &str, on_remote: bool, exists_locally: bool) -> Result<TableReport> {
        let table = TableName::new(name)?;

        let remote = if on_remote {
            self.remote.get_table(&table).await?
        } else {
            TableSnapshot::new(table.clone(), Side::Remote)
        };

        let mut report = TableReport::new(name);

        if !exists_locally {
            let Some((sample_id, sample)) = remote.sample() else {
                tracing::debug!("Remote table {} is empty, deferring local creation", table);
                return Ok(TableReport::deferred(name));
            };
            tracing::debug!("Inferring schema of {} from record {}", table, sample_id);
            let schema = infer_schema(&table, sample)?;
            report.created_locally = self.local.ensure_table(&schema).await?;
        }

        let local = self.local.get_table(&table).await?;
        let plan = plan_table(&local, &remote, self.options.policy);

        for id in &plan.unchanged {
            report.push(RecordOutcome::new(id.clone(), None, Outcome::Unchanged));
        }

        for (id, reason) in &plan.skipped {
            tracing::warn!("Skipping record {} in table {}: {}", id, table, reason);
            report.push(RecordOutcome::new(id.clone(), None, Outcome::Skipped(reason.clone())));
        }

        for write in &plan.writes {
            let outcome = self.apply(&table, write).await;
            report.push(RecordOutcome::new(write.id.clone(), Some(write.target), outcome));
        }

        Ok(report)
    }

    /// Execute one planned write. Failures stay with the record.
    async fn apply(&self, table: &TableName, write: &PlannedWrite) -> Outcome {
        let result = match write.target {
            Side::Local => self.local.upsert_record(table, &write.id, &write.fields).await,
            Side::Remote => self
                .remote
                .upsert_record(table, &write.id, &write.fields)
                .await
                .map(|()| match write.kind {
                    WriteKind::Create => Outcome::Created,
                    WriteKind::Update => Outcome::Updated,
                }),
        };

        match result {
            Ok(outcome) => {
                match &outcome {
                    Outcome::Created => {
                        tracing::info!("Created record {} in table {} ({})", write.id, table, write.target)
                    }
                    Outcome::Updated => {
                        tracing::info!("Updated record {} in table {} ({})", write.id, table, write.target)
                    }
                    Outcome::Skipped(reason) => {
                        tracing::warn!("Skipped record {} in table {}: {}", write.id, table, reason)
                    }
                    _ => {}
                }
                outcome
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to write record {} in table {} ({}): {}",
                    write.id,
                    table,
                    write.target,
                    e
                );
                Outcome::Failed(e.to_string())
            }
        }
    }
}

fn now_millis() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}
