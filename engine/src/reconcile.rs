//! Reconciliation planning for one table.
//!
//! This is the pure half of a sync pass. Given the remote and local
//! snapshots of a table and the process-wide [`ConflictPolicy`], it decides
//! which records must be written to which side. Executing the writes, and
//! isolating their failures, is the caller's job.
//!
//! # Algorithm
//!
//! 1. Walk the union of ids from both snapshots in id order
//! 2. An id on one side only is created on the other side
//! 3. An id on both sides with equivalent fields is unchanged
//! 4. An id on both sides with differing fields is overwritten on the
//!    losing side, as decided by the policy
//! 5. An id whose remote entry is malformed is only reported as skipped
//!
//! There are no per-record timestamps to compare, so the policy is a blunt
//! global choice of which store wins a mismatch.

use crate::{
    snapshot::{Side, TableSnapshot},
    value::{fields_equivalent, values_equivalent},
    Fields, RecordId, TableName,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::str::FromStr;

/// How mismatched records are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictPolicy {
    /// Missing records flow both ways; the remote value wins a mismatch (default)
    #[default]
    Bidirectional,
    /// Local values overwrite remote ones; remote only fills ids missing locally
    LocalPriority,
}

impl ConflictPolicy {
    /// The side whose value is kept when both hold the id with different values.
    pub fn winner(&self) -> Side {
        match self {
            ConflictPolicy::Bidirectional => Side::Remote,
            ConflictPolicy::LocalPriority => Side::Local,
        }
    }
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictPolicy::Bidirectional => f.write_str("bidirectional"),
            ConflictPolicy::LocalPriority => f.write_str("local-priority"),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "bidirectional" | "remote-wins" => Ok(ConflictPolicy::Bidirectional),
            "local-priority" | "local-wins" => Ok(ConflictPolicy::LocalPriority),
            other => Err(format!("unknown conflict policy: {}", other)),
        }
    }
}

/// Whether a write adds a record to its target or replaces one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteKind {
    Create,
    Update,
}

/// A record write decided by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedWrite {
    /// Record id
    pub id: RecordId,
    /// Store to write to
    pub target: Side,
    /// Create or update on the target
    pub kind: WriteKind,
    /// Fields to write, taken from the other side
    pub fields: Fields,
}

/// Everything a pass needs to do for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePlan {
    pub table: TableName,
    /// Writes in execution order: local side first, each side in id order
    pub writes: Vec<PlannedWrite>,
    /// Ids already equivalent on both sides
    pub unchanged: Vec<RecordId>,
    /// Ids that cannot be synced, with the reason
    pub skipped: Vec<(RecordId, String)>,
}

impl TablePlan {
    fn new(table: TableName) -> Self {
        Self {
            table,
            writes: Vec::new(),
            unchanged: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Writes aimed at one side.
    pub fn writes_to(&self, side: Side) -> impl Iterator<Item = &PlannedWrite> {
        self.writes.iter().filter(move |w| w.target == side)
    }

    /// True when nothing needs writing.
    pub fn is_noop(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Plan the writes that reconcile one table.
///
/// `local` is an empty snapshot when the table does not exist locally.
/// When the local snapshot knows its columns, remote fields outside them are
/// ignored for the equivalence test: the local store drops them on write, so
/// counting them would report a mismatch on every pass.
pub fn plan_table(local: &TableSnapshot, remote: &TableSnapshot, policy: ConflictPolicy) -> TablePlan {
    let mut plan = TablePlan::new(remote.table.clone());
    let mut to_local = Vec::new();
    let mut to_remote = Vec::new();

    let ids: BTreeSet<&RecordId> = local.records.keys().chain(remote.records.keys()).collect();

    for id in ids {
        if remote.malformed.contains(id) {
            continue;
        }
        match (local.get(id), remote.get(id)) {
            (None, Some(fields)) => to_local.push(write(id, Side::Local, WriteKind::Create, fields)),
            (Some(fields), None) => {
                to_remote.push(write(id, Side::Remote, WriteKind::Create, fields))
            }
            (Some(local_fields), Some(remote_fields)) => {
                let remote_view = project(remote_fields, local.columns.as_deref());
                if fields_equivalent(local_fields, &remote_view) {
                    plan.unchanged.push(id.clone());
                    continue;
                }
                let columns = local.columns.as_deref();
                match policy.winner() {
                    Side::Remote => {
                        let fields = overlay(remote_fields, local_fields, columns);
                        to_local.push(write(id, Side::Local, WriteKind::Update, &fields))
                    }
                    Side::Local => {
                        let fields = overlay(local_fields, remote_fields, columns);
                        to_remote.push(write(id, Side::Remote, WriteKind::Update, &fields))
                    }
                }
            }
            (None, None) => unreachable!("id comes from one of the snapshots"),
        }
    }

    plan.skipped.extend(
        remote
            .malformed
            .iter()
            .map(|id| (id.clone(), "remote payload is not a field map".to_string())),
    );
    plan.writes = to_local;
    plan.writes.extend(to_remote);
    plan
}

fn write(id: &RecordId, target: Side, kind: WriteKind, fields: &Fields) -> PlannedWrite {
    PlannedWrite {
        id: id.clone(),
        target,
        kind,
        fields: fields.clone(),
    }
}

/// The winner's fields plus explicit nulls for fields only the loser has.
///
/// Stores update only the fields they are sent, so a field the winner lacks
/// must be cleared explicitly or the records never become equivalent. Where
/// both sides already hold equivalent values the loser's own value is sent
/// back, so its JSON type (`"12345678"` vs `12345678`) is left as it was.
fn overlay(winner: &Fields, loser: &Fields, columns: Option<&[String]>) -> Fields {
    let mut fields: Fields = winner
        .iter()
        .map(|(name, value)| {
            let kept = match loser.get(name) {
                Some(old) if values_equivalent(value, old) => old.clone(),
                _ => value.clone(),
            };
            (name.clone(), kept)
        })
        .collect();
    for name in loser.keys() {
        let comparable = columns.map_or(true, |cols| cols.iter().any(|c| c == name));
        if comparable && !fields.contains_key(name) {
            fields.insert(name.clone(), Value::Null);
        }
    }
    fields
}

fn project(fields: &Fields, columns: Option<&[String]>) -> Fields {
    match columns {
        Some(columns) => fields
            .iter()
            .filter(|(name, _)| columns.iter().any(|c| c == *name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        None => fields.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> TableName {
        TableName::new("items").unwrap()
    }

    fn snapshot(side: Side, records: Value) -> TableSnapshot {
        let mut snapshot = TableSnapshot::new(table(), side);
        for (id, fields) in records.as_object().unwrap() {
            snapshot.insert(id.clone(), fields.as_object().cloned().unwrap());
        }
        snapshot
    }

    fn summary(plan: &TablePlan) -> Vec<(String, Side, WriteKind, Value)> {
        plan.writes
            .iter()
            .map(|w| (w.id.clone(), w.target, w.kind, Value::Object(w.fields.clone())))
            .collect()
    }

    #[test]
    fn policy_parsing() {
        assert_eq!("bidirectional".parse(), Ok(ConflictPolicy::Bidirectional));
        assert_eq!("REMOTE_WINS".parse(), Ok(ConflictPolicy::Bidirectional));
        assert_eq!("local-priority".parse(), Ok(ConflictPolicy::LocalPriority));
        assert_eq!(" local_wins ".parse(), Ok(ConflictPolicy::LocalPriority));
        assert!("newest".parse::<ConflictPolicy>().is_err());
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::Bidirectional);
    }

    #[test]
    fn bidirectional_remote_wins_mismatch() {
        let local = snapshot(Side::Local, json!({"a": {"v": 1}, "b": {"v": 2}}));
        let remote = snapshot(Side::Remote, json!({"b": {"v": 3}, "c": {"v": 4}}));

        let plan = plan_table(&local, &remote, ConflictPolicy::Bidirectional);

        assert_eq!(
            summary(&plan),
            vec![
                ("b".into(), Side::Local, WriteKind::Update, json!({"v": 3})),
                ("c".into(), Side::Local, WriteKind::Create, json!({"v": 4})),
                ("a".into(), Side::Remote, WriteKind::Create, json!({"v": 1})),
            ]
        );
        assert!(plan.unchanged.is_empty());
    }

    #[test]
    fn local_priority_pushes_mismatch() {
        let local = snapshot(Side::Local, json!({"a": {"v": 1}, "b": {"v": 2}}));
        let remote = snapshot(Side::Remote, json!({"b": {"v": 3}, "c": {"v": 4}}));

        let plan = plan_table(&local, &remote, ConflictPolicy::LocalPriority);

        assert_eq!(
            summary(&plan),
            vec![
                ("c".into(), Side::Local, WriteKind::Create, json!({"v": 4})),
                ("a".into(), Side::Remote, WriteKind::Create, json!({"v": 1})),
                ("b".into(), Side::Remote, WriteKind::Update, json!({"v": 2})),
            ]
        );
        assert_eq!(plan.writes_to(Side::Local).count(), 1);
    }

    #[test]
    fn equivalent_records_are_unchanged() {
        let local = snapshot(
            Side::Local,
            json!({"1": {"concluida": 1, "tags": ["a", "b"], "nota": null}}),
        );
        let remote = snapshot(
            Side::Remote,
            json!({"1": {"tags": ["a", "b"], "concluida": true}}),
        );

        for policy in [ConflictPolicy::Bidirectional, ConflictPolicy::LocalPriority] {
            let plan = plan_table(&local, &remote, policy);
            assert!(plan.is_noop());
            assert_eq!(plan.unchanged, vec!["1".to_string()]);
        }
    }

    #[test]
    fn remote_fields_outside_local_columns_are_ignored() {
        let local = snapshot(Side::Local, json!({"1": {"nome": "x"}}))
            .with_columns(vec!["nome".into()]);
        let remote = snapshot(Side::Remote, json!({"1": {"nome": "x", "novo": 5}}));

        let plan = plan_table(&local, &remote, ConflictPolicy::Bidirectional);
        assert!(plan.is_noop());

        // Without a known column set the extra field is a real difference.
        let local = snapshot(Side::Local, json!({"1": {"nome": "x"}}));
        let plan = plan_table(&local, &remote, ConflictPolicy::Bidirectional);
        assert_eq!(plan.writes.len(), 1);
    }

    #[test]
    fn update_clears_fields_the_winner_lacks() {
        let local = snapshot(Side::Local, json!({"1": {"titulo": "x", "nota": "antiga"}}))
            .with_columns(vec!["titulo".into(), "nota".into()]);
        let remote = snapshot(Side::Remote, json!({"1": {"titulo": "y", "extra": 1}}));

        let plan = plan_table(&local, &remote, ConflictPolicy::Bidirectional);
        assert_eq!(
            Value::Object(plan.writes[0].fields.clone()),
            json!({"titulo": "y", "extra": 1, "nota": null})
        );

        // Remote-only fields outside the local columns are left alone.
        let plan = plan_table(&local, &remote, ConflictPolicy::LocalPriority);
        assert_eq!(
            Value::Object(plan.writes[0].fields.clone()),
            json!({"titulo": "x", "nota": "antiga"})
        );
    }

    #[test]
    fn empty_local_pulls_everything() {
        let local = TableSnapshot::new(table(), Side::Local);
        let remote = snapshot(Side::Remote, json!({"x": {"v": 1}, "y": {"v": 2}}));

        let plan = plan_table(&local, &remote, ConflictPolicy::LocalPriority);
        assert!(plan
            .writes
            .iter()
            .all(|w| w.target == Side::Local && w.kind == WriteKind::Create));
        assert_eq!(plan.writes.len(), 2);
    }

    #[test]
    fn malformed_remote_entries_are_skipped() {
        let local = TableSnapshot::new(table(), Side::Local);
        let remote =
            TableSnapshot::from_wire(table(), json!({"t1": "token", "r1": {"v": 1}})).unwrap();

        let plan = plan_table(&local, &remote, ConflictPolicy::Bidirectional);
        assert_eq!(plan.writes.len(), 1);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].0, "t1");
    }

    #[test]
    fn malformed_remote_id_is_not_pushed_over() {
        let local = snapshot(Side::Local, json!({"t1": {"v": 1}, "r1": {"v": 2}}));
        let remote =
            TableSnapshot::from_wire(table(), json!({"t1": "token", "r1": {"v": 2}})).unwrap();

        for policy in [ConflictPolicy::Bidirectional, ConflictPolicy::LocalPriority] {
            let plan = plan_table(&local, &remote, policy);
            assert!(plan.is_noop(), "{policy}: {:?}", plan.writes);
            assert_eq!(plan.skipped.len(), 1);
            assert_eq!(plan.skipped[0].0, "t1");
            assert_eq!(plan.unchanged, vec!["r1".to_string()]);
        }
    }

    #[test]
    fn update_keeps_the_losers_equivalent_values() {
        let local = snapshot(Side::Local, json!({"1": {"nome": "Filial", "cep": 12345678}}))
            .with_columns(vec!["nome".into(), "cep".into()]);
        let remote = snapshot(Side::Remote, json!({"1": {"nome": "Sede", "cep": "12345678"}}));

        let plan = plan_table(&local, &remote, ConflictPolicy::LocalPriority);
        assert_eq!(
            summary(&plan),
            vec![(
                "1".into(),
                Side::Remote,
                WriteKind::Update,
                json!({"nome": "Filial", "cep": "12345678"})
            )]
        );
    }

    #[test]
    fn json_looking_strings_settle() {
        let local = snapshot(
            Side::Local,
            json!({"1": {"cep": 12345678, "ativo": true, "tags": [1, 2], "apelido": "x"}}),
        );
        let remote = snapshot(
            Side::Remote,
            json!({"1": {"cep": "12345678", "ativo": "true", "tags": "[1,2]", "apelido": "\"x\""}}),
        );

        for policy in [ConflictPolicy::Bidirectional, ConflictPolicy::LocalPriority] {
            let plan = plan_table(&local, &remote, policy);
            assert!(plan.is_noop(), "{policy}: {:?}", plan.writes);
        }
    }
}
