//! Point-in-time captures of one table from one store.
//!
//! A pass captures a remote and a local snapshot per table, plans against
//! them and drops them. Records are keyed by id in a BTreeMap so every pass
//! walks them in the same order.

use crate::{error::Result, ident::is_valid_identifier, Error, Fields, RecordId, TableName, ID_COLUMN};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Which store a snapshot or a write belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The embedded SQLite store
    Local,
    /// The HTTP table store
    Remote,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Local => f.write_str("local"),
            Side::Remote => f.write_str("remote"),
        }
    }
}

/// All records of one table as seen by one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    /// Table the records belong to
    pub table: TableName,
    /// Store the records were read from
    pub side: Side,
    /// Payload fields by record id; the id is never a field
    pub records: BTreeMap<RecordId, Fields>,
    /// Column set of the table, when the store has a fixed one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Ids whose wire payload was not a field map
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub malformed: Vec<RecordId>,
}

impl TableSnapshot {
    /// Create an empty snapshot.
    pub fn new(table: TableName, side: Side) -> Self {
        Self {
            table,
            side,
            records: BTreeMap::new(),
            columns: None,
            malformed: Vec::new(),
        }
    }

    /// Attach the table's column set.
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Add a record. An `id` key inside the payload is discarded.
    pub fn insert(&mut self, id: impl Into<RecordId>, mut fields: Fields) {
        fields.shift_remove(ID_COLUMN);
        self.records.insert(id.into(), fields);
    }

    /// Parse the remote wire shape `{ "<id>": {field: value, ...}, ... }`.
    ///
    /// A body that is not an object is an error. Entries whose value is not
    /// an object are kept out of `records` and listed in `malformed`.
    pub fn from_wire(table: TableName, body: Value) -> Result<Self> {
        let Value::Object(entries) = body else {
            return Err(Error::InvalidPayload(format!(
                "table {} body is not an object",
                table
            )));
        };

        let mut snapshot = Self::new(table, Side::Remote);
        for (id, value) in entries {
            match value {
                Value::Object(fields) => snapshot.insert(id, fields),
                _ => snapshot.malformed.push(id),
            }
        }
        Ok(snapshot)
    }

    pub fn get(&self, id: &str) -> Option<&Fields> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Number of well-formed records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record used for schema inference.
    ///
    /// The lowest id whose record has at least one usable column name. When
    /// no record has one, the lowest id, so inference reports the table.
    pub fn sample(&self) -> Option<(&RecordId, &Fields)> {
        self.records
            .iter()
            .find(|(_, fields)| {
                fields
                    .keys()
                    .any(|name| name != ID_COLUMN && is_valid_identifier(name))
            })
            .or_else(|| self.records.iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> TableName {
        TableName::new("tarefas").unwrap()
    }

    #[test]
    fn parses_wire_shape() {
        let body = json!({
            "2": {"titulo": "Implementar banco de dados", "concluida": 1},
            "1": {"titulo": "Configurar servidor", "concluida": 1},
        });
        let snapshot = TableSnapshot::from_wire(table(), body).unwrap();

        assert_eq!(snapshot.side, Side::Remote);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.get("1").unwrap().get("titulo"),
            Some(&json!("Configurar servidor"))
        );
        let ids: Vec<&str> = snapshot.records.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(snapshot.sample().unwrap().0, "1");
    }

    #[test]
    fn strips_id_from_payload() {
        let body = json!({"a": {"id": "a", "nome": "x"}});
        let snapshot = TableSnapshot::from_wire(table(), body).unwrap();
        assert_eq!(snapshot.get("a").unwrap().get("id"), None);
        assert_eq!(snapshot.get("a").unwrap().len(), 1);
    }

    #[test]
    fn non_object_body_is_rejected() {
        let result = TableSnapshot::from_wire(table(), json!(["a", "b"]));
        assert!(matches!(result, Err(Error::InvalidPayload(_))));

        let result = TableSnapshot::from_wire(table(), json!(1));
        assert!(matches!(result, Err(Error::InvalidPayload(_))));
    }

    #[test]
    fn scalar_entries_are_malformed() {
        let body = json!({"tok1": "abcdef", "r1": {"token": "x"}});
        let snapshot = TableSnapshot::from_wire(table(), body).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.malformed, vec!["tok1".to_string()]);
    }

    #[test]
    fn empty_table() {
        let snapshot = TableSnapshot::from_wire(table(), json!({})).unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.sample().is_none());
    }

    #[test]
    fn sample_skips_records_without_usable_fields() {
        let body = json!({
            "1": {},
            "2": {"bad name": 1},
            "3": {"titulo": "x"},
        });
        let snapshot = TableSnapshot::from_wire(table(), body).unwrap();
        assert_eq!(snapshot.sample().unwrap().0, "3");

        let body = json!({"1": {}, "2": {"id": "2"}});
        let snapshot = TableSnapshot::from_wire(table(), body).unwrap();
        assert_eq!(snapshot.sample().unwrap().0, "1");
    }
}
