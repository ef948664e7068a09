//! Append-only record of executed actions with de-duplication keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One executed action. Immutable once created; only successfully
/// dispatched actions become records (failures stay eligible for retry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_id: String,
    pub tool: String,
    pub parameters: serde_json::Value,
    /// The transcript phrase that justified this action.
    pub source_text: String,
    pub created_at: DateTime<Utc>,
}

impl ActionRecord {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.tool, &self.parameters, &self.source_text)
    }
}

/// De-duplication key: `(tool, parameters, source_text)`. Parameters are
/// canonicalized through serde_json so key equality does not depend on map
/// ordering in the original JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    tool: String,
    parameters: String,
    source_text: String,
}

impl DedupKey {
    pub fn new(tool: &str, parameters: &serde_json::Value, source_text: &str) -> Self {
        Self {
            tool: tool.to_string(),
            parameters: canonical_json(parameters),
            source_text: source_text.to_string(),
        }
    }
}

fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            // Keys are emitted as quoted JSON strings; a bare key could
            // collide with separator characters in another object.
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::Value::String(k.clone()),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        serde_json::Value::Array(items) => {
            let fields: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", fields.join(","))
        }
        other => other.to_string(),
    }
}

/// Bounded FIFO history of executed actions, oldest first.
#[derive(Debug, Clone)]
pub struct ActionLedger {
    records: VecDeque<ActionRecord>,
    cap: usize,
}

impl ActionLedger {
    pub fn new(cap: usize) -> Self {
        Self {
            records: VecDeque::new(),
            cap,
        }
    }

    /// Append a record, evicting the oldest entry once the cap is exceeded.
    pub fn record(&mut self, record: ActionRecord) {
        tracing::debug!(
            action_id = %record.action_id,
            tool = %record.tool,
            "committing action record"
        );
        self.records.push_back(record);
        while self.records.len() > self.cap {
            if let Some(evicted) = self.records.pop_front() {
                tracing::trace!(action_id = %evicted.action_id, "evicted oldest action record");
            }
        }
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.records.iter().any(|r| r.dedup_key() == *key)
    }

    pub fn records(&self) -> impl Iterator<Item = &ActionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_vec(&self) -> Vec<ActionRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn restore(cap: usize, records: Vec<ActionRecord>) -> Self {
        let mut ledger = Self::new(cap);
        for record in records {
            ledger.record(record);
        }
        ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, tool: &str, params: serde_json::Value, source: &str) -> ActionRecord {
        ActionRecord {
            action_id: id.to_string(),
            tool: tool.to_string(),
            parameters: params,
            source_text: source.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_ledger_detects_duplicate_key() {
        let mut ledger = ActionLedger::new(10);
        let r = record("act-1", "open_window", json!({"content": "cheese"}), "saying cheese");
        let key = r.dedup_key();
        ledger.record(r);

        assert!(ledger.contains(&key));
        assert!(!ledger.contains(&DedupKey::new(
            "open_window",
            &json!({"content": "hello"}),
            "saying cheese"
        )));
    }

    #[test]
    fn test_dedup_key_ignores_field_order() {
        let a = DedupKey::new("t", &json!({"a": 1, "b": 2}), "s");
        let b = DedupKey::new("t", &json!({"b": 2, "a": 1}), "s");
        assert_eq!(a, b);
    }

    #[test]
    fn test_dedup_key_distinguishes_structurally_different_objects() {
        // Keys containing separator characters must not flatten into the
        // same canonical form as a multi-field object.
        let a = DedupKey::new("t", &json!({"a": 1, "b": 2}), "s");
        let b = DedupKey::new("t", &json!({"a:1,b": 2}), "s");
        assert_ne!(a, b);

        let a = DedupKey::new("t", &json!({"x": "1,y:2"}), "s");
        let b = DedupKey::new("t", &json!({"x": 1, "y": 2}), "s");
        assert_ne!(a, b);

        let a = DedupKey::new("t", &json!({"n": "1"}), "s");
        let b = DedupKey::new("t", &json!({"n": 1}), "s");
        assert_ne!(a, b);
    }

    #[test]
    fn test_fifo_eviction_at_cap() {
        let mut ledger = ActionLedger::new(3);
        for i in 0..5 {
            ledger.record(record(
                &format!("act-{}", i),
                "open_window",
                json!({"n": i}),
                "source",
            ));
        }
        assert_eq!(ledger.len(), 3);
        let ids: Vec<&str> = ledger.records().map(|r| r.action_id.as_str()).collect();
        assert_eq!(ids, vec!["act-2", "act-3", "act-4"]);
    }

    #[test]
    fn test_evicted_key_becomes_reusable() {
        let mut ledger = ActionLedger::new(1);
        let first = record("act-1", "search", json!({"query": "rust"}), "search for rust");
        let key = first.dedup_key();
        ledger.record(first);
        assert!(ledger.contains(&key));

        ledger.record(record("act-2", "search", json!({"query": "cats"}), "search for cats"));
        assert!(!ledger.contains(&key));
    }

    #[test]
    fn test_restore_round_trip() {
        let mut ledger = ActionLedger::new(5);
        ledger.record(record("act-1", "close_window", json!({"target": "active"}), "close it"));
        let restored = ActionLedger::restore(5, ledger.to_vec());
        assert_eq!(restored.len(), 1);
        assert!(restored.contains(&DedupKey::new(
            "close_window",
            &json!({"target": "active"}),
            "close it"
        )));
    }
}
