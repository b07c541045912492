#![deny(missing_docs)]

//! # Operation Metadata Store
//!
//! Finalized [`OperationRecord`]s keyed by `(path, method)`. Iteration order
//! is deterministic: paths lexicographically, then methods in Path Item order.

use crate::declare::{HttpMethod, OperationRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// What happens when an operation is committed twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitPolicy {
    /// Fold the later declaration into the earlier one.
    #[default]
    Merge,
    /// Replace the earlier declaration wholesale.
    Overwrite,
}

/// Result of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// First declaration of the operation.
    Inserted,
    /// Folded into an existing record.
    Merged,
    /// Replaced an existing record.
    Replaced,
}

/// Store key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationKey {
    /// Full path template.
    pub path: String,
    /// Method.
    pub method: HttpMethod,
}

impl OperationKey {
    /// Builds a key.
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
        }
    }
}

/// Committed operation records.
#[derive(Debug, Clone, Default)]
pub struct OperationMetadataStore {
    policy: CommitPolicy,
    records: BTreeMap<OperationKey, OperationRecord>,
}

impl OperationMetadataStore {
    /// An empty store with the given commit policy.
    pub fn new(policy: CommitPolicy) -> Self {
        Self {
            policy,
            records: BTreeMap::new(),
        }
    }

    /// The active commit policy.
    pub fn policy(&self) -> CommitPolicy {
        self.policy
    }

    /// Changes the commit policy for later commits.
    pub fn set_policy(&mut self, policy: CommitPolicy) {
        self.policy = policy;
    }

    /// Stores a record, resolving a duplicate `(path, method)` per policy.
    pub fn commit(&mut self, record: OperationRecord) -> CommitOutcome {
        let key = record.key();
        match self.records.get_mut(&key) {
            None => {
                debug!(method = %key.method, path = %key.path, "Operation committed");
                self.records.insert(key, record);
                CommitOutcome::Inserted
            }
            Some(existing) => match self.policy {
                CommitPolicy::Merge => {
                    debug!(method = %key.method, path = %key.path, "Operation merged into existing record");
                    existing.merge_from(record);
                    CommitOutcome::Merged
                }
                CommitPolicy::Overwrite => {
                    debug!(method = %key.method, path = %key.path, "Operation record replaced");
                    *existing = record;
                    CommitOutcome::Replaced
                }
            },
        }
    }

    /// Looks up one operation.
    pub fn get(&self, path: &str, method: HttpMethod) -> Option<&OperationRecord> {
        self.records.get(&OperationKey::new(path, method))
    }

    /// All records in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &OperationRecord> {
        self.records.values()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing was committed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record. The policy is kept.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::{ResponseSpec, StatusKey};
    use crate::schema::Schema;

    fn record(path: &str, method: HttpMethod, status: u16) -> OperationRecord {
        let mut responses = BTreeMap::new();
        responses.insert(
            StatusKey::Code(status),
            ResponseSpec::new(StatusKey::Code(status)).with_json(Schema::string()),
        );
        OperationRecord {
            path: path.into(),
            method,
            operation_id: format!("{}{}", method.as_key(), status),
            summary: None,
            description: None,
            tags: vec![],
            parameters: vec![],
            request_body: None,
            responses,
            security: None,
            deprecated: false,
            openapi_version: None,
            source: None,
            operation_id_derived: false,
        }
    }

    #[test]
    fn test_merge_policy_unions_responses() {
        let mut store = OperationMetadataStore::new(CommitPolicy::Merge);
        assert_eq!(
            store.commit(record("/pets", HttpMethod::Get, 200)),
            CommitOutcome::Inserted
        );
        assert_eq!(
            store.commit(record("/pets", HttpMethod::Get, 404)),
            CommitOutcome::Merged
        );
        let merged = store.get("/pets", HttpMethod::Get).unwrap();
        assert_eq!(merged.responses.len(), 2);
        assert_eq!(merged.operation_id, "get404");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_overwrite_policy_replaces() {
        let mut store = OperationMetadataStore::new(CommitPolicy::Overwrite);
        store.commit(record("/pets", HttpMethod::Get, 200));
        assert_eq!(
            store.commit(record("/pets", HttpMethod::Get, 404)),
            CommitOutcome::Replaced
        );
        let kept = store.get("/pets", HttpMethod::Get).unwrap();
        assert_eq!(
            kept.responses.keys().copied().collect::<Vec<_>>(),
            vec![StatusKey::Code(404)]
        );
    }

    #[test]
    fn test_iteration_order_is_deterministic() {
        let mut store = OperationMetadataStore::default();
        store.commit(record("/z", HttpMethod::Get, 200));
        store.commit(record("/a", HttpMethod::Post, 201));
        store.commit(record("/a", HttpMethod::Get, 200));
        let keys: Vec<(String, HttpMethod)> = store
            .iter()
            .map(|r| (r.path.clone(), r.method))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("/a".to_string(), HttpMethod::Get),
                ("/a".to_string(), HttpMethod::Post),
                ("/z".to_string(), HttpMethod::Get),
            ]
        );
    }

    #[test]
    fn test_clear_keeps_policy() {
        let mut store = OperationMetadataStore::new(CommitPolicy::Overwrite);
        store.commit(record("/pets", HttpMethod::Get, 200));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.policy(), CommitPolicy::Overwrite);
    }
}
