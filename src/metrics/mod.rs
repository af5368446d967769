//! Per-entity accumulation of the values reported to the metric sink.

use crate::types::{MetricSinkSubmission, MetricSinkSubmissionValue};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Everything ever reported for one entity. Nothing is deduplicated or
/// expired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Metric {
    pub last: i64,
    pub count: u64,
    pub values: Vec<i64>,
    /// Reporting node of each value, in arrival order
    pub writers: Vec<String>,
}

impl Metric {
    fn push(&mut self, value: MetricSinkSubmissionValue) {
        self.last = value.value;
        self.count += 1;
        self.values.push(value.value);
        self.writers.push(value.hostname);
    }
}

/// Submissions and snapshots are serialized against each other through a
/// single mutex, so a snapshot never shows half of a batch.
#[derive(Debug, Default)]
pub struct MetricStore {
    data: Mutex<BTreeMap<String, Metric>>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a batch in order and returns the number of values recorded.
    pub fn submit(&self, submission: MetricSinkSubmission) -> usize {
        let mut data = self.data.lock();
        let count = submission.values.len();

        for value in submission.values {
            data.entry(value.entity.clone()).or_default().push(value);
        }

        count
    }

    pub fn snapshot(&self) -> BTreeMap<String, Metric> {
        self.data.lock().clone()
    }

    pub fn get(&self, entity: &str) -> Option<Metric> {
        self.data.lock().get(entity).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(entity: &str, hostname: &str, value: i64) -> MetricSinkSubmissionValue {
        MetricSinkSubmissionValue {
            entity: entity.to_string(),
            hostname: hostname.to_string(),
            value,
        }
    }

    #[test]
    fn test_submit_accumulates() {
        let store = MetricStore::new();

        let recorded = store.submit(MetricSinkSubmission {
            values: vec![value("e1", "n1", 5)],
        });
        assert_eq!(recorded, 1);

        assert_eq!(
            store.get("e1"),
            Some(Metric {
                last: 5,
                count: 1,
                values: vec![5],
                writers: vec!["n1".to_string()],
            })
        );

        // same entity reported twice in one batch and by another node
        store.submit(MetricSinkSubmission {
            values: vec![value("e1", "n2", 7), value("e2", "n2", 1), value("e1", "n1", 8)],
        });

        let e1 = store.get("e1").unwrap();
        assert_eq!(e1.last, 8);
        assert_eq!(e1.count, 3);
        assert_eq!(e1.values, vec![5, 7, 8]);
        assert_eq!(e1.writers, vec!["n1", "n2", "n1"]);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_empty_submission_changes_nothing() {
        let store = MetricStore::new();

        assert_eq!(store.submit(MetricSinkSubmission::default()), 0);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_concurrent_submissions_are_all_recorded() {
        let store = MetricStore::new();

        std::thread::scope(|scope| {
            for node in 0..4 {
                let store = &store;
                scope.spawn(move || {
                    for i in 0..250 {
                        store.submit(MetricSinkSubmission {
                            values: vec![value("e1", &format!("n{node}"), i)],
                        });
                    }
                });
            }
        });

        let e1 = store.get("e1").unwrap();
        assert_eq!(e1.count, 1_000);
        assert_eq!(e1.values.len(), 1_000);
        assert_eq!(e1.writers.len(), 1_000);
    }
}
