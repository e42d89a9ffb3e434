//! Tracks which offsets are safe to commit per partition.
//!
//! Kafka commits are positions: committing offset N acknowledges every record before it on
//! the partition. A record that failed processing stays unacknowledged, so the committed
//! position of its partition is held at the lowest failed offset until that record is
//! processed on redelivery or dead lettered. Records after it keep being processed.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPartition {
    topic: String,
    partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition_number(&self) -> i32 {
        self.partition
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.topic, self.partition)
    }
}

/// Offsets that failed and have not been resolved yet, per partition.
#[derive(Debug, Default)]
pub struct OffsetTracker {
    failed: HashMap<TopicPartition, BTreeSet<i64>>,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that `offset` was not processed and must not be acknowledged.
    pub fn mark_failed(&mut self, partition: &TopicPartition, offset: i64) {
        self.failed
            .entry(partition.clone())
            .or_default()
            .insert(offset);
    }

    /// Record that `offset` was handled and return the position to commit: the offset after
    /// it, or the lowest offset still failed on the partition if that is lower.
    pub fn mark_done(&mut self, partition: &TopicPartition, offset: i64) -> i64 {
        let next_offset = offset + 1;
        let Some(failed) = self.failed.get_mut(partition) else {
            return next_offset;
        };

        failed.remove(&offset);
        match failed.first().copied() {
            Some(lowest) => lowest.min(next_offset),
            None => {
                self.failed.remove(partition);
                next_offset
            }
        }
    }

    pub fn failed_count(&self) -> usize {
        self.failed.values().map(BTreeSet::len).sum()
    }
}
