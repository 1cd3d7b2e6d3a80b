use crate::quota::Quotas;
use serde::{Deserialize, Serialize};

/// Bytes that can still be admitted before the first ceiling on each path is hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headroom {
    /// Additional indexing memory before a writer would block.
    pub indexing: u64,
    /// Largest query estimate that would currently be admitted.
    pub query: u64,
}

/// Snapshot of herder state intended for logs and status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HerderReport {
    pub quotas: Quotas,
    pub indexing_bytes: u64,
    pub running_query_bytes: u64,
    pub waiting: usize,
    pub tracked_indexes: usize,
    pub headroom: Headroom,
}

impl HerderReport {
    pub fn in_flight_bytes(&self) -> u64 {
        self.indexing_bytes.saturating_add(self.running_query_bytes)
    }
}
