/// Which ceiling a rejected query would have crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionReason {
    /// Running queries plus this one exceed the query quota.
    Query,
    /// Indexing plus running queries plus this one exceed the application quota.
    App,
}

/// A query was refused admission. No state was changed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error(
        "this query {size} plus running queries: {running} would exceed query quota: {quota}"
    )]
    QueryQuotaExceeded { size: u64, running: u64, quota: u64 },

    #[error(
        "this query {size} plus running queries: {running} plus indexing: {indexing} \
         would exceed app quota: {quota}"
    )]
    AppQuotaExceeded {
        size: u64,
        running: u64,
        indexing: u64,
        quota: u64,
    },
}

impl AdmissionError {
    pub fn reason(&self) -> AdmissionReason {
        match self {
            AdmissionError::QueryQuotaExceeded { .. } => AdmissionReason::Query,
            AdmissionError::AppQuotaExceeded { .. } => AdmissionReason::App,
        }
    }

    /// Estimated size of the rejected query.
    pub fn size(&self) -> u64 {
        match *self {
            AdmissionError::QueryQuotaExceeded { size, .. }
            | AdmissionError::AppQuotaExceeded { size, .. } => size,
        }
    }

    /// The ceiling that would have been exceeded.
    pub fn quota(&self) -> u64 {
        match *self {
            AdmissionError::QueryQuotaExceeded { quota, .. }
            | AdmissionError::AppQuotaExceeded { quota, .. } => quota,
        }
    }
}

/// Failure reading an engine's dirty-memory statistic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("index is closed")]
    Closed,

    #[error("stats unavailable: {message}")]
    Unavailable { message: String },
}
