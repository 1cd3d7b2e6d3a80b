use crate::error::AdmissionError;
use crate::quota::Quotas;
use crate::report::{Headroom, HerderReport};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;

/// Reports the current unflushed bytes of one tracked index.
///
/// Probes run while the herder lock is held; they must be cheap and must not call back into
/// the herder.
pub type SizeProbe = Box<dyn Fn() -> u64 + Send + Sync>;

/// Opaque identity of a tracked index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey(u64);

impl IndexKey {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Identity of the allocation behind `index`; stable for as long as any clone is alive.
    pub fn of<T: ?Sized>(index: &Arc<T>) -> Self {
        Self(Arc::as_ptr(index) as *const () as usize as u64)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct State {
    indexes: HashMap<IndexKey, SizeProbe>,
    running_query_bytes: u64,
    waiting: usize,
}

impl State {
    fn indexing_bytes(&self) -> u64 {
        self.indexes
            .values()
            .fold(0u64, |total, probe| total.saturating_add(probe()))
    }

    fn over_quota_for_indexing(&self, quotas: &Quotas) -> bool {
        let indexing = self.indexing_bytes();
        if indexing > quotas.index {
            tracing::debug!(
                target: "herder.memory",
                indexing,
                index_quota = quotas.index,
                "indexing memory over indexing quota"
            );
            return true;
        }

        let combined = indexing.saturating_add(self.running_query_bytes);
        if combined > quotas.app {
            tracing::debug!(
                target: "herder.memory",
                indexing,
                running_queries = self.running_query_bytes,
                app_quota = quotas.app,
                "indexing plus running queries over app quota"
            );
            return true;
        }
        false
    }
}

struct Inner {
    quotas: Quotas,
    state: Mutex<State>,
    wake: Condvar,
}

/// Admission controller shared by index writers and query callers.
///
/// Cloning is cheap; clones share the same quotas and usage.
#[derive(Clone)]
pub struct MemoryHerder {
    inner: Arc<Inner>,
}

impl MemoryHerder {
    pub fn new(memory_quota: u64, app_ratio: f64, index_ratio: f64, query_ratio: f64) -> Self {
        Self::with_quotas(Quotas::from_ratios(
            memory_quota,
            app_ratio,
            index_ratio,
            query_ratio,
        ))
    }

    pub fn with_quotas(quotas: Quotas) -> Self {
        tracing::info!(
            target: "herder.memory",
            memory_quota = quotas.memory,
            app_quota = quotas.app,
            index_quota = quotas.index,
            query_quota = quotas.query,
            "memory herder quotas resolved"
        );
        Self {
            inner: Arc::new(Inner {
                quotas,
                state: Mutex::new(State::default()),
                wake: Condvar::new(),
            }),
        }
    }

    pub fn quotas(&self) -> Quotas {
        self.inner.quotas
    }

    // --- indexing ---

    /// Tracks `key` and blocks until indexing usage fits within budget.
    ///
    /// Replaces any probe already registered for `key`. Returns only once, under the lock,
    /// indexing usage is at most the index quota and indexing plus running queries is at
    /// most the app quota. There is no timeout: a caller stuck here is released by
    /// [`notify_progress`](Self::notify_progress) or [`end_query`](Self::end_query) once
    /// enough memory has been reclaimed.
    pub fn register(&self, key: IndexKey, probe: SizeProbe) {
        let mut state = self.inner.state.lock();
        state.indexes.insert(key, probe);

        while state.over_quota_for_indexing(&self.inner.quotas) {
            tracing::info!(
                target: "herder.memory",
                index = key.get(),
                "waiting for more memory to be available"
            );
            state.waiting += 1;
            self.inner.wake.wait(&mut state);
            state.waiting -= 1;
            tracing::info!(
                target: "herder.memory",
                index = key.get(),
                "resuming upon memory reduction"
            );
        }
    }

    /// Stops tracking `key`. Unknown keys are ignored.
    ///
    /// Blocked writers are not woken; their next wake comes from a progress notification or
    /// a finished query.
    pub fn unregister(&self, key: IndexKey) {
        let mut state = self.inner.state.lock();
        if state.waiting > 0 {
            tracing::debug!(
                target: "herder.memory",
                index = key.get(),
                waiting = state.waiting,
                "index closed while writers are waiting"
            );
        }
        state.indexes.remove(&key);
    }

    /// Wakes every blocked writer so each re-checks its admission.
    pub fn notify_progress(&self) {
        let state = self.inner.state.lock();
        if state.waiting > 0 {
            tracing::debug!(
                target: "herder.memory",
                waiting = state.waiting,
                "persistence progress"
            );
        }
        self.inner.wake.notify_all();
    }

    // --- queries ---

    /// Admits a query estimated to need `size` bytes, or rejects it without blocking.
    ///
    /// On success the caller must later call [`end_query`](Self::end_query) with the same
    /// `size`. A rejection leaves the running-query total untouched.
    pub fn start_query(&self, size: u64) -> Result<(), AdmissionError> {
        let quotas = &self.inner.quotas;
        let mut state = self.inner.state.lock();
        let running = state.running_query_bytes;

        let admitted = match running.checked_add(size) {
            Some(admitted) if admitted <= quotas.query => admitted,
            _ => {
                let err = AdmissionError::QueryQuotaExceeded {
                    size,
                    running,
                    quota: quotas.query,
                };
                tracing::debug!(target: "herder.memory", error = %err, "query rejected");
                return Err(err);
            }
        };

        let indexing = state.indexing_bytes();
        if admitted.saturating_add(indexing) > quotas.app {
            let err = AdmissionError::AppQuotaExceeded {
                size,
                running,
                indexing,
                quota: quotas.app,
            };
            tracing::debug!(target: "herder.memory", error = %err, "query rejected");
            return Err(err);
        }

        state.running_query_bytes = admitted;
        Ok(())
    }

    /// Releases the bytes of a query admitted by [`start_query`](Self::start_query) and
    /// wakes blocked writers.
    pub fn end_query(&self, size: u64) {
        let mut state = self.inner.state.lock();
        match state.running_query_bytes.checked_sub(size) {
            Some(remaining) => state.running_query_bytes = remaining,
            None => {
                tracing::warn!(
                    target: "herder.memory",
                    size,
                    running_queries = state.running_query_bytes,
                    "query ended with more bytes than are running; clamping to zero"
                );
                state.running_query_bytes = 0;
            }
        }

        if state.waiting > 0 {
            tracing::debug!(
                target: "herder.memory",
                waiting = state.waiting,
                "query ended"
            );
        }
        self.inner.wake.notify_all();
    }

    /// Like [`start_query`](Self::start_query), but ends the query when the permit drops.
    pub fn admit_query(&self, size: u64) -> Result<QueryPermit, AdmissionError> {
        self.start_query(size)?;
        Ok(QueryPermit {
            herder: self.clone(),
            size,
        })
    }

    // --- diagnostics ---

    pub fn running_query_bytes(&self) -> u64 {
        self.inner.state.lock().running_query_bytes
    }

    /// Sum of all tracked index probes, computed now.
    pub fn indexing_bytes(&self) -> u64 {
        self.inner.state.lock().indexing_bytes()
    }

    /// Number of writers currently blocked in [`register`](Self::register). Advisory only.
    pub fn waiting(&self) -> usize {
        self.inner.state.lock().waiting
    }

    pub fn tracked_indexes(&self) -> usize {
        self.inner.state.lock().indexes.len()
    }

    pub fn is_tracked(&self, key: IndexKey) -> bool {
        self.inner.state.lock().indexes.contains_key(&key)
    }

    /// Consistent snapshot of quotas and usage taken under one lock acquisition.
    pub fn report(&self) -> HerderReport {
        let quotas = self.inner.quotas;
        let state = self.lock_state();
        let indexing_bytes = state.indexing_bytes();
        let running_query_bytes = state.running_query_bytes;
        let in_flight = indexing_bytes.saturating_add(running_query_bytes);

        HerderReport {
            quotas,
            indexing_bytes,
            running_query_bytes,
            waiting: state.waiting,
            tracked_indexes: state.indexes.len(),
            headroom: Headroom {
                indexing: quotas
                    .index
                    .saturating_sub(indexing_bytes)
                    .min(quotas.app.saturating_sub(in_flight)),
                query: quotas
                    .query
                    .saturating_sub(running_query_bytes)
                    .min(quotas.app.saturating_sub(in_flight)),
            },
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock()
    }
}

impl std::fmt::Debug for MemoryHerder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("MemoryHerder")
            .field("quotas", &self.inner.quotas)
            .field("tracked_indexes", &state.indexes.len())
            .field("running_query_bytes", &state.running_query_bytes)
            .field("waiting", &state.waiting)
            .finish()
    }
}

/// An admitted query; dropping it returns its bytes to the herder.
#[must_use = "dropping the permit immediately ends the query"]
pub struct QueryPermit {
    herder: MemoryHerder,
    size: u64,
}

impl QueryPermit {
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl std::fmt::Debug for QueryPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPermit")
            .field("size", &self.size)
            .finish()
    }
}

impl Drop for QueryPermit {
    fn drop(&mut self) {
        self.herder.end_query(self.size);
    }
}
