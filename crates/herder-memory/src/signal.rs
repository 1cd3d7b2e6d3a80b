use crate::error::ProbeError;
use crate::herder::{IndexKey, MemoryHerder, SizeProbe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An engine-side index that can report how much unflushed memory it holds.
pub trait DirtyMemory: Send + Sync {
    fn dirty_bytes(&self) -> Result<u64, ProbeError>;

    /// Engine family name used in diagnostics.
    fn engine(&self) -> &'static str {
        "index"
    }
}

/// Engine-neutral vocabulary understood by the herder.
#[derive(Clone)]
pub enum IndexSignal {
    /// The index closed; stop tracking it.
    Closed(IndexKey),
    /// A batch is about to be applied to the index; track it and apply backpressure.
    BatchStart(IndexKey, Arc<dyn DirtyMemory>),
    /// Some memory was reclaimed (persisted or merged).
    Progress,
}

impl std::fmt::Debug for IndexSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexSignal::Closed(key) => f.debug_tuple("Closed").field(key).finish(),
            IndexSignal::BatchStart(key, source) => f
                .debug_tuple("BatchStart")
                .field(key)
                .field(&source.engine())
                .finish(),
            IndexSignal::Progress => f.write_str("Progress"),
        }
    }
}

impl MemoryHerder {
    /// Applies one engine-neutral signal. May block on [`IndexSignal::BatchStart`].
    pub fn dispatch(&self, signal: IndexSignal) {
        match signal {
            IndexSignal::Closed(key) => self.unregister(key),
            IndexSignal::BatchStart(key, source) => self.register(key, probe(source)),
            IndexSignal::Progress => self.notify_progress(),
        }
    }
}

/// Wraps `source` as a size probe that counts a failed read as zero bytes.
///
/// Probes are re-evaluated on every wake of a blocked writer, so only the first failure of a
/// run is a warning; repeats are logged at `debug` until a read succeeds again.
pub(crate) fn probe(source: Arc<dyn DirtyMemory>) -> SizeProbe {
    let failing = AtomicBool::new(false);
    Box::new(move || match source.dirty_bytes() {
        Ok(bytes) => {
            if failing.swap(false, Ordering::Relaxed) {
                tracing::info!(
                    target: "herder.memory",
                    engine = source.engine(),
                    "index memory stats readable again"
                );
            }
            bytes
        }
        Err(err) => {
            if failing.swap(true, Ordering::Relaxed) {
                tracing::debug!(
                    target: "herder.memory",
                    engine = source.engine(),
                    error = %err,
                    "index memory stats still unreadable"
                );
            } else {
                tracing::warn!(
                    target: "herder.memory",
                    engine = source.engine(),
                    error = %err,
                    "failed to read index memory stats; counting as zero"
                );
            }
            0
        }
    })
}
