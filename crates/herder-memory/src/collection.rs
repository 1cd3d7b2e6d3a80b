//! Adapter for the log-structured collection engine.
//!
//! Collections buffer batches in memory until a background persister writes them to a lower
//! level store. Only collections configured with such a lower level take part in admission;
//! events from any other collection are ignored.

use crate::error::ProbeError;
use crate::herder::{IndexKey, MemoryHerder};
use crate::signal::{DirtyMemory, IndexSignal};
use std::sync::Arc;

/// Configuration a collection was opened with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionOptions {
    /// The collection persists into a lower level store.
    pub lower_level_update: bool,
}

/// Point-in-time counters of a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub cur_dirty_ops: u64,
    pub cur_dirty_bytes: u64,
}

/// The collection engine as seen by the herder.
pub trait Collection: Send + Sync + 'static {
    fn options(&self) -> CollectionOptions;

    fn stats(&self) -> Result<CollectionStats, ProbeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionEventKind {
    CloseStart,
    Close,
    BatchExecuteStart,
    BatchExecute,
    PersisterProgress,
}

#[derive(Clone)]
pub struct CollectionEvent {
    pub kind: CollectionEventKind,
    pub collection: Arc<dyn Collection>,
}

impl std::fmt::Debug for CollectionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionEvent")
            .field("kind", &self.kind)
            .field("collection", &IndexKey::of(&self.collection))
            .finish()
    }
}

struct CollectionMemory(Arc<dyn Collection>);

impl DirtyMemory for CollectionMemory {
    fn dirty_bytes(&self) -> Result<u64, ProbeError> {
        self.0.stats().map(|stats| stats.cur_dirty_bytes)
    }

    fn engine(&self) -> &'static str {
        "collection"
    }
}

/// Translates a collection event, or returns `None` if the herder should ignore it.
pub fn signal_for(event: &CollectionEvent) -> Option<IndexSignal> {
    if !event.collection.options().lower_level_update {
        return None;
    }

    let key = IndexKey::of(&event.collection);
    match event.kind {
        CollectionEventKind::Close => Some(IndexSignal::Closed(key)),
        CollectionEventKind::BatchExecuteStart => Some(IndexSignal::BatchStart(
            key,
            Arc::new(CollectionMemory(event.collection.clone())),
        )),
        CollectionEventKind::PersisterProgress => Some(IndexSignal::Progress),
        CollectionEventKind::CloseStart | CollectionEventKind::BatchExecute => None,
    }
}

impl MemoryHerder {
    pub fn on_collection_event(&self, event: &CollectionEvent) {
        if let Some(signal) = signal_for(event) {
            self.dispatch(signal);
        }
    }
}

/// Event callback to install on collections; blocks batch execution while over budget.
pub fn event_handler(herder: MemoryHerder) -> impl Fn(CollectionEvent) + Send + Sync + 'static {
    move |event| herder.on_collection_event(&event)
}
