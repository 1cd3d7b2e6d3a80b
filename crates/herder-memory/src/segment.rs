//! Adapter for the segment-based search index engine.

use crate::error::ProbeError;
use crate::herder::{IndexKey, MemoryHerder};
use crate::signal::{DirtyMemory, IndexSignal};
use std::sync::Arc;

/// The segment index engine as seen by the herder.
pub trait SegmentIndex: Send + Sync + 'static {
    /// Bytes held by in-memory segments that have not been persisted yet.
    fn memory_used(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentEventKind {
    Close,
    BatchIntroductionStart,
    BatchIntroduction,
    PersisterProgress,
    MergerProgress,
    PreMergeCheck,
}

#[derive(Clone)]
pub struct SegmentEvent {
    pub kind: SegmentEventKind,
    pub index: Arc<dyn SegmentIndex>,
}

impl std::fmt::Debug for SegmentEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentEvent")
            .field("kind", &self.kind)
            .field("index", &IndexKey::of(&self.index))
            .finish()
    }
}

struct SegmentMemory(Arc<dyn SegmentIndex>);

impl DirtyMemory for SegmentMemory {
    fn dirty_bytes(&self) -> Result<u64, ProbeError> {
        Ok(self.0.memory_used())
    }

    fn engine(&self) -> &'static str {
        "segment"
    }
}

pub fn signal_for(event: &SegmentEvent) -> Option<IndexSignal> {
    let key = IndexKey::of(&event.index);
    match event.kind {
        SegmentEventKind::Close => Some(IndexSignal::Closed(key)),
        SegmentEventKind::BatchIntroductionStart => Some(IndexSignal::BatchStart(
            key,
            Arc::new(SegmentMemory(event.index.clone())),
        )),
        SegmentEventKind::PersisterProgress | SegmentEventKind::MergerProgress => {
            Some(IndexSignal::Progress)
        }
        SegmentEventKind::BatchIntroduction | SegmentEventKind::PreMergeCheck => None,
    }
}

impl MemoryHerder {
    pub fn on_segment_event(&self, event: &SegmentEvent) {
        if let Some(signal) = signal_for(event) {
            self.dispatch(signal);
        }
    }
}

/// Event callback to install on segment indexes; blocks batch introduction while over budget.
pub fn event_handler(herder: MemoryHerder) -> impl Fn(SegmentEvent) + Send + Sync + 'static {
    move |event| herder.on_segment_event(&event)
}
