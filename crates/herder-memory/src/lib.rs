//! Memory admission control for a search/indexing server.
//!
//! A [`MemoryHerder`] arbitrates two producers of memory pressure against a hierarchy of
//! quotas derived from one process budget:
//! - Index batch writers call [`MemoryHerder::register`] and block while indexing (plus
//!   running queries) is over budget, until an engine reports reclaim progress.
//! - Interactive queries call [`MemoryHerder::start_query`] and are rejected immediately
//!   when they would not fit.
//!
//! Engine-specific event streams are translated into the herder's generic signals by the
//! adapters in [`collection`] and [`segment`].

pub mod collection;
mod error;
mod herder;
mod quota;
mod report;
pub mod segment;
mod signal;
mod system;

pub use error::{AdmissionError, AdmissionReason, ProbeError};
pub use herder::{IndexKey, MemoryHerder, QueryPermit, SizeProbe};
pub use quota::{compute_quotas, parse_byte_size, Quotas, GB, MB};
pub use report::{Headroom, HerderReport};
pub use signal::{DirtyMemory, IndexSignal};
pub use system::{detect_total_memory, parse_cgroup_memory_limit_bytes};
