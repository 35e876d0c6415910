//! CiteSync Consistency Engine
//!
//! The pure computational core that keeps a document's numbered reference
//! list and its in-text numeric citations mutually consistent:
//! - Number list codec (marker text <-> integer lists)
//! - Position mapping (move / sort / delete strategies)
//! - Citation text rewriting (marker spans remapped, orphans flagged)
//! - Reorder orchestration producing an immutable change set
//!
//! Everything in this crate is a function of an explicit snapshot; no
//! component performs I/O or holds state between calls. Persistence is the
//! caller's concern.

pub mod codec;
pub mod mapping;
pub mod reorder;
pub mod rewrite;
pub mod snapshot;

use thiserror::Error;
use uuid::Uuid;

// Re-export the types callers actually touch
pub use mapping::{PositionMap, Target};
pub use reorder::{
    ChangeSet, CitationRewriteGroup, DeletedReference, ReferencePlacement, SortDirection,
};
pub use snapshot::{CitationEntry, CitationKind, DocumentSnapshot, ReferenceEntry};

/// Validation errors produced before any mutation is computed.
///
/// There is deliberately no storage variant here: the engine never touches
/// persistence, so everything it can fail with is a logical error the caller
/// must not retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("reference not found: {id}")]
    NotFound { id: Uuid },

    #[error("invalid target position {position}: expected 1..={len}")]
    InvalidPosition { position: u32, len: u32 },
}

/// Marker body substituted when every numeral in a span pointed at a
/// deleted reference.
pub const ORPHAN_MARKER: &str = "orphaned";
