//! # mnemo-memory
//!
//! Three-tier associative memory store:
//!
//! - **Working memory** ([`TraceTable`]): a handful of short-lived traces, evicted
//!   oldest-first at capacity and decaying within hours.
//! - **Episodic memory** ([`EpisodeStore`]): timestamped, tagged episodes with time,
//!   context-type and tag indices, pruned by importance.
//! - **Semantic memory** ([`AssociativeGraph`]): concepts linked by symmetric weighted
//!   edges, recalled by bounded spreading activation, decaying very slowly.
//!
//! [`MemoryCoordinator`] composes the tiers: it routes stores and retrievals,
//! consolidates episodes into concepts, keeps a registry of cross-tier links, and
//! runs the periodic decay sweep. Everything is in-process and in-memory.

pub mod consolidation;
pub mod coordinator;
pub mod episodic;
pub mod query;
pub mod salience;
pub mod semantic;
pub mod similarity;
pub mod tier;
pub mod working;

pub use consolidation::{
    ConsolidationReport, ConsolidationRequest, ExtractionPolicy, RuleExtractionPolicy,
    SemanticSummary,
};
pub use coordinator::{MemoryCoordinator, MemoryItem, MemoryStats, SweepReport};
pub use episodic::{Episode, EpisodeStore, Outcome, StoredEpisode};
pub use query::MemoryQuery;
pub use salience::{AccessStats, Salience};
pub use semantic::{ActivatedConcept, AssociativeGraph, Concept, StoredConcept};
pub use tier::{MemoryTier, TierStats};
pub use working::{MemoryTrace, StoredTrace, TraceTable};
