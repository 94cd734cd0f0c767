//! # mnemo-core
//!
//! Core types, traits, and primitives for the mnemo tiered memory store.
//! This crate defines the shared vocabulary used by every other crate in the workspace:
//! identifiers and tiers, the error type, telemetry events, and the collaborator
//! interfaces the store consumes (clock, tokenizer, content classifier).

pub mod classify;
pub mod clock;
pub mod error;
pub mod event;
pub mod tokenize;
pub mod types;

pub use classify::{ContentClassifier, ContentKind, KeywordClassifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{MnemoError, Result};
pub use event::{EventBus, MemoryEvent, RemovalReason};
pub use tokenize::{StopWordTokenizer, Tokenizer};
pub use types::*;
