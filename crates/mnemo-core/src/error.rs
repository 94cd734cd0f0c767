use thiserror::Error;

use crate::types::ItemId;

/// Unified error type for the mnemo memory store.
#[derive(Error, Debug)]
pub enum MnemoError {
    // ── Caller errors ──────────────────────────────────────────
    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("unknown id: {0}")]
    UnknownId(ItemId),

    // ── Consolidation errors ───────────────────────────────────
    #[error("semantic extraction failed: {0}")]
    Extraction(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MnemoError>;
