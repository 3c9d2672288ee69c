//! User-facing status reporting.
//!
//! Callers that assemble prompts need to tell three situations apart, each with
//! its own wording: the index is still being built, the index is unusable, and
//! the index works but found nothing. [`SearchStatus`] carries that distinction;
//! [`IndexReport`] is the machine-readable snapshot used by the CLI.

use crate::retrieval::index_manager::IndexState;
use serde::Serialize;
use std::fmt;

/// Outcome of a semantic search, as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SearchStatus {
    /// A first rebuild is in progress
    Building,
    /// No usable index
    Unavailable { last_error: Option<String> },
    /// The index answered but nothing was relevant
    NoMatches,
    /// This many results were returned
    Matches { count: usize },
}

impl SearchStatus {
    pub fn has_matches(&self) -> bool {
        matches!(self, SearchStatus::Matches { .. })
    }
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchStatus::Building => write!(f, "index is being built"),
            SearchStatus::Unavailable { last_error } => write!(
                f,
                "index unavailable (last error: {})",
                last_error.as_deref().unwrap_or("none")
            ),
            SearchStatus::NoMatches => write!(f, "no relevant matches found"),
            SearchStatus::Matches { count } => write!(f, "{count} relevant scenes found"),
        }
    }
}

/// Point-in-time summary of one document's index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub document_id: String,
    pub ready: bool,
    pub rebuilding: bool,
    pub chunk_count: usize,
    /// Hex fingerprint of the indexed snapshot, absent if unknown
    pub fingerprint: Option<String>,
    pub rebuilds: u64,
    pub last_error: Option<String>,
    pub stored_vectors: Option<usize>,
    pub query_cache_entries: usize,
    pub query_cache_hits: u64,
    pub query_cache_misses: u64,
}

impl IndexReport {
    pub(crate) fn from_state(document_id: &str, state: &IndexState, rebuilding: bool) -> Self {
        Self {
            document_id: document_id.to_string(),
            ready: state.ready,
            rebuilding,
            chunk_count: state.chunk_count,
            fingerprint: state.fingerprint.to_hex(),
            rebuilds: state.rebuilds,
            last_error: state.last_error.clone(),
            stored_vectors: None,
            query_cache_entries: 0,
            query_cache_hits: 0,
            query_cache_misses: 0,
        }
    }

    /// The status a search would report right now, before running it.
    pub fn availability(&self) -> Option<SearchStatus> {
        if self.ready {
            None
        } else if self.rebuilding {
            Some(SearchStatus::Building)
        } else {
            Some(SearchStatus::Unavailable {
                last_error: self.last_error.clone(),
            })
        }
    }
}

impl fmt::Display for IndexReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Document: {}", self.document_id)?;
        let state = match (self.ready, self.rebuilding) {
            (_, true) => "rebuilding",
            (true, false) => "ready",
            (false, false) => "not ready",
        };
        writeln!(f, "  Index: {state}")?;
        writeln!(f, "  Chunks: {}", self.chunk_count)?;
        if let Some(stored) = self.stored_vectors {
            writeln!(f, "  Stored vectors: {stored}")?;
        }
        writeln!(
            f,
            "  Fingerprint: {}",
            self.fingerprint.as_deref().unwrap_or("unknown")
        )?;
        writeln!(f, "  Rebuilds: {}", self.rebuilds)?;
        if let Some(error) = &self.last_error {
            writeln!(f, "  Last error: {error}")?;
        }
        write!(
            f,
            "  Query cache: {} entries ({} hits, {} misses)",
            self.query_cache_entries, self.query_cache_hits, self.query_cache_misses
        )
    }
}
