//! Screenplay document model, scene chunking and change fingerprints.
//!
//! Everything in this crate is synchronous and pure: it reads a
//! [`DocumentSnapshot`] and produces values. Embedding, storage and caching live in
//! `scribe-ai-embed` and `scribe-ai-retriever`.

pub mod chunker;
pub mod document;
pub mod fingerprint;
pub mod import;

pub use chunker::{
    Chunk, ChunkMetadata, Chunker, ChunkerConfig, FALLBACK_HEADING, MIN_CONTENT_CHARS, chunk,
    chunk_id,
};
pub use document::{DocumentSnapshot, DocumentSource, LineType, ScriptLine};
pub use fingerprint::{Fingerprint, FingerprintMode, fingerprint, fingerprint_with_mode};
