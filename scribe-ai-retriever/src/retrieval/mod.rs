pub mod context_bundle;
pub mod index_manager;
pub mod query_cache;
pub mod registry;
pub mod retriever;
