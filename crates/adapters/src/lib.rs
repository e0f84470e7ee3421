//! crosspost adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `posts`: Filesystem markdown post repository
//! - `state`: JSON file and in-memory document stores
//! - `medium`: Medium publishing adapter
//! - `devto`: Dev.to publishing adapter

mod http;
mod posts_fs;
mod state_json;
mod state_memory;

pub mod devto;
pub mod medium;

/// Re-exports for post source adapters
pub mod posts {
    pub use crate::posts_fs::FsPostRepository;
}

/// Re-exports for state adapters
pub mod state {
    pub use crate::state_json::JsonFileStore;
    pub use crate::state_memory::InMemoryDocumentStore;
}
