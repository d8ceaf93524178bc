mod memory_repository;
mod postgres_repository;
mod r#trait;

pub use memory_repository::InMemorySocialStore;
pub use postgres_repository::PostgresSocialStore;
pub use r#trait::{
    AuthorScope, CommitOutcome, EdgeChange, EdgeOp, PostQuery, SocialStore, StoreError,
    StoreResult,
};
