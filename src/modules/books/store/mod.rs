//! Persistence boundary for books.
//!
//! Stores assign identities, keep both timestamps and apply borrow/return as
//! a single conditional update, so two concurrent borrows of the same book
//! cannot both succeed.

mod memory;
mod mongo;

pub use memory::MemoryBookStore;
pub use mongo::MongoBookStore;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use super::models::{Book, BookFilter, BookId, NewBook, Transition};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mongodb operation failed")]
    Mongo(#[from] mongodb::error::Error),

    #[error("store call exceeded {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait BookStore: Send + Sync {
    /// Persist a validated book as available, with both timestamps set to `now`.
    async fn insert(&self, book: NewBook, now: OffsetDateTime) -> Result<Book, StoreError>;

    async fn find(&self, id: BookId) -> Result<Option<Book>, StoreError>;

    /// Apply `transition` only if the book is currently in the state it
    /// requires. `updatedAt` becomes `now`, never earlier than `createdAt`.
    /// `None` means nothing matched: the book is missing or in the other state.
    async fn transition(
        &self,
        id: BookId,
        transition: Transition,
        now: OffsetDateTime,
    ) -> Result<Option<Book>, StoreError>;

    /// Newest first; equal creation times fall back to the id, newest first.
    async fn list(&self, filter: BookFilter) -> Result<Vec<Book>, StoreError>;

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
