use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{BookStore, StoreError};
use crate::modules::books::models::{Book, BookFilter, BookId, NewBook, Transition};

/// Process-local store for development and tests. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryBookStore {
    books: RwLock<HashMap<BookId, Book>>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn insert(&self, book: NewBook, now: OffsetDateTime) -> Result<Book, StoreError> {
        let book = Book {
            id: BookId::generate(),
            title: book.title,
            author: book.author,
            is_borrowed: false,
            created_at: now,
            updated_at: now,
        };

        self.books.write().await.insert(book.id, book.clone());
        Ok(book)
    }

    async fn find(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        Ok(self.books.read().await.get(&id).cloned())
    }

    async fn transition(
        &self,
        id: BookId,
        transition: Transition,
        now: OffsetDateTime,
    ) -> Result<Option<Book>, StoreError> {
        // Check and update under one write guard.
        let mut books = self.books.write().await;
        let Some(book) = books.get_mut(&id) else {
            return Ok(None);
        };
        if book.is_borrowed != transition.requires() {
            return Ok(None);
        }

        book.is_borrowed = transition.target();
        book.updated_at = now.max(book.created_at);
        Ok(Some(book.clone()))
    }

    async fn list(&self, filter: BookFilter) -> Result<Vec<Book>, StoreError> {
        let mut books: Vec<Book> = self
            .books
            .read()
            .await
            .values()
            .filter(|book| filter.matches(book))
            .cloned()
            .collect();

        books.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(books)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn new_book(title: &str) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: "Herbert".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamps() {
        let store = MemoryBookStore::new();
        let now = OffsetDateTime::now_utc();

        let book = store.insert(new_book("Dune"), now).await.unwrap();
        assert!(!book.is_borrowed);
        assert_eq!(book.created_at, now);
        assert_eq!(book.updated_at, now);
        assert_eq!(store.find(book.id).await.unwrap(), Some(book));
    }

    #[tokio::test]
    async fn transition_requires_matching_state() {
        let store = MemoryBookStore::new();
        let now = OffsetDateTime::now_utc();
        let book = store.insert(new_book("Dune"), now).await.unwrap();

        assert!(store
            .transition(book.id, Transition::Return, now)
            .await
            .unwrap()
            .is_none());

        let later = now + Duration::seconds(5);
        let borrowed = store
            .transition(book.id, Transition::Borrow, later)
            .await
            .unwrap()
            .unwrap();
        assert!(borrowed.is_borrowed);
        assert_eq!(borrowed.updated_at, later);
        assert_eq!(borrowed.created_at, now);
    }

    #[tokio::test]
    async fn updated_at_never_precedes_created_at() {
        let store = MemoryBookStore::new();
        let now = OffsetDateTime::now_utc();
        let book = store.insert(new_book("Dune"), now).await.unwrap();

        let skewed = now - Duration::minutes(1);
        let borrowed = store
            .transition(book.id, Transition::Borrow, skewed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(borrowed.updated_at, borrowed.created_at);
    }

    #[tokio::test]
    async fn transition_on_missing_book_matches_nothing() {
        let store = MemoryBookStore::new();
        let result = store
            .transition(BookId::generate(), Transition::Borrow, OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_filters() {
        let store = MemoryBookStore::new();
        let base = OffsetDateTime::now_utc();

        let oldest = store.insert(new_book("A"), base).await.unwrap();
        let middle = store
            .insert(new_book("B"), base + Duration::seconds(1))
            .await
            .unwrap();
        let newest = store
            .insert(new_book("C"), base + Duration::seconds(2))
            .await
            .unwrap();
        store
            .transition(middle.id, Transition::Borrow, base + Duration::seconds(3))
            .await
            .unwrap();

        let all: Vec<_> = store
            .list(BookFilter::All)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(all, vec![newest.id, middle.id, oldest.id]);

        let available: Vec<_> = store
            .list(BookFilter::Available)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(available, vec![newest.id, oldest.id]);
    }
}
