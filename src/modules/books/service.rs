use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use super::error::BookError;
use super::models::{Book, BookFilter, BookId, CreateBook, Transition};
use super::store::{BookStore, StoreError};

/// Source of "now" for timestamps.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// Wall clock truncated to milliseconds, the resolution MongoDB keeps.
pub fn system_clock() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(now)
}

/// Book lifecycle operations. Holds no book state of its own; every call
/// goes to the store and is bounded by the configured timeout.
pub struct BookService {
    store: Arc<dyn BookStore>,
    timeout: Duration,
    clock: Clock,
}

impl BookService {
    pub fn new(store: Arc<dyn BookStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            clock: Arc::new(system_clock),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    async fn bounded<T, F>(&self, action: &'static str, call: F) -> Result<T, BookError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|source| BookError::Store { action, source }),
            Err(_) => Err(BookError::Store {
                action,
                source: StoreError::Timeout(self.timeout),
            }),
        }
    }

    pub async fn create(&self, request: CreateBook) -> Result<Book, BookError> {
        let new_book = request.validate().map_err(BookError::Validation)?;
        let now = (self.clock)();

        let book = self.bounded("add", self.store.insert(new_book, now)).await?;
        tracing::info!(book_id = %book.id, title = %book.title, "book added");
        Ok(book)
    }

    pub async fn borrow(&self, raw_id: &str) -> Result<Book, BookError> {
        self.apply(raw_id, Transition::Borrow).await
    }

    pub async fn return_book(&self, raw_id: &str) -> Result<Book, BookError> {
        self.apply(raw_id, Transition::Return).await
    }

    async fn apply(&self, raw_id: &str, transition: Transition) -> Result<Book, BookError> {
        let id: BookId = raw_id
            .parse()
            .map_err(|_| BookError::InvalidId(raw_id.to_string()))?;
        let action = transition.verb();
        let now = (self.clock)();

        if let Some(book) = self
            .bounded(action, self.store.transition(id, transition, now))
            .await?
        {
            tracing::info!(book_id = %id, action, "book status changed");
            return Ok(book);
        }

        // The conditional update matched nothing; find out why.
        match self.bounded(action, self.store.find(id)).await? {
            None => Err(BookError::NotFound(id)),
            Some(_) => Err(BookError::rejected(transition, id)),
        }
    }

    pub async fn list_available(&self) -> Result<Vec<Book>, BookError> {
        self.bounded("retrieve", self.store.list(BookFilter::Available))
            .await
    }

    pub async fn list_all(&self) -> Result<Vec<Book>, BookError> {
        self.bounded("retrieve", self.store.list(BookFilter::All))
            .await
    }

    pub async fn ensure_indexes(&self) -> Result<(), BookError> {
        self.bounded("index", self.store.ensure_indexes()).await
    }

    pub async fn ping(&self) -> Result<(), BookError> {
        self.bounded("reach", self.store.ping()).await
    }
}
