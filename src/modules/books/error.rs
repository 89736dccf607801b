use serde_json::json;
use shelf_http::error::AppError;
use thiserror::Error;

use super::models::{BookId, FieldError, Transition};
use super::store::StoreError;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("invalid book fields")]
    Validation(Vec<FieldError>),

    #[error("invalid book id '{0}'")]
    InvalidId(String),

    #[error("book {0} not found")]
    NotFound(BookId),

    #[error("book {0} is already borrowed")]
    AlreadyBorrowed(BookId),

    #[error("book {0} is not currently borrowed")]
    NotBorrowed(BookId),

    #[error("failed to {action} book")]
    Store {
        action: &'static str,
        #[source]
        source: StoreError,
    },
}

impl BookError {
    /// The precondition of `transition` did not hold for `id`.
    pub fn rejected(transition: Transition, id: BookId) -> Self {
        match transition {
            Transition::Borrow => BookError::AlreadyBorrowed(id),
            Transition::Return => BookError::NotBorrowed(id),
        }
    }
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::Validation(errors) => AppError::validation(
                errors
                    .into_iter()
                    .map(|e| json!({ "field": e.field, "error": e.error }))
                    .collect(),
                "Title and author are required.",
            ),
            BookError::InvalidId(raw) => AppError::validation(
                vec![json!({ "field": "id", "error": "Invalid book ID", "value": raw })],
                "Invalid book ID.",
            ),
            BookError::NotFound(_) => AppError::not_found("Book not found."),
            BookError::AlreadyBorrowed(_) => AppError::invalid_state("Book is already borrowed."),
            BookError::NotBorrowed(_) => AppError::invalid_state("Book is not currently borrowed."),
            BookError::Store { action, source } => {
                AppError::store(format!("Failed to {action} book."), source)
            }
        }
    }
}
