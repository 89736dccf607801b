//! HTTP handlers for the books module.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use shelf_http::error::{endpoint_not_found, AppError};

use super::models::{Book, CreateBook};
use super::service::BookService;

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub message: &'static str,
    pub book: Book,
}

#[derive(Debug, Serialize)]
pub struct BooksResponse {
    pub message: &'static str,
    pub books: Vec<Book>,
}

pub fn router(service: Arc<BookService>) -> Router {
    Router::new()
        .route("/", get(list_available).post(create_book))
        .route("/all", get(list_all))
        .route("/borrow/{id}", patch(borrow_book))
        .route("/return/{id}", patch(return_book))
        .route("/health", get(health_check))
        .method_not_allowed_fallback(endpoint_not_found)
        .with_state(service)
}

async fn create_book(
    State(service): State<Arc<BookService>>,
    payload: Result<Json<CreateBook>, JsonRejection>,
) -> Result<(StatusCode, Json<BookResponse>), AppError> {
    let Json(request) = payload.map_err(|rejection| {
        AppError::validation(
            vec![json!({ "field": "body", "error": rejection.body_text() })],
            "Title and author are required.",
        )
    })?;

    let book = service.create(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(BookResponse {
            message: "Book added successfully.",
            book,
        }),
    ))
}

async fn borrow_book(
    State(service): State<Arc<BookService>>,
    Path(id): Path<String>,
) -> Result<Json<BookResponse>, AppError> {
    let book = service.borrow(&id).await?;
    Ok(Json(BookResponse {
        message: "Book borrowed successfully.",
        book,
    }))
}

async fn return_book(
    State(service): State<Arc<BookService>>,
    Path(id): Path<String>,
) -> Result<Json<BookResponse>, AppError> {
    let book = service.return_book(&id).await?;
    Ok(Json(BookResponse {
        message: "Book returned successfully.",
        book,
    }))
}

async fn list_available(
    State(service): State<Arc<BookService>>,
) -> Result<Json<BooksResponse>, AppError> {
    let books = service.list_available().await?;
    Ok(Json(BooksResponse {
        message: "Available books retrieved successfully.",
        books,
    }))
}

async fn list_all(
    State(service): State<Arc<BookService>>,
) -> Result<Json<BooksResponse>, AppError> {
    let books = service.list_all().await?;
    Ok(Json(BooksResponse {
        message: "All books retrieved successfully.",
        books,
    }))
}

/// Reports whether the store answers
async fn health_check(State(service): State<Arc<BookService>>) -> (StatusCode, &'static str) {
    match service.ping().await {
        Ok(()) => (StatusCode::OK, "books module is healthy"),
        Err(err) => {
            tracing::warn!(error = %err, "books store unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "books store unreachable")
        }
    }
}
