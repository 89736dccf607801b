pub mod error;
pub mod models;
pub mod routes;
pub mod service;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use axum::Router;
use serde_json::json;
use shelf_kernel::{settings::DatabaseSettings, InitCtx, Module};

use service::BookService;
use store::BookStore;

/// Book catalog: creation, borrow/return and listings.
pub struct BooksModule {
    service: Arc<BookService>,
}

impl BooksModule {
    pub fn new(service: Arc<BookService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.service
            .ensure_indexes()
            .await
            .context("failed to ensure book indexes")?;

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn book_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/BookResponse" }
            }
        }
    })
}

fn id_parameter() -> serde_json::Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "description": "Book id (24 hex characters)",
        "schema": { "type": "string" }
    })
}

fn transition_path(summary: &str, success: &str, conflict: &str) -> serde_json::Value {
    json!({
        "patch": {
            "summary": summary,
            "tags": ["Books"],
            "parameters": [id_parameter()],
            "responses": {
                "200": book_response(success),
                "400": error_response(conflict),
                "404": error_response("Book not found"),
                "500": error_response("Store failure")
            }
        }
    })
}

fn openapi_fragment() -> serde_json::Value {
    let listing = |summary: &str| {
        json!({
            "summary": summary,
            "tags": ["Books"],
            "responses": {
                "200": {
                    "description": summary,
                    "content": {
                        "application/json": {
                            "schema": { "$ref": "#/components/schemas/BooksResponse" }
                        }
                    }
                },
                "500": error_response("Store failure")
            }
        })
    };

    json!({
        "paths": {
            "/": {
                "get": listing("List available books, newest first"),
                "post": {
                    "summary": "Add a book",
                    "tags": ["Books"],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/CreateBook" }
                            }
                        }
                    },
                    "responses": {
                        "201": book_response("Book added"),
                        "400": error_response("Missing or empty title/author"),
                        "500": error_response("Store failure")
                    }
                }
            },
            "/all": {
                "get": listing("List every book, newest first")
            },
            "/borrow/{id}": transition_path(
                "Borrow a book",
                "Book borrowed",
                "Invalid id or book already borrowed"
            ),
            "/return/{id}": transition_path(
                "Return a borrowed book",
                "Book returned",
                "Invalid id or book not currently borrowed"
            ),
            "/health": {
                "get": {
                    "summary": "Books store health check",
                    "tags": ["Books"],
                    "responses": {
                        "200": { "description": "Store reachable" },
                        "503": { "description": "Store unreachable" }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "Unique identifier for the book" },
                        "title": { "type": "string", "description": "Title of the book" },
                        "author": { "type": "string", "description": "Author of the book" },
                        "isBorrowed": { "type": "boolean", "description": "Whether the book is lent out" },
                        "createdAt": { "type": "string", "format": "date-time" },
                        "updatedAt": { "type": "string", "format": "date-time" }
                    },
                    "required": ["id", "title", "author", "isBorrowed", "createdAt", "updatedAt"]
                },
                "CreateBook": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "description": "Title of the book" },
                        "author": { "type": "string", "description": "Author of the book" }
                    },
                    "required": ["title", "author"]
                },
                "BookResponse": {
                    "type": "object",
                    "properties": {
                        "message": { "type": "string" },
                        "book": { "$ref": "#/components/schemas/Book" }
                    },
                    "required": ["message", "book"]
                },
                "BooksResponse": {
                    "type": "object",
                    "properties": {
                        "message": { "type": "string" },
                        "books": {
                            "type": "array",
                            "items": { "$ref": "#/components/schemas/Book" }
                        }
                    },
                    "required": ["message", "books"]
                }
            }
        }
    })
}

/// Create a new instance of the books module on top of `store`
pub fn create_module(store: Arc<dyn BookStore>, database: &DatabaseSettings) -> Arc<dyn Module> {
    let timeout = Duration::from_millis(database.operation_timeout_ms);
    let service = BookService::new(store, timeout);
    Arc::new(BooksModule::new(Arc::new(service)))
}
