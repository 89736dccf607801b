use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use shelf_kernel::{
    settings::{Settings, StoreBackend},
    ModuleRegistry,
};
use tower::ServiceExt;

async fn app() -> Router {
    let mut settings = Settings::default();
    settings.database.backend = StoreBackend::Memory;
    settings.server.static_dir = None;
    settings.server.rate_limit.enabled = false;

    let registry: ModuleRegistry = shelf_app::boot(&settings).await.unwrap();
    shelf_http::build_router(&registry, &settings).unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn add_book(app: &Router, title: &str, author: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/books",
        Some(json!({ "title": title, "author": author })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["book"].clone()
}

#[tokio::test]
async fn borrow_return_scenario() {
    let app = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/books",
        Some(json!({ "title": "Dune", "author": "Herbert" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Book added successfully.");
    assert_eq!(body["book"]["isBorrowed"], false);
    let id = body["book"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::PATCH, &format!("/books/borrow/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book borrowed successfully.");
    assert_eq!(body["book"]["isBorrowed"], true);

    let (status, body) = send(&app, Method::PATCH, &format!("/books/borrow/{id}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_state");
    assert_eq!(body["message"], "Book is already borrowed.");

    let (status, body) = send(&app, Method::PATCH, &format!("/books/return/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"]["isBorrowed"], false);

    let (status, body) = send(&app, Method::GET, "/books", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Available books retrieved successfully.");
    let ids: Vec<_> = body["books"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_str().unwrap().to_string())
        .collect();
    assert!(ids.contains(&id));
}

#[tokio::test]
async fn return_of_available_book_is_invalid_state() {
    let app = app().await;
    let book = add_book(&app, "Emma", "Austen").await;
    let id = book["id"].as_str().unwrap();

    let (status, body) = send(&app, Method::PATCH, &format!("/books/return/{id}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Book is not currently borrowed.");
}

#[tokio::test]
async fn unknown_book_is_404() {
    let app = app().await;
    let missing = "64b7f0c2a1b2c3d4e5f60718";

    let (status, body) = send(&app, Method::PATCH, &format!("/books/borrow/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Book not found.");

    let (status, _) = send(&app, Method::PATCH, &format!("/books/return/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_id_is_400() {
    let app = app().await;
    let (status, body) = send(&app, Method::PATCH, "/books/borrow/nonexistent-id", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["message"], "Invalid book ID.");
}

#[tokio::test]
async fn empty_title_is_rejected_and_not_persisted() {
    let app = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/books",
        Some(json!({ "title": "", "author": "Herbert" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "title");

    let (_, body) = send(&app, Method::GET, "/books/all", None).await;
    assert!(body["books"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn missing_or_mistyped_fields_are_400() {
    let app = app().await;

    let (status, body) = send(&app, Method::POST, "/books", Some(json!({ "title": "Dune" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "author");

    let (status, _) = send(
        &app,
        Method::POST,
        "/books",
        Some(json!({ "title": 42, "author": "Herbert" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn titles_are_trimmed() {
    let app = app().await;
    let book = add_book(&app, "  Dune  ", " Herbert ").await;
    assert_eq!(book["title"], "Dune");
    assert_eq!(book["author"], "Herbert");
    assert_eq!(book["createdAt"], book["updatedAt"]);
}

#[tokio::test]
async fn list_all_includes_borrowed_and_orders_newest_first() {
    let app = app().await;
    let first = add_book(&app, "A", "X").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = add_book(&app, "B", "Y").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let third = add_book(&app, "C", "Z").await;

    let second_id = second["id"].as_str().unwrap();
    send(&app, Method::PATCH, &format!("/books/borrow/{second_id}"), None).await;

    let (_, all) = send(&app, Method::GET, "/books/all", None).await;
    let (_, available) = send(&app, Method::GET, "/books", None).await;

    let ids = |v: &Value| -> Vec<String> {
        v["books"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["id"].as_str().unwrap().to_string())
            .collect()
    };

    assert_eq!(
        ids(&all),
        vec![
            third["id"].as_str().unwrap().to_string(),
            second_id.to_string(),
            first["id"].as_str().unwrap().to_string(),
        ]
    );
    assert_eq!(ids(&available).len(), 2);
    assert!(!ids(&available).contains(&second_id.to_string()));
}

#[tokio::test]
async fn unmatched_route_is_json_404() {
    let app = app().await;
    let (status, body) = send(&app, Method::DELETE, "/books/everything", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Endpoint not found.");
}

#[tokio::test]
async fn module_health_reports_store() {
    let app = app().await;
    let (status, _) = send(&app, Method::GET, "/books/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn wrong_method_on_known_path_is_json_404() {
    let app = app().await;
    let book = add_book(&app, "Dune", "Herbert").await;
    let id = book["id"].as_str().unwrap();

    for (method, uri) in [
        (Method::PUT, format!("/books/borrow/{id}")),
        (Method::GET, format!("/books/borrow/{id}")),
        (Method::DELETE, "/books".to_string()),
    ] {
        let (status, body) = send(&app, method.clone(), &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        assert_eq!(body["message"], "Endpoint not found.", "{method} {uri}");
    }

    let (_, body) = send(&app, Method::GET, "/books", None).await;
    assert_eq!(body["books"][0]["isBorrowed"], false);
}
