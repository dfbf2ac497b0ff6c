//! In-process stand-in for the book catalog API, enough of it for the load
//! driver to talk to.
#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use book_loadtest::book::BookRequest;
use serde_json::json;
use tokio::{net::TcpListener, task::JoinHandle};

#[derive(Debug, Clone, Default)]
pub struct StubOptions {
    /// answer `/favo` with 500
    pub fail_recommendations: bool,
    /// hold `/books/all` responses for this long
    pub list_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct Catalog {
    books: BTreeMap<u32, BookRequest>,
    hits: HashMap<&'static str, usize>,
}

#[derive(Debug, Clone)]
struct Shared {
    catalog: Arc<Mutex<Catalog>>,
    options: StubOptions,
}

impl Shared {
    fn hit(&self, route: &'static str) -> std::sync::MutexGuard<'_, Catalog> {
        let mut catalog = self.catalog.lock().unwrap();
        *catalog.hits.entry(route).or_default() += 1;
        catalog
    }
}

#[derive(Debug)]
pub struct StubCatalog {
    pub addr: SocketAddr,
    catalog: Arc<Mutex<Catalog>>,
    task: JoinHandle<()>,
}

impl Drop for StubCatalog {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl StubCatalog {
    pub async fn spawn() -> Self {
        Self::spawn_with(StubOptions::default()).await
    }

    pub async fn spawn_with(options: StubOptions) -> Self {
        let catalog = Arc::new(Mutex::new(Catalog::default()));
        let state = Shared {
            catalog: Arc::clone(&catalog),
            options,
        };

        let app = Router::new()
            .route("/books/", post(create_book).get(lookup_ids))
            .route("/books/all", get(list_books))
            .route("/books/ids", get(list_ids))
            .route("/books/books", get(list_titles))
            .route("/books/available", get(list_available))
            .route("/books/recent", get(list_recent))
            .route("/books/title/", get(search_title))
            .route("/books/author/", get(search_author))
            .route("/books/category/", get(search_category))
            .route(
                "/books/:id",
                get(get_book).put(update_book).delete(delete_book),
            )
            .route("/favo", get(recommendations))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            catalog,
            task,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self, route: &str) -> usize {
        self.catalog
            .lock()
            .unwrap()
            .hits
            .get(route)
            .copied()
            .unwrap_or(0)
    }

    pub fn book(&self, id: u32) -> Option<BookRequest> {
        self.catalog.lock().unwrap().books.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.catalog.lock().unwrap().books.len()
    }
}

fn not_found(detail: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
}

async fn create_book(State(state): State<Shared>, Json(book): Json<BookRequest>) -> Response {
    let mut catalog = state.hit("create");
    catalog.books.insert(book.id, book);
    Json(json!({ "message": "Book added successfully." })).into_response()
}

async fn list_books(State(state): State<Shared>) -> Response {
    if let Some(delay) = state.options.list_delay {
        tokio::time::sleep(delay).await;
    }
    let catalog = state.hit("list_all");
    if catalog.books.is_empty() {
        return Json(json!({ "message": "No books found." })).into_response();
    }
    let books = catalog.books.values().cloned().collect::<Vec<_>>();
    Json(json!({ "books": books })).into_response()
}

async fn list_ids(State(state): State<Shared>) -> Response {
    let catalog = state.hit("ids");
    Json(catalog.books.keys().copied().collect::<Vec<_>>()).into_response()
}

async fn list_titles(State(state): State<Shared>) -> Response {
    let catalog = state.hit("titles");
    let titles = catalog
        .books
        .values()
        .map(|book| book.title.clone())
        .collect::<Vec<_>>();
    Json(titles).into_response()
}

async fn list_available(State(state): State<Shared>) -> Response {
    let catalog = state.hit("available");
    let books = catalog
        .books
        .values()
        .filter(|book| book.status == "AV")
        .cloned()
        .collect::<Vec<_>>();
    Json(json!({ "available_books": books })).into_response()
}

async fn list_recent(State(state): State<Shared>) -> Response {
    let catalog = state.hit("recent");
    let books = catalog
        .books
        .values()
        .filter(|book| book.publication_year >= 2024)
        .cloned()
        .collect::<Vec<_>>();
    Json(books).into_response()
}

async fn recommendations(State(state): State<Shared>) -> Response {
    let catalog = state.hit("favo");
    if state.options.fail_recommendations {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let books = catalog
        .books
        .values()
        .filter(|book| book.rating >= 8)
        .cloned()
        .collect::<Vec<_>>();
    Json(books).into_response()
}

async fn get_book(State(state): State<Shared>, Path(id): Path<u32>) -> Response {
    let catalog = state.hit("get");
    match catalog.books.get(&id) {
        Some(book) => Json(book.clone()).into_response(),
        None => not_found("Book not found."),
    }
}

async fn update_book(
    State(state): State<Shared>,
    Path(id): Path<u32>,
    Json(book): Json<BookRequest>,
) -> Response {
    let mut catalog = state.hit("update");
    match catalog.books.get_mut(&id) {
        Some(existing) => {
            *existing = book;
            Json(json!({ "message": "Book updated successfully." })).into_response()
        }
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "No book found with the given ID." })),
        )
            .into_response(),
    }
}

async fn delete_book(State(state): State<Shared>, Path(id): Path<u32>) -> Response {
    let mut catalog = state.hit("delete");
    match catalog.books.remove(&id) {
        Some(_) => Json(json!({ "message": "Book deleted successfully." })).into_response(),
        None => not_found("Book not found."),
    }
}

fn search(
    state: &Shared,
    route: &'static str,
    matches: impl Fn(&BookRequest) -> bool,
) -> Response {
    let catalog = state.hit(route);
    let books = catalog
        .books
        .values()
        .filter(|book| matches(*book))
        .cloned()
        .collect::<Vec<_>>();
    if books.is_empty() {
        return not_found("No books found.");
    }
    Json(books).into_response()
}

async fn search_title(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let title = params.get("title").cloned().unwrap_or_default();
    search(&state, "title", |book| book.title == title)
}

async fn search_author(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let author = params.get("author").cloned().unwrap_or_default();
    search(&state, "author", |book| book.author == author)
}

async fn search_category(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let category = params.get("category").cloned().unwrap_or_default();
    search(&state, "category", |book| book.category == category)
}

async fn lookup_ids(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let ids = params
        .get("book_ids")
        .map(|raw| {
            raw.split(',')
                .filter_map(|id| id.trim().parse::<u32>().ok())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    search(&state, "lookup", |book| ids.contains(&book.id))
}
