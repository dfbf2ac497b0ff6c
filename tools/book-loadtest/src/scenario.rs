//! The per-iteration workflow a virtual user runs against the catalog.
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::book::{self, BookRequest};
use crate::client::{CatalogClient, CatalogRequest};
use crate::report::{ErrorCategory, ErrorRecord};

const OK: &[u16] = &[200];
/// the id may have been deleted by another virtual user, or never created
const OK_OR_MISSING: &[u16] = &[200, 404];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    CreateBook,
    ListBooks,
    GetBook,
    UpdateBook,
    ListIds,
    ListTitles,
    ListAvailable,
    ListRecent,
    Recommendations,
    SearchTitle,
    SearchAuthor,
    SearchCategory,
    LookupIds,
    DeleteBook,
}

const BASE_STEPS: &[Step] = &[
    Step::CreateBook,
    Step::ListBooks,
    Step::GetBook,
    Step::UpdateBook,
    Step::ListIds,
    Step::ListTitles,
    Step::ListAvailable,
    Step::ListRecent,
    Step::Recommendations,
    Step::DeleteBook,
];

const EXTENDED_STEPS: &[Step] = &[
    Step::CreateBook,
    Step::ListBooks,
    Step::GetBook,
    Step::UpdateBook,
    Step::ListIds,
    Step::ListTitles,
    Step::ListAvailable,
    Step::ListRecent,
    Step::Recommendations,
    Step::SearchTitle,
    Step::SearchAuthor,
    Step::SearchCategory,
    Step::LookupIds,
    Step::DeleteBook,
];

/// Steps of one iteration in execution order. Searches run after the update
/// and before the delete so the book they look for still exists.
pub fn steps(extended: bool) -> &'static [Step] {
    if extended { EXTENDED_STEPS } else { BASE_STEPS }
}

impl Step {
    /// Name of the check recorded for this step.
    pub const fn check_name(self) -> &'static str {
        match self {
            Self::CreateBook => "book created",
            Self::ListBooks => "retrieved all books",
            Self::GetBook => "retrieved book by ID",
            Self::UpdateBook => "book updated",
            Self::ListIds => "Get all book ids",
            Self::ListTitles => "Get all book names",
            Self::ListAvailable => "Get available books",
            Self::ListRecent => "Get recent books",
            Self::Recommendations => "Get Recommendations",
            Self::SearchTitle => "search by title",
            Self::SearchAuthor => "search by author",
            Self::SearchCategory => "search by category",
            Self::LookupIds => "lookup by ids",
            Self::DeleteBook => "book deleted",
        }
    }

    pub const fn accepted(self) -> &'static [u16] {
        match self {
            Self::GetBook
            | Self::SearchTitle
            | Self::SearchAuthor
            | Self::SearchCategory
            | Self::LookupIds => OK_OR_MISSING,
            _ => OK,
        }
    }

    pub fn accepts(self, status: u16) -> bool {
        self.accepted().contains(&status)
    }

    pub fn request(self, id: u32) -> CatalogRequest {
        match self {
            Self::CreateBook => {
                CatalogRequest::new(Method::POST, "/books/").json(BookRequest::create(id))
            }
            Self::ListBooks => CatalogRequest::new(Method::GET, "/books/all"),
            Self::GetBook => CatalogRequest::new(Method::GET, format!("/books/{id}")),
            Self::UpdateBook => CatalogRequest::new(Method::PUT, format!("/books/{id}"))
                .json(BookRequest::update(id)),
            Self::ListIds => CatalogRequest::new(Method::GET, "/books/ids"),
            Self::ListTitles => CatalogRequest::new(Method::GET, "/books/books"),
            Self::ListAvailable => CatalogRequest::new(Method::GET, "/books/available"),
            Self::ListRecent => CatalogRequest::new(Method::GET, "/books/recent"),
            Self::Recommendations => CatalogRequest::new(Method::GET, "/favo"),
            Self::SearchTitle => CatalogRequest::new(Method::GET, "/books/title/")
                .query("title", book::updated_title(id)),
            Self::SearchAuthor => CatalogRequest::new(Method::GET, "/books/author/")
                .query("author", book::updated_author(id)),
            Self::SearchCategory => CatalogRequest::new(Method::GET, "/books/category/")
                .query("category", book::CATEGORY),
            Self::LookupIds => {
                CatalogRequest::new(Method::GET, "/books/").query("book_ids", id.to_string())
            }
            Self::DeleteBook => CatalogRequest::new(Method::DELETE, format!("/books/{id}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: Step,
    pub passed: bool,
    pub status: Option<u16>,
    pub latency_ms: Option<u128>,
    pub error: Option<ErrorRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationResult {
    pub book_id: u32,
    pub steps: Vec<StepResult>,
}

impl IterationResult {
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|step| step.passed)
    }
}

/// Run every step once, in order. A failed check or a transport error is
/// recorded on its step and the next step runs anyway.
pub async fn run_iteration(client: &CatalogClient, steps: &[Step], id: u32) -> IterationResult {
    let mut results = Vec::with_capacity(steps.len());
    run_steps(client, steps, id, &mut results).await;
    IterationResult {
        book_id: id,
        steps: results,
    }
}

/// Like [`run_iteration`], but each finished step lands in `done` as soon as
/// it completes, so a caller that drops this future still sees them.
pub async fn run_steps(
    client: &CatalogClient,
    steps: &[Step],
    id: u32,
    done: &mut Vec<StepResult>,
) {
    for &step in steps {
        let result = run_step(client, step, id).await;
        done.push(result);
    }
}

async fn run_step(client: &CatalogClient, step: Step, id: u32) -> StepResult {
    match client.send(&step.request(id)).await {
        Ok(response) => {
            let passed = step.accepts(response.status);
            trace!(?step, id, status = response.status, passed, "check");
            StepResult {
                step,
                passed,
                status: Some(response.status),
                latency_ms: Some(response.latency_ms),
                error: (!passed).then(|| ErrorRecord {
                    category: ErrorCategory::UnexpectedStatus,
                    step,
                    message: format!(
                        "expected status in {:?}, got {}",
                        step.accepted(),
                        response.status
                    ),
                }),
            }
        }
        Err(err) => {
            warn!(?step, id, %err, "request failed");
            StepResult {
                step,
                passed: false,
                status: None,
                latency_ms: None,
                error: Some(ErrorRecord {
                    category: err.category(),
                    step,
                    message: err.to_string(),
                }),
            }
        }
    }
}
