use serde::{Deserialize, Serialize};

/// Status code the catalog uses for books that can be borrowed.
pub const STATUS_AVAILABLE: &str = "AV";
pub const CATEGORY: &str = "Fiction";

/// JSON body of the create and update calls. Built per request and dropped
/// once the request has been sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRequest {
    pub id: u32,
    pub title: String,
    pub author: String,
    pub publication_year: i32,
    pub status: String,
    pub category: String,
    pub rating: i32,
}

impl BookRequest {
    pub fn create(id: u32) -> Self {
        Self {
            id,
            title: format!("Test Book {id}"),
            author: format!("Test Author {id}"),
            publication_year: 2024,
            status: STATUS_AVAILABLE.to_string(),
            category: CATEGORY.to_string(),
            rating: 8,
        }
    }

    pub fn update(id: u32) -> Self {
        Self {
            id,
            title: updated_title(id),
            author: updated_author(id),
            publication_year: 2025,
            status: STATUS_AVAILABLE.to_string(),
            category: CATEGORY.to_string(),
            rating: 9,
        }
    }
}

pub fn updated_title(id: u32) -> String {
    format!("Updated Test Book {id}")
}

pub fn updated_author(id: u32) -> String {
    format!("Updated Test Author {id}")
}
