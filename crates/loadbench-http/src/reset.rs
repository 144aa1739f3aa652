//! Reset the book-store to a small known data set through its own REST API.

use crate::client::{entity_id, ApiClient};
use crate::error::{HttpError, HttpResult};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

pub const SAMPLE_AUTHORS: &[&str] = &[
    "J.K. Rowling",
    "George R.R. Martin",
    "Stephen King",
    "Agatha Christie",
    "Isaac Asimov",
];

/// Title, year, price, genre and index into the created authors.
pub const SAMPLE_BOOKS: &[(&str, i32, f64, &str, usize)] = &[
    ("Harry Potter and the Philosopher's Stone", 1997, 29.99, "Fantasy", 0),
    ("A Game of Thrones", 1996, 34.99, "Fantasy", 1),
    ("The Shining", 1977, 24.99, "Horror", 2),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub books_deleted: usize,
    pub authors_deleted: usize,
    pub authors_created: Vec<i64>,
    pub books_created: Vec<i64>,
    pub warnings: Vec<String>,
}

impl ResetReport {
    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

/// Delete every book then every author, and seed the sample data.
///
/// Fails only when the API does not answer the author list with 200;
/// individual request failures become warnings.
pub async fn reset_via_api(client: &ApiClient) -> HttpResult<ResetReport> {
    let authors = client.resource_path("Authors");
    let books = client.resource_path("Books");

    let status = client.get(&authors).await.map(|r| r.status.as_u16()).ok();
    if status != Some(200) {
        return Err(HttpError::Unavailable {
            url: client.url(&authors),
        });
    }

    let mut report = ResetReport::default();
    let books_deleted = delete_all(client, &books, &mut report).await;
    let authors_deleted = delete_all(client, &authors, &mut report).await;
    report.books_deleted = books_deleted;
    report.authors_deleted = authors_deleted;
    info!(
        "deleted {} books and {} authors",
        report.books_deleted, report.authors_deleted
    );

    for name in SAMPLE_AUTHORS {
        match client.post(&authors, &json!({ "Name": name })).await {
            Ok(response) if response.status.is_success() => {
                match response.json().ok().as_ref().and_then(entity_id) {
                    Some(id) => report.authors_created.push(id),
                    None => report.warn(format!("author {name} created without an id")),
                }
            }
            Ok(response) => report.warn(format!("could not create author {name}: {}", response.status)),
            Err(err) => report.warn(format!("could not create author {name}: {err}")),
        }
    }

    if report.authors_created.len() < 3 {
        report.warn(format!(
            "only {} authors created, skipping books",
            report.authors_created.len()
        ));
        return Ok(report);
    }

    for (title, year, price, genre, author) in SAMPLE_BOOKS {
        let body = json!({
            "title": title,
            "year": year,
            "price": price,
            "genre": genre,
            "authorId": report.authors_created[*author],
        });
        match client.post(&books, &body).await {
            Ok(response) if response.status.is_success() => {
                if let Some(id) = response.json().ok().as_ref().and_then(entity_id) {
                    report.books_created.push(id);
                }
            }
            Ok(response) => report.warn(format!("could not create book {title}: {}", response.status)),
            Err(err) => report.warn(format!("could not create book {title}: {err}")),
        }
    }

    info!(
        "created {} authors and {} books",
        report.authors_created.len(),
        report.books_created.len()
    );
    Ok(report)
}

async fn delete_all(client: &ApiClient, collection: &str, report: &mut ResetReport) -> usize {
    let items = match client.list(collection).await {
        Ok((_, items)) => items,
        Err(err) => {
            report.warn(format!("could not list {collection}: {err}"));
            return 0;
        }
    };

    let mut deleted = 0;
    for id in items.iter().filter_map(entity_id) {
        let path = format!("{collection}/{id}");
        match client.delete(&path).await {
            Ok(response) if response.status.is_success() => deleted += 1,
            Ok(response) => report.warn(format!("could not delete {path}: {}", response.status)),
            Err(err) => report.warn(format!("could not delete {path}: {err}")),
        }
    }
    deleted
}
