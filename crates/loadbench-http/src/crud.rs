//! Create / read / update / delete walkthrough for Authors and Books.

use crate::client::{entity_id, ApiClient};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail")]
pub enum Outcome {
    Pass,
    /// Unexpected status code.
    Fail(u16),
    /// Transport or decoding error.
    Error(String),
    /// A prerequisite step did not yield an id.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrudStep {
    pub resource: String,
    pub operation: String,
    pub method: String,
    pub path: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CrudReport {
    pub steps: Vec<CrudStep>,
}

impl CrudReport {
    pub fn passed(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome == Outcome::Pass).count()
    }

    /// Steps that actually ran.
    pub fn attempted(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome != Outcome::Skipped).count()
    }

    pub fn success_rate(&self) -> f64 {
        match self.attempted() {
            0 => 0.0,
            n => self.passed() as f64 / n as f64 * 100.0,
        }
    }
}

/// Eight random ASCII letters.
pub fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .filter(char::is_ascii_alphabetic)
        .take(8)
        .collect()
}

struct Walk<'a> {
    client: &'a ApiClient,
    report: CrudReport,
}

impl Walk<'_> {
    fn record(&mut self, resource: &str, operation: &str, method: &str, path: &str, outcome: Outcome) {
        match &outcome {
            Outcome::Pass => info!("PASS {resource} {operation}: {method} {path}"),
            Outcome::Fail(code) => warn!("FAIL {resource} {operation}: {method} {path} returned {code}"),
            Outcome::Error(err) => warn!("ERROR {resource} {operation}: {method} {path}: {err}"),
            Outcome::Skipped => info!("SKIP {resource} {operation}: no id available"),
        }
        self.report.steps.push(CrudStep {
            resource: resource.to_string(),
            operation: operation.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            outcome,
        });
    }

    /// Issue one request and record it; returns the created id for POSTs.
    async fn step(
        &mut self,
        resource: &str,
        operation: &str,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
        expected: &[u16],
    ) -> Option<i64> {
        let result = self.client.request(method.clone(), path, body.as_ref()).await;
        let (outcome, id) = match result {
            Ok(response) => {
                let status = response.status.as_u16();
                if expected.contains(&status) {
                    let id = response.json().ok().as_ref().and_then(entity_id);
                    (Outcome::Pass, id)
                } else {
                    (Outcome::Fail(status), None)
                }
            }
            Err(err) => (Outcome::Error(err.to_string()), None),
        };
        self.record(resource, operation, method.as_str(), path, outcome);
        id
    }

    fn skip(&mut self, resource: &str, operation: &str, method: &str, path: &str) {
        self.record(resource, operation, method, path, Outcome::Skipped);
    }

    /// Read, update and delete `{collection}/{id}`, or skip all three without an id.
    async fn item_steps(
        &mut self,
        resource: &str,
        collection: &str,
        id: Option<i64>,
        update: impl FnOnce(i64) -> serde_json::Value,
    ) {
        let Some(id) = id else {
            let path = format!("{collection}/{{id}}");
            self.skip(resource, "get", "GET", &path);
            self.skip(resource, "update", "PUT", &path);
            self.skip(resource, "delete", "DELETE", &path);
            return;
        };
        let path = format!("{collection}/{id}");
        self.step(resource, "get", reqwest::Method::GET, &path, None, &[200]).await;
        self.step(resource, "update", reqwest::Method::PUT, &path, Some(update(id)), &[200, 204])
            .await;
        self.step(resource, "delete", reqwest::Method::DELETE, &path, None, &[200, 204])
            .await;
    }
}

pub async fn crud_walkthrough(client: &ApiClient) -> CrudReport {
    let mut walk = Walk {
        client,
        report: CrudReport::default(),
    };

    let authors = client.resource_path("Authors");
    let suffix = random_suffix();
    walk.step("Authors", "list", reqwest::Method::GET, &authors, None, &[200]).await;
    let author_id = walk
        .step(
            "Authors",
            "create",
            reqwest::Method::POST,
            &authors,
            Some(json!({ "Name": format!("TestAuthor_{suffix}") })),
            &[201],
        )
        .await;
    walk.item_steps("Authors", &authors, author_id, |id| {
        json!({ "Id": id, "Name": format!("UpdatedAuthor_{suffix}") })
    })
    .await;

    // Books need an author to point at; fall back to id 1 when creation fails.
    let setup_author = match client
        .post(&authors, &json!({ "Name": format!("BookTestAuthor_{}", random_suffix()) }))
        .await
    {
        Ok(response) if response.status.as_u16() == 201 => {
            response.json().ok().as_ref().and_then(entity_id).unwrap_or(1)
        }
        _ => 1,
    };

    let books = client.resource_path("Books");
    let suffix = random_suffix();
    walk.step("Books", "list", reqwest::Method::GET, &books, None, &[200]).await;
    let book_id = walk
        .step(
            "Books",
            "create",
            reqwest::Method::POST,
            &books,
            Some(json!({ "Title": format!("TestBook_{suffix}"), "AuthorId": setup_author })),
            &[201],
        )
        .await;
    walk.item_steps("Books", &books, book_id, |id| {
        json!({ "Id": id, "Title": format!("UpdatedBook_{suffix}"), "AuthorId": setup_author })
    })
    .await;

    let report = walk.report;
    info!(
        "{}/{} CRUD steps passed ({:.1}%)",
        report.passed(),
        report.attempted(),
        report.success_rate()
    );
    report
}
