//! HTTP-side checks against the book-store API: smoke probes, a CRUD
//! walkthrough, endpoint discovery and resetting data through the API.

pub mod client;
pub mod crud;
pub mod discovery;
pub mod error;
pub mod reset;
pub mod smoke;

pub use client::{entity_id, ApiClient, ApiResponse};
pub use crud::{crud_walkthrough, CrudReport, CrudStep, Outcome};
pub use discovery::{discover, Discovery, Route};
pub use error::{HttpError, HttpResult};
pub use reset::{reset_via_api, ResetReport};
pub use smoke::{smoke_test, ProbeResult, SmokeReport};
