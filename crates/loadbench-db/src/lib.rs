//! Database side of loadbench: Postgres access for seeding, purging and
//! inspecting the applications under test.

pub mod bookstore;
pub mod error;
pub mod petclinic;
pub mod pool;
pub mod purge;
pub mod schema;

pub use bookstore::{export_ids, list_ids, Populator, Seeded};
pub use error::{DbError, DbResult};
pub use pool::{connect, server_version};
pub use purge::{purge_all, table_summary, PurgeReport, TableCount};
pub use schema::{deletion_order, ForeignKey, TableInfo};
pub use sqlx::PgPool;
