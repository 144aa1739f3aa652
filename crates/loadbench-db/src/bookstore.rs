//! Book-store test data: seeding `Authors`, `Books` and `Customers`, and
//! exporting the resulting ids as JMeter CSV data sets.
//!
//! Table and column names follow the application's Entity Framework model,
//! so they are PascalCase and always quoted.

use crate::error::DbResult;
use chrono::{Duration, NaiveDateTime, Timelike};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::path::Path;
use tracing::info;

const AUTHOR_FIRST_NAMES: &[&str] = &[
    "John", "Jane", "Michael", "Sarah", "David", "Emma", "Robert", "Lisa", "William", "Mary",
    "James", "Patricia", "Charles", "Jennifer", "Daniel", "Thomas", "Susan", "Joseph", "Nancy",
    "Richard", "Betty", "Christopher",
];
const AUTHOR_LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Taylor", "Thomas",
    "Moore", "Martin", "Lee", "White", "Harris",
];
const TITLE_TEMPLATES: &[&str] = &[
    "The Adventures of {}",
    "Guide to {}",
    "History of {}",
    "Introduction to {}",
    "Mastering {}",
    "The Complete {} Handbook",
    "Essential {} Techniques",
    "Understanding {}",
    "{} for Beginners",
    "Advanced {} Concepts",
    "The {} Chronicles",
    "{} in Modern Times",
];
const TOPICS: &[&str] = &[
    "Programming", "Databases", "Cloud Computing", "AI", "Data Science", "Web Development",
    "Mobile Apps", "Security", "DevOps", "Testing", "Architecture", "Design Patterns",
    "Algorithms", "Networks", "APIs",
];
const GENRES: &[&str] = &[
    "Fiction", "Non-Fiction", "Science", "Technology", "History", "Biography", "Mystery", "Thriller",
];
const CUSTOMER_FIRST_NAMES: &[&str] = &[
    "Alice", "Bob", "Carol", "David", "Eve", "Frank", "Grace", "Henry", "Ivy", "Jack", "Kate",
    "Leo", "Mia", "Noah", "Olivia", "Paul", "Quinn", "Rachel", "Sam", "Tina", "Uma", "Victor",
    "Wendy", "Xavier", "Yara", "Zoe",
];
const CUSTOMER_LAST_NAMES: &[&str] = &[
    "Anderson", "Baker", "Carter", "Davis", "Evans", "Foster", "Green", "Harris", "Irving",
    "Jackson", "King", "Lewis", "Moore", "Nelson", "Owen", "Parker", "Quinn", "Reed", "Scott",
    "Turner", "Underwood", "Vincent",
];
const COUNTRIES: &[&str] = &["USA", "UK", "Canada", "Australia", "Germany", "France", "India", "Japan"];

const CREATE_TITLES: &[&str] = &[
    "The Great Adventure",
    "Mystery Night",
    "Tech Guide",
    "History of Art",
    "Science Today",
    "Travel World",
    "Business Strategy",
    "Health & Wellness",
    "Fantasy Realm",
    "Coding Mastery",
];
const CREATE_GENRES: &[&str] = &[
    "Fiction", "Mystery", "Technology", "History", "Science", "Travel", "Business", "Health",
    "Fantasy", "Technology",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewBook {
    pub title: String,
    pub year: i32,
    pub price: f64,
    pub genre: String,
    pub author_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub country: String,
}

/// Ids created by one [`Populator::populate`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Seeded {
    pub authors: Vec<i64>,
    pub books: Vec<i64>,
    pub customers: Vec<i64>,
}

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

/// Generates uniquely named rows and inserts them.
///
/// Every generated name carries a `[YYYYMMDDHHMMSS.ffffff]` suffix derived from
/// the populator's start time and the row index, so repeated runs never collide.
#[derive(Debug, Clone)]
pub struct Populator {
    count: usize,
    timestamp: NaiveDateTime,
}

impl Populator {
    pub fn new(count: usize, timestamp: NaiveDateTime) -> Self {
        Self { count, timestamp }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Suffix for row `index`: seconds advance by `index`, the fraction by `index` ms.
    pub fn unique_suffix(&self, index: usize) -> String {
        let index = index as i64;
        let stamp = (self.timestamp + Duration::seconds(index)).format("%Y%m%d%H%M%S");
        let micros = (self.timestamp + Duration::milliseconds(index)).nanosecond() / 1_000;
        format!("[{stamp}.{micros:06}]")
    }

    pub fn author_names<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                format!(
                    "{} {} {}",
                    pick(rng, AUTHOR_FIRST_NAMES),
                    pick(rng, AUTHOR_LAST_NAMES),
                    self.unique_suffix(i)
                )
            })
            .collect()
    }

    /// Books spread randomly over `author_ids`; empty when there are no authors.
    pub fn books<R: Rng + ?Sized>(&self, rng: &mut R, author_ids: &[i64], count: usize) -> Vec<NewBook> {
        if author_ids.is_empty() {
            return Vec::new();
        }
        (0..count)
            .map(|i| {
                let title = pick(rng, TITLE_TEMPLATES).replace("{}", pick(rng, TOPICS));
                let suffix = self.unique_suffix(i);
                let price: f64 = rng.gen_range(9.99..=99.99);
                NewBook {
                    title: format!("{title} [TS:{}", &suffix[1..]),
                    year: rng.gen_range(2000..=2026),
                    price: (price * 100.0).round() / 100.0,
                    genre: pick(rng, GENRES).to_string(),
                    author_id: author_ids.choose(rng).copied().unwrap_or_default(),
                }
            })
            .collect()
    }

    pub fn customers<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<NewCustomer> {
        (0..count)
            .map(|i| {
                let first = pick(rng, CUSTOMER_FIRST_NAMES);
                let last = pick(rng, CUSTOMER_LAST_NAMES);
                NewCustomer {
                    first_name: format!("{first} {}", self.unique_suffix(i)),
                    last_name: last.to_string(),
                    email: format!("{}.{}.{i}@customer.com", first.to_lowercase(), last.to_lowercase()),
                    country: pick(rng, COUNTRIES).to_string(),
                }
            })
            .collect()
    }

    /// Insert `count` authors, `2 * count` books and `count` customers in one transaction.
    pub async fn populate(&self, pool: &PgPool) -> DbResult<Seeded> {
        let mut seeded = Seeded::default();
        if self.count == 0 {
            return Ok(seeded);
        }

        let authors = self.author_names(&mut rand::thread_rng(), self.count);
        let mut tx = pool.begin().await?;

        info!("populating Authors with {} records", authors.len());
        for (i, name) in authors.iter().enumerate() {
            let id: i64 = sqlx::query_scalar(r#"INSERT INTO "Authors" ("Name") VALUES ($1) RETURNING "Id"::bigint"#)
                .bind(name)
                .fetch_one(&mut *tx)
                .await?;
            seeded.authors.push(id);
            log_progress("authors", i, authors.len());
        }

        let books = self.books(&mut rand::thread_rng(), &seeded.authors, self.count * 2);
        info!("populating Books with {} records", books.len());
        for (i, book) in books.iter().enumerate() {
            let id: i64 = sqlx::query_scalar(
                r#"INSERT INTO "Books" ("Title", "Year", "Price", "Genre", "AuthorId")
                   VALUES ($1, $2, $3, $4, $5) RETURNING "Id"::bigint"#,
            )
            .bind(&book.title)
            .bind(book.year)
            .bind(book.price)
            .bind(&book.genre)
            .bind(book.author_id)
            .fetch_one(&mut *tx)
            .await?;
            seeded.books.push(id);
            log_progress("books", i, books.len());
        }

        let customers = self.customers(&mut rand::thread_rng(), self.count);
        info!("populating Customers with {} records", customers.len());
        for (i, customer) in customers.iter().enumerate() {
            let id: i64 = sqlx::query_scalar(
                r#"INSERT INTO "Customers" ("FirstName", "LastName", "Email", "Country")
                   VALUES ($1, $2, $3, $4) RETURNING "Id"::bigint"#,
            )
            .bind(&customer.first_name)
            .bind(&customer.last_name)
            .bind(&customer.email)
            .bind(&customer.country)
            .fetch_one(&mut *tx)
            .await?;
            seeded.customers.push(id);
            log_progress("customers", i, customers.len());
        }

        tx.commit().await?;
        info!(
            authors = seeded.authors.len(),
            books = seeded.books.len(),
            customers = seeded.customers.len(),
            "database populated"
        );
        Ok(seeded)
    }
}

fn log_progress(what: &str, index: usize, total: usize) {
    if (index + 1) % 10 == 0 || index + 1 == total {
        info!("  created {}/{total} {what}", index + 1);
    }
}

/// One row of `book_create_data.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookCreateRow {
    pub title: &'static str,
    pub year: i32,
    pub price: String,
    pub genre: &'static str,
    pub author_id: i64,
}

/// Deterministic create payloads, one per author.
pub fn book_create_rows(author_ids: &[i64]) -> Vec<BookCreateRow> {
    author_ids
        .iter()
        .enumerate()
        .map(|(i, id)| BookCreateRow {
            title: CREATE_TITLES[i % CREATE_TITLES.len()],
            year: 2018 + (i % 5) as i32,
            price: format!("{:.2}", 24.99 + (i as f64) * 5.0),
            genre: CREATE_GENRES[i % CREATE_GENRES.len()],
            author_id: *id,
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub authors: usize,
    pub books: usize,
    pub create_rows: usize,
    pub delete_authors: usize,
    pub delete_books: usize,
}

fn write_ids(path: &Path, header: &str, ids: &[i64]) -> DbResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([header])?;
    for id in ids {
        writer.write_record([id.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

async fn ids(pool: &PgPool, sql: &str) -> DbResult<Vec<i64>> {
    Ok(sqlx::query_scalar(sql).fetch_all(pool).await?)
}

/// Write the id data sets the book-store JMeter plans read.
///
/// Delete sets take the newest rows: 5 authors and 10 books, highest id first.
pub async fn export_ids(pool: &PgPool, out_dir: &Path) -> DbResult<ExportSummary> {
    std::fs::create_dir_all(out_dir)?;

    let authors = ids(pool, r#"SELECT "Id"::bigint FROM "Authors" ORDER BY "Id""#).await?;
    write_ids(&out_dir.join("author_ids.csv"), "author_id", &authors)?;
    info!("exported {} author ids", authors.len());

    let books = ids(pool, r#"SELECT "Id"::bigint FROM "Books" ORDER BY "Id""#).await?;
    write_ids(&out_dir.join("book_ids.csv"), "book_id", &books)?;
    info!("exported {} book ids", books.len());

    let rows = book_create_rows(&authors);
    let mut writer = csv::Writer::from_path(out_dir.join("book_create_data.csv"))?;
    for row in &rows {
        writer.serialize(row)?;
    }
    if rows.is_empty() {
        writer.write_record(["title", "year", "price", "genre", "author_id"])?;
    }
    writer.flush()?;
    info!("exported {} rows to book_create_data.csv", rows.len());

    let delete_authors = ids(pool, r#"SELECT "Id"::bigint FROM "Authors" ORDER BY "Id" DESC LIMIT 5"#).await?;
    write_ids(&out_dir.join("delete_author_ids.csv"), "author_id", &delete_authors)?;
    let delete_books = ids(pool, r#"SELECT "Id"::bigint FROM "Books" ORDER BY "Id" DESC LIMIT 10"#).await?;
    write_ids(&out_dir.join("delete_book_ids.csv"), "book_id", &delete_books)?;

    Ok(ExportSummary {
        authors: authors.len(),
        books: books.len(),
        create_rows: rows.len(),
        delete_authors: delete_authors.len(),
        delete_books: delete_books.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct AuthorRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct BookRow {
    pub id: i64,
    pub title: String,
    pub author_id: Option<i64>,
}

/// Every author and book, ordered by id.
pub async fn list_ids(pool: &PgPool) -> DbResult<(Vec<AuthorRow>, Vec<BookRow>)> {
    let authors = sqlx::query_as(r#"SELECT "Id"::bigint AS id, "Name" AS name FROM "Authors" ORDER BY "Id""#)
        .fetch_all(pool)
        .await?;
    let books = sqlx::query_as(
        r#"SELECT "Id"::bigint AS id, "Title" AS title, "AuthorId"::bigint AS author_id
             FROM "Books" ORDER BY "Id""#,
    )
    .fetch_all(pool)
    .await?;
    Ok((authors, books))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn populator(count: usize) -> Populator {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_micro_opt(10, 30, 0, 250_000)
            .unwrap();
        Populator::new(count, ts)
    }

    #[test]
    fn test_unique_suffix() {
        let p = populator(3);
        assert_eq!(p.unique_suffix(0), "[20250115103000.250000]");
        assert_eq!(p.unique_suffix(2), "[20250115103002.252000]");
        assert_eq!(p.unique_suffix(800), "[20250115104320.050000]");
    }

    #[test]
    fn test_generated_rows_are_unique_and_in_range() {
        let p = populator(5);
        let mut rng = StdRng::seed_from_u64(7);

        let names = p.author_names(&mut rng, 5);
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), 5);
        assert!(names[0].ends_with("[20250115103000.250000]"));

        let books = p.books(&mut rng, &[11, 12], 10);
        assert_eq!(books.len(), 10);
        for book in &books {
            assert!((2000..=2026).contains(&book.year));
            assert!((9.99..=99.99).contains(&book.price));
            assert!([11, 12].contains(&book.author_id));
            assert!(book.title.contains("[TS:2025"));
            assert!(GENRES.contains(&book.genre.as_str()));
        }
        assert!(p.books(&mut rng, &[], 4).is_empty());

        let customers = p.customers(&mut rng, 3);
        assert!(customers[2].email.ends_with(".2@customer.com"));
        assert!(customers[0].first_name.contains('['));
    }

    #[test]
    fn test_book_create_rows_rotate() {
        let rows = book_create_rows(&[5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);
        assert_eq!(rows[0].title, "The Great Adventure");
        assert_eq!(rows[0].price, "24.99");
        assert_eq!(rows[0].year, 2018);
        assert_eq!(rows[6].year, 2019);
        assert_eq!(rows[2].price, "34.99");
        assert_eq!(rows[9].genre, "Technology");
        assert_eq!(rows[10].title, "The Great Adventure");
        assert_eq!(rows[10].author_id, 15);
    }

    #[test]
    fn test_write_ids() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("author_ids.csv");
        write_ids(&path, "author_id", &[3, 1, 2]).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "author_id\n3\n1\n2\n");
    }
}
