//! Pet-clinic test data: JMeter CSV refresh, consistency checks and
//! pre-run constraint validation.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const MULTI_PET_OWNERS_CSV: &str = "multi_pet_owner_ids.csv";
pub const COMMON_LAST_NAMES_CSV: &str = "common_last_names.csv";

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct MultiPetOwner {
    pub id: i64,
    pub last_name: String,
    pub pets: i64,
    pub visits: i64,
}

impl MultiPetOwner {
    /// Row written when no owner qualifies, so the plan still has data to read.
    pub fn placeholder() -> Self {
        Self {
            id: 0,
            last_name: "NoOwner".to_string(),
            pets: 0,
            visits: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OwnerIdRow {
    #[serde(rename = "ownerId")]
    owner_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct LastNameRow {
    #[serde(rename = "searchLastName")]
    last_name: String,
}

/// Rewrite `multi_pet_owner_ids.csv` with the five owners of two or more pets
/// that have the most visits.
pub async fn refresh_multi_pet_owners(pool: &PgPool, dir: &Path) -> DbResult<Vec<MultiPetOwner>> {
    let mut owners: Vec<MultiPetOwner> = sqlx::query_as(
        r#"
        SELECT o.id::bigint AS id,
               o.last_name::text AS last_name,
               COUNT(DISTINCT p.id) AS pets,
               COUNT(v.id) AS visits
          FROM owners o
          JOIN pets p ON o.id = p.owner_id
          LEFT JOIN visits v ON p.id = v.pet_id
         GROUP BY o.id, o.last_name
        HAVING COUNT(DISTINCT p.id) >= 2
         ORDER BY COUNT(v.id) DESC, COUNT(DISTINCT p.id) DESC, o.id
         LIMIT 5
        "#,
    )
    .fetch_all(pool)
    .await?;

    if owners.is_empty() {
        warn!("no owners with multiple pets found; writing placeholder row");
        owners.push(MultiPetOwner::placeholder());
    }

    write_owner_ids(dir, &owners)?;

    info!("updated {MULTI_PET_OWNERS_CSV} with {} owners", owners.len());
    for owner in &owners {
        info!(
            "  id {}, {}: {} pets, {} visits",
            owner.id, owner.last_name, owner.pets, owner.visits
        );
    }
    Ok(owners)
}

/// Rewrite `common_last_names.csv` with up to 20 last names of owners that have pets.
/// Fails when no owner has a pet.
pub async fn refresh_common_last_names(pool: &PgPool, dir: &Path) -> DbResult<Vec<(String, i64)>> {
    let names: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT o.last_name::text, COUNT(o.id)
          FROM owners o
          JOIN pets p ON o.id = p.owner_id
         WHERE o.last_name IS NOT NULL
         GROUP BY o.last_name
         ORDER BY COUNT(o.id) DESC, o.last_name
         LIMIT 20
        "#,
    )
    .fetch_all(pool)
    .await?;

    if names.is_empty() {
        return Err(DbError::verification("no owners with pets found"));
    }

    write_last_names(dir, &names)?;

    info!("updated {COMMON_LAST_NAMES_CSV} with {} last names", names.len());
    Ok(names)
}

/// Write the `ownerId` CSV under `dir`, creating the directory if needed.
pub fn write_owner_ids(dir: &Path, owners: &[MultiPetOwner]) -> DbResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(MULTI_PET_OWNERS_CSV);
    let mut writer = csv::Writer::from_path(&path)?;
    for owner in owners {
        writer.serialize(OwnerIdRow { owner_id: owner.id })?;
    }
    writer.flush()?;
    Ok(path)
}

pub fn write_last_names(dir: &Path, names: &[(String, i64)]) -> DbResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(COMMON_LAST_NAMES_CSV);
    let mut writer = csv::Writer::from_path(&path)?;
    for (name, _) in names {
        writer.serialize(LastNameRow {
            last_name: name.clone(),
        })?;
    }
    writer.flush()?;
    Ok(path)
}

pub fn read_owner_ids(path: &Path) -> DbResult<Vec<i64>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut ids = Vec::new();
    for row in reader.deserialize::<OwnerIdRow>() {
        ids.push(row?.owner_id);
    }
    Ok(ids)
}

pub fn read_last_names(path: &Path) -> DbResult<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut names = Vec::new();
    for row in reader.deserialize::<LastNameRow>() {
        names.push(row?.last_name);
    }
    Ok(names)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub checks: Vec<Check>,
}

impl Verification {
    fn record(&mut self, name: impl Into<String>, ok: bool, detail: impl Into<String>) {
        let check = Check {
            name: name.into(),
            ok,
            detail: detail.into(),
        };
        if check.ok {
            info!("  OK: {}", check.detail);
        } else {
            warn!("  ERROR: {}", check.detail);
        }
        self.checks.push(check);
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.ok)
    }
}

/// Confirm the refreshed CSV files point at rows that exist.
pub async fn verify_csv_data(pool: &PgPool, dir: &Path) -> DbResult<Verification> {
    let mut verification = Verification::default();

    for id in read_owner_ids(&dir.join(MULTI_PET_OWNERS_CSV))? {
        let last_name: Option<String> =
            sqlx::query_scalar("SELECT last_name::text FROM owners WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;
        match last_name {
            Some(name) => verification.record("owner", true, format!("owner {id} exists ({name})")),
            None => verification.record("owner", false, format!("owner {id} NOT FOUND")),
        }
    }

    for name in read_last_names(&dir.join(COMMON_LAST_NAMES_CSV))?.into_iter().take(5) {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM owners WHERE last_name = $1")
            .bind(&name)
            .fetch_one(pool)
            .await?;
        verification.record(
            "last_name",
            count > 0,
            format!("'{name}': {count} owner(s)"),
        );
    }

    let relations: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM owners o JOIN pets p ON o.id = p.owner_id")
            .fetch_one(pool)
            .await?;
    verification.record(
        "owner_pets",
        relations > 0,
        format!("{relations} owner-pet relationships"),
    );

    Ok(verification)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Cleanup {
    pub pets: u64,
    pub visits: u64,
    pub owners: u64,
}

/// Remove rows left behind by earlier runs' delete scenarios.
pub async fn cleanup_test_data(pool: &PgPool) -> DbResult<Cleanup> {
    let mut tx = pool.begin().await?;
    let pets = sqlx::query("DELETE FROM pets WHERE name LIKE 'DelPet%'")
        .execute(&mut *tx)
        .await?
        .rows_affected();
    let visits = sqlx::query("DELETE FROM visits WHERE pet_id NOT IN (SELECT id FROM pets)")
        .execute(&mut *tx)
        .await?
        .rows_affected();
    let owners = sqlx::query("DELETE FROM owners WHERE first_name LIKE 'Del%'")
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;

    info!("cleaned up {pets} test pets, {visits} orphaned visits, {owners} test owners");
    Ok(Cleanup { pets, visits, owners })
}

/// Describe rows that would violate the pet-clinic foreign keys.
pub async fn foreign_key_issues(pool: &PgPool) -> DbResult<Vec<String>> {
    let checks = [
        (
            "pets with non-existent owners",
            "SELECT COUNT(*) FROM pets p LEFT JOIN owners o ON p.owner_id = o.id WHERE o.id IS NULL",
        ),
        (
            "visits with non-existent pets",
            "SELECT COUNT(*) FROM visits v LEFT JOIN pets p ON v.pet_id = p.id WHERE p.id IS NULL",
        ),
        (
            "pets with non-existent types",
            "SELECT COUNT(*) FROM pets p LEFT JOIN types t ON p.type_id = t.id WHERE t.id IS NULL",
        ),
    ];

    let mut issues = Vec::new();
    for (what, sql) in checks {
        let count: i64 = sqlx::query_scalar(sql).fetch_one(pool).await?;
        if count > 0 {
            issues.push(format!("found {count} {what}"));
        }
    }
    Ok(issues)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthCounts {
    pub owners: i64,
    pub pets: i64,
    pub visits: i64,
    pub vets: i64,
    pub types: i64,
    pub specialties: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

impl HealthCounts {
    pub fn rows(&self) -> [(&'static str, i64); 6] {
        [
            ("owners", self.owners),
            ("pets", self.pets),
            ("visits", self.visits),
            ("vets", self.vets),
            ("types", self.types),
            ("specialties", self.specialties),
        ]
    }

    /// Minimum-data findings for a meaningful test run.
    pub fn findings(&self) -> Vec<(Severity, &'static str)> {
        let mut findings = Vec::new();
        if self.owners < 10 {
            findings.push((Severity::Warning, "less than 10 owners in database"));
        }
        if self.pets < 5 {
            findings.push((Severity::Warning, "less than 5 pets in database"));
        }
        if self.types == 0 {
            findings.push((Severity::Error, "no pet types found; pet inserts will fail"));
        }
        if self.vets == 0 {
            findings.push((Severity::Warning, "no veterinarians found"));
        }
        findings
    }
}

pub async fn health_counts(pool: &PgPool) -> DbResult<HealthCounts> {
    let mut counts = HealthCounts::default();
    for (table, slot) in [
        ("owners", &mut counts.owners),
        ("pets", &mut counts.pets),
        ("visits", &mut counts.visits),
        ("vets", &mut counts.vets),
        ("types", &mut counts.types),
        ("specialties", &mut counts.specialties),
    ] {
        *slot = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await?;
    }
    Ok(counts)
}
