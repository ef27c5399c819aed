use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::batch::BatchOutcome;
use crate::error::{Error, Result};
use crate::models::{yes_no, CustomerDetail, Stats, StoredCustomer, StoredPrediction, Upload};

pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    Ok(pool)
}

/// Create the schema if it does not exist yet. Idempotent.
pub async fn init_db(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS uploads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            upload_id TEXT UNIQUE NOT NULL,
            filename TEXT NOT NULL,
            total_customers INTEGER NOT NULL DEFAULT 0,
            high_risk_count INTEGER NOT NULL DEFAULT 0,
            medium_risk_count INTEGER NOT NULL DEFAULT 0,
            low_risk_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            upload_id TEXT NOT NULL REFERENCES uploads(upload_id),
            gender TEXT NOT NULL,
            senior_citizen INTEGER NOT NULL,
            partner TEXT NOT NULL,
            dependents TEXT NOT NULL,
            tenure INTEGER NOT NULL,
            contract TEXT NOT NULL,
            payment_method TEXT NOT NULL,
            monthly_charges REAL NOT NULL,
            total_charges REAL NOT NULL,
            internet_service TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS predictions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id INTEGER NOT NULL REFERENCES customers(id),
            will_churn INTEGER NOT NULL,
            churn_probability REAL NOT NULL,
            risk_level TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Short collision-resistant batch identifier, 8 hex chars of a v4 uuid.
/// A collision trips the UNIQUE constraint and fails that submission's
/// transaction rather than overwriting an existing batch.
pub fn new_upload_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Materialize one scored batch as an upload header plus one customer row and
/// one prediction row per record, in a single transaction. Either the whole
/// batch becomes visible or none of it does.
pub async fn persist_batch(
    pool: &SqlitePool,
    upload_id: &str,
    filename: &str,
    outcome: &BatchOutcome,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO uploads
        (upload_id, filename, total_customers, high_risk_count, medium_risk_count, low_risk_count, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(upload_id)
    .bind(filename)
    .bind(outcome.summary.total as i64)
    .bind(outcome.summary.high_risk as i64)
    .bind(outcome.summary.medium_risk as i64)
    .bind(outcome.summary.low_risk as i64)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    for record in &outcome.results {
        let profile = &record.profile;
        let customer_id = sqlx::query(
            r#"
            INSERT INTO customers
            (upload_id, gender, senior_citizen, partner, dependents, tenure,
             contract, payment_method, monthly_charges, total_charges, internet_service, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(upload_id)
        .bind(&profile.gender)
        .bind(profile.senior_citizen as i64)
        .bind(yes_no(profile.partner))
        .bind(yes_no(profile.dependents))
        .bind(profile.tenure)
        .bind(profile.contract.as_str())
        .bind(&profile.payment_method)
        .bind(profile.monthly_charges)
        .bind(profile.total_charges)
        .bind(profile.internet_service.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query(
            r#"
            INSERT INTO predictions
            (customer_id, will_churn, churn_probability, risk_level, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(customer_id)
        .bind(record.will_churn as i64)
        .bind(record.probability_pct)
        .bind(record.risk_tier.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn list_uploads(pool: &SqlitePool) -> Result<Vec<Upload>> {
    let rows = sqlx::query(
        r#"
        SELECT id, upload_id, filename, total_customers,
               high_risk_count, medium_risk_count, low_risk_count, created_at
        FROM uploads
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(upload_from_row).collect())
}

pub async fn get_upload(pool: &SqlitePool, upload_id: &str) -> Result<Upload> {
    let row = sqlx::query(
        r#"
        SELECT id, upload_id, filename, total_customers,
               high_risk_count, medium_risk_count, low_risk_count, created_at
        FROM uploads
        WHERE upload_id = ?
        "#,
    )
    .bind(upload_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(upload_id.to_string()))?;

    Ok(upload_from_row(&row))
}

/// Every customer of one batch, joined with its prediction where present.
pub async fn fetch_upload_details(
    pool: &SqlitePool,
    upload_id: &str,
) -> Result<Vec<CustomerDetail>> {
    // Distinguish "unknown upload" from "upload with no rows" up front.
    get_upload(pool, upload_id).await?;

    let rows = sqlx::query(
        r#"
        SELECT c.id, c.upload_id, c.gender, c.senior_citizen, c.partner, c.dependents,
               c.tenure, c.contract, c.payment_method, c.monthly_charges, c.total_charges,
               c.internet_service, c.created_at,
               p.id AS prediction_id, p.will_churn, p.churn_probability, p.risk_level,
               p.created_at AS predicted_at
        FROM customers c
        LEFT JOIN predictions p ON p.customer_id = c.id
        WHERE c.upload_id = ?
        ORDER BY c.id
        "#,
    )
    .bind(upload_id)
    .fetch_all(pool)
    .await?;

    let mut details = Vec::new();
    for row in rows {
        let customer = StoredCustomer {
            id: row.get("id"),
            upload_id: row.get("upload_id"),
            gender: row.get("gender"),
            senior_citizen: row.get("senior_citizen"),
            partner: row.get("partner"),
            dependents: row.get("dependents"),
            tenure: row.get("tenure"),
            contract: row.get("contract"),
            payment_method: row.get("payment_method"),
            monthly_charges: row.get("monthly_charges"),
            total_charges: row.get("total_charges"),
            internet_service: row.get("internet_service"),
            created_at: row.get("created_at"),
        };

        let prediction = row
            .get::<Option<i64>, _>("prediction_id")
            .map(|prediction_id| StoredPrediction {
                id: prediction_id,
                customer_id: customer.id,
                will_churn: row.get("will_churn"),
                churn_probability: row.get("churn_probability"),
                risk_level: row.get("risk_level"),
                created_at: row.get::<Option<DateTime<Utc>>, _>("predicted_at").unwrap_or(customer.created_at),
            });

        details.push(CustomerDetail { customer, prediction });
    }

    Ok(details)
}

/// Remove one batch: predictions, then customers, then the header, in one
/// transaction. Unknown ids are a NotFound error, not a no-op.
pub async fn delete_upload(pool: &SqlitePool, upload_id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    let found = sqlx::query("SELECT id FROM uploads WHERE upload_id = ?")
        .bind(upload_id)
        .fetch_optional(&mut *tx)
        .await?;
    if found.is_none() {
        return Err(Error::NotFound(upload_id.to_string()));
    }

    sqlx::query(
        "DELETE FROM predictions WHERE customer_id IN (SELECT id FROM customers WHERE upload_id = ?)",
    )
    .bind(upload_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM customers WHERE upload_id = ?")
        .bind(upload_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM uploads WHERE upload_id = ?")
        .bind(upload_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn stats(pool: &SqlitePool) -> Result<Stats> {
    let total_uploads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM uploads")
        .fetch_one(pool)
        .await?;
    let total_customers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
        .fetch_one(pool)
        .await?;

    let tier_count = |tier: &'static str| async move {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM predictions WHERE risk_level = ?")
            .bind(tier)
            .fetch_one(pool)
            .await
    };

    Ok(Stats {
        total_uploads,
        total_customers,
        high_risk: tier_count("High").await?,
        medium_risk: tier_count("Medium").await?,
        low_risk: tier_count("Low").await?,
    })
}

fn upload_from_row(row: &sqlx::sqlite::SqliteRow) -> Upload {
    Upload {
        id: row.get("id"),
        upload_id: row.get("upload_id"),
        filename: row.get("filename"),
        total_customers: row.get("total_customers"),
        high_risk_count: row.get("high_risk_count"),
        medium_risk_count: row.get("medium_risk_count"),
        low_risk_count: row.get("low_risk_count"),
        created_at: row.get("created_at"),
    }
}
