//! SQLite page store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::error::StoreError;

use super::record::{LandingRecord, PageRecord, StoredLanding, StoredPage};
use super::PageStore;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS conversion_pages (
    slug            TEXT    NOT NULL PRIMARY KEY,
    parent_slug     TEXT    NOT NULL,
    from_unit_code  TEXT    NOT NULL,
    to_unit_code    TEXT    NOT NULL,
    status          TEXT    NOT NULL,
    needs_review    INTEGER NOT NULL,

    -- Full page in its stored camelCase layout
    document        TEXT    NOT NULL,

    created_at      TEXT    NOT NULL,
    updated_at      TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversion_pages_review ON conversion_pages(needs_review);

CREATE TABLE IF NOT EXISTS landing_pages (
    slug            TEXT    NOT NULL PRIMARY KEY,
    status          TEXT    NOT NULL,
    needs_review    INTEGER NOT NULL,
    document        TEXT    NOT NULL,
    created_at      TEXT    NOT NULL,
    updated_at      TEXT    NOT NULL
);
"#;

/// Page store backed by a SQLite file (or `sqlite::memory:`).
#[derive(Clone)]
pub struct SqlitePageStore {
    pool: SqlitePool,
}

impl SqlitePageStore {
    /// Open or create a store.
    ///
    /// `url` is a `sqlite://` URL or a bare file path.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let url = if url.starts_with("sqlite:") {
            url.to_string()
        } else {
            format!("sqlite://{}", url)
        };
        let in_memory = url.contains(":memory:");

        let opts = SqliteConnectOptions::from_str(&url)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(if in_memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            })
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to :memory: is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .connect_with(opts)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        tracing::info!(url = %url, "SQLite page store opened");
        Ok(Self { pool })
    }
}

#[async_trait]
impl PageStore for SqlitePageStore {
    async fn upsert_page(&self, page: &StoredPage) -> Result<(), StoreError> {
        let document = serde_json::to_string(page)?;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO conversion_pages (
                slug, parent_slug, from_unit_code, to_unit_code, status,
                needs_review, document, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT(slug) DO UPDATE SET
                parent_slug = excluded.parent_slug,
                from_unit_code = excluded.from_unit_code,
                to_unit_code = excluded.to_unit_code,
                status = excluded.status,
                needs_review = excluded.needs_review,
                document = excluded.document,
                updated_at = excluded.updated_at",
        )
        .bind(&page.slug)
        .bind(&page.parent_slug)
        .bind(&page.from_unit_code)
        .bind(&page.to_unit_code)
        .bind(&page.status)
        .bind(page.needs_review as i32)
        .bind(&document)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_page(&self, slug: &str) -> Result<Option<PageRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT document, created_at, updated_at FROM conversion_pages WHERE slug = ?1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let document: String = row.try_get("document")?;
        Ok(Some(PageRecord {
            page: serde_json::from_str(&document)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        }))
    }

    async fn count_pages(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM conversion_pages")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    async fn upsert_landing(&self, landing: &StoredLanding) -> Result<(), StoreError> {
        let document = serde_json::to_string(landing)?;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO landing_pages (
                slug, status, needs_review, document, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(slug) DO UPDATE SET
                status = excluded.status,
                needs_review = excluded.needs_review,
                document = excluded.document,
                updated_at = excluded.updated_at",
        )
        .bind(&landing.slug)
        .bind(&landing.status)
        .bind(landing.needs_review as i32)
        .bind(&document)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_landing(&self, slug: &str) -> Result<Option<LandingRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT document, created_at, updated_at FROM landing_pages WHERE slug = ?1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let document: String = row.try_get("document")?;
        Ok(Some(LandingRecord {
            landing: serde_json::from_str(&document)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        }))
    }
}
