//! Destination stores for generated pages.
//!
//! - [`PageStore`]: async key-value style store keyed by slug, holding
//!   conversion pages and the landing page in separate tables
//! - [`SqlitePageStore`] / [`PgPageStore`]: the two backends
//! - [`PersistenceSink`]: the pipeline-facing wrapper with retry and
//!   preview-only handling

pub mod postgres;
pub mod record;
pub mod sink;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StoreError;

pub use postgres::PgPageStore;
pub use record::{LandingRecord, PageRecord, StoredLanding, StoredPage};
pub use sink::{PersistOutcome, PersistenceSink, PREVIEW_ONLY};
pub use sqlite::SqlitePageStore;

/// A store holding one page per routing slug.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Insert the page, or replace the one with the same slug.
    async fn upsert_page(&self, page: &StoredPage) -> Result<(), StoreError>;

    async fn get_page(&self, slug: &str) -> Result<Option<PageRecord>, StoreError>;

    async fn count_pages(&self) -> Result<u64, StoreError>;

    /// Insert the landing page, or replace the one with the same slug.
    async fn upsert_landing(&self, landing: &StoredLanding) -> Result<(), StoreError>;

    async fn get_landing(&self, slug: &str) -> Result<Option<LandingRecord>, StoreError>;
}

/// Open the store a connection string points at.
///
/// `sqlite:` URLs open a [`SqlitePageStore`]; `postgres://` and
/// `postgresql://` URLs connect a [`PgPageStore`].
pub async fn connect_store(url: &str) -> Result<Arc<dyn PageStore>, StoreError> {
    let trimmed = url.trim();
    if trimmed.starts_with("sqlite:") {
        Ok(Arc::new(SqlitePageStore::open(trimmed).await?))
    } else if trimmed.starts_with("postgres://") || trimmed.starts_with("postgresql://") {
        Ok(Arc::new(PgPageStore::connect(trimmed).await?))
    } else {
        Err(StoreError::UnsupportedUrl(trimmed.to_string()))
    }
}
