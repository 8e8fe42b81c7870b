//! Idempotent persistence of finished documents.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;

use crate::error::StoreError;
use crate::landing::LandingDocument;
use crate::pipeline::{PageDocument, PipelineConfig};

use super::record::{StoredLanding, StoredPage};
use super::{connect_store, PageStore};

/// Reason reported for every document in a preview-only run.
pub const PREVIEW_ONLY: &str = "preview-only";

/// Result of handing a document to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Committed,
    Skipped(String),
}

impl fmt::Display for PersistOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistOutcome::Committed => f.write_str("committed"),
            PersistOutcome::Skipped(reason) => write!(f, "skipped ({})", reason),
        }
    }
}

/// A document in its stored layout.
enum Stored {
    Page(StoredPage),
    Landing(StoredLanding),
}

impl Stored {
    fn slug(&self) -> &str {
        match self {
            Stored::Page(page) => &page.slug,
            Stored::Landing(landing) => &landing.slug,
        }
    }

    async fn write(&self, store: &dyn PageStore) -> Result<(), StoreError> {
        match self {
            Stored::Page(page) => store.upsert_page(page).await,
            Stored::Landing(landing) => store.upsert_landing(landing).await,
        }
    }
}

/// Writes documents to the destination store, keyed by slug.
///
/// Without a store every upsert is a no-op returning
/// `Skipped("preview-only")`.
#[derive(Clone)]
pub struct PersistenceSink {
    store: Option<Arc<dyn PageStore>>,
}

impl PersistenceSink {
    pub fn new(store: Arc<dyn PageStore>) -> Self {
        Self { store: Some(store) }
    }

    pub fn preview_only() -> Self {
        Self { store: None }
    }

    /// Build the sink a config asks for, connecting to its store if needed.
    pub async fn from_config(config: &PipelineConfig) -> Result<Self, StoreError> {
        if config.preview_only {
            return Ok(Self::preview_only());
        }
        let url = config.store_url.as_deref().ok_or(StoreError::NotConfigured)?;
        Ok(Self::new(connect_store(url).await?))
    }

    pub fn is_preview_only(&self) -> bool {
        self.store.is_none()
    }

    /// Insert or replace the stored page for `document.routing_slug`.
    ///
    /// A failed write is retried once before the document is reported as
    /// skipped.
    pub async fn upsert(&self, document: &PageDocument) -> PersistOutcome {
        self.persist(|| Stored::Page(StoredPage::from(document).displayed_at(Utc::now())))
            .await
    }

    /// Insert or replace the stored landing page, with the same retry rule.
    pub async fn upsert_landing(&self, document: &LandingDocument) -> PersistOutcome {
        self.persist(|| Stored::Landing(StoredLanding::from(document).displayed_at(Utc::now())))
            .await
    }

    async fn persist(&self, layout: impl FnOnce() -> Stored) -> PersistOutcome {
        let Some(store) = &self.store else {
            return PersistOutcome::Skipped(PREVIEW_ONLY.to_string());
        };

        let stored = layout();
        match stored.write(store.as_ref()).await {
            Ok(()) => return PersistOutcome::Committed,
            Err(err) => {
                tracing::warn!(slug = %stored.slug(), error = %err, "Upsert failed, retrying once");
            }
        }

        match stored.write(store.as_ref()).await {
            Ok(()) => PersistOutcome::Committed,
            Err(err) => {
                tracing::error!(slug = %stored.slug(), error = %err, "Upsert failed");
                PersistOutcome::Skipped(format!("persistence failed: {}", err))
            }
        }
    }
}
