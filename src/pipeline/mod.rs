//! Page generation pipeline.
//!
//! # Architecture
//!
//! - **Orchestrator**: drafts every section of one page and regenerates only
//!   the sections that miss their length window
//! - **Assembler**: composes the page document, routing slug and SEO block
//! - **Controller**: runs a batch of pairs with bounded concurrency, writes
//!   previews and hands documents to the persistence sink
//! - **Config**: all run settings, passed in explicitly
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use unit_forge::generation::LlmSectionGenerator;
//! use unit_forge::pipeline::{BatchController, PipelineConfig};
//! use unit_forge::storage::PersistenceSink;
//! use unit_forge::units::TaskSource;
//!
//! let config = PipelineConfig::new()
//!     .with_pair_limit(Some(10))
//!     .with_preview_only(true)
//!     .with_preview_dir("previews");
//!
//! let generator = Arc::new(LlmSectionGenerator::new(Arc::new(config.llm.client()?)));
//! let sink = PersistenceSink::from_config(&config).await?;
//! let controller = BatchController::new(config, generator, sink);
//!
//! let result = controller.run(TaskSource::new("units.csv").load()?).await;
//! println!("{} succeeded, {} need review", result.succeeded.len(), result.degraded_count());
//! ```

pub mod assembler;
pub mod config;
pub mod controller;
pub mod orchestrator;

pub use assembler::{
    routing_slug, slug_token, DocumentAssembler, DocumentMetadata, PageDocument, SeoBlock,
    DOCUMENT_VERSION, DRAFT_STATUS,
};
pub use config::{ConfigError, LlmSettings, PipelineConfig};
pub use controller::{BatchController, BatchRunResult, BatchSummary, SkipReason, SkippedTask};
pub use orchestrator::{
    RegenerationBudget, RegenerationOrchestrator, SectionResult, SectionResults, SectionStatus,
};
