//! Generation, preview and persistence of the landing page.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::generation::SectionGenerator;
use crate::pipeline::{PipelineConfig, RegenerationBudget, RegenerationOrchestrator};
use crate::render::PreviewWriter;
use crate::storage::{PersistOutcome, PersistenceSink, PREVIEW_ONLY};

use super::document::{LandingAssembler, LandingDocument};
use super::LandingBrief;

/// What happened to the landing document after assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum LandingOutcome {
    Committed,
    Previewed,
    /// Still non-compliant and degraded documents are not persisted.
    Withheld(String),
    /// The store refused the write twice.
    Failed(String),
}

impl LandingOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LandingOutcome::Committed | LandingOutcome::Previewed)
    }
}

impl fmt::Display for LandingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LandingOutcome::Committed => f.write_str("committed"),
            LandingOutcome::Previewed => f.write_str("previewed"),
            LandingOutcome::Withheld(reason) => write!(f, "withheld ({})", reason),
            LandingOutcome::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Result of one landing build.
#[derive(Debug, Clone, Serialize)]
pub struct LandingReport {
    pub document: LandingDocument,
    pub outcome: LandingOutcome,
    pub render_failure: Option<String>,
}

/// Runs the landing page through generation, assembly, preview and persistence.
pub struct LandingBuilder {
    config: PipelineConfig,
    generator: Arc<dyn SectionGenerator<LandingBrief>>,
    sink: PersistenceSink,
    assembler: LandingAssembler,
    previews: Option<PreviewWriter>,
}

impl LandingBuilder {
    pub fn new(
        config: PipelineConfig,
        generator: Arc<dyn SectionGenerator<LandingBrief>>,
        sink: PersistenceSink,
    ) -> Self {
        let assembler = LandingAssembler::from_config(&config);
        let previews = config.preview_dir.clone().map(PreviewWriter::new);
        Self {
            config,
            generator,
            sink,
            assembler,
            previews,
        }
    }

    pub async fn build(&self, brief: &LandingBrief) -> LandingReport {
        tracing::info!(slug = %brief.slug, units = brief.featured_units.len(), "Building landing page");

        let budget = Arc::new(RegenerationBudget::from_option(
            self.config.regeneration_budget,
        ));
        let orchestrator = RegenerationOrchestrator::new(self.generator.clone(), self.config.retry)
            .with_budget(budget);
        let sections = orchestrator
            .produce(
                brief,
                &self.config.landing_policies,
                self.config.effective_max_passes(),
            )
            .await;
        let document = self.assembler.assemble(brief, sections);

        let render_failure = self.previews.as_ref().and_then(|writer| {
            writer.write_landing(&document).err().map(|err| {
                tracing::warn!(slug = %document.slug, error = %err, "Preview not written");
                err.to_string()
            })
        });

        if document.needs_review() && !self.config.persist_degraded && !self.sink.is_preview_only() {
            let reason = format!("needs review: {}", document.review_summary());
            tracing::warn!(slug = %document.slug, reason = %reason, "Withholding landing page");
            return LandingReport {
                document,
                outcome: LandingOutcome::Withheld(reason),
                render_failure,
            };
        }

        let outcome = match self.sink.upsert_landing(&document).await {
            PersistOutcome::Committed => LandingOutcome::Committed,
            PersistOutcome::Skipped(reason) if reason == PREVIEW_ONLY => LandingOutcome::Previewed,
            PersistOutcome::Skipped(reason) => LandingOutcome::Failed(reason),
        };
        tracing::info!(
            slug = %document.slug,
            needs_review = document.needs_review(),
            outcome = %outcome,
            "Landing page finished"
        );

        LandingReport {
            document,
            outcome,
            render_failure,
        }
    }
}
