//! End-to-end batch scenarios with scripted generators and on-disk stores.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use unit_forge::error::{GenerationError, StoreError};
use unit_forge::generation::{RetryPolicy, SectionGenerator};
use unit_forge::landing::{LandingBrief, LandingBuilder, LandingOutcome};
use unit_forge::pipeline::{routing_slug, BatchController, PipelineConfig, SectionStatus};
use unit_forge::sections::{SectionBody, SectionKey, SectionPolicy};
use unit_forge::storage::{
    LandingRecord, PageRecord, PageStore, PersistOutcome, PersistenceSink, SqlitePageStore,
    StoredLanding, StoredPage,
};
use unit_forge::units::{ConversionPairTask, SourceRow, TaskSource};

/// Returns `lengths[n]` words on the n-th call for each (pair, section);
/// the last length repeats.
struct LengthScript {
    lengths: Vec<usize>,
    calls: Mutex<HashMap<(String, SectionKey), usize>>,
}

impl LengthScript {
    fn new(lengths: Vec<usize>) -> Self {
        Self {
            lengths,
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn calls_for(&self, task: &ConversionPairTask, key: SectionKey) -> usize {
        self.calls_for_slug(&routing_slug(task.from_code(), task.to_code()), key)
    }

    fn calls_for_slug(&self, slug: &str, key: SectionKey) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&(slug.to_string(), key))
            .copied()
            .unwrap_or(0)
    }

    fn next_body(&self, slug: String, key: SectionKey) -> SectionBody {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry((slug, key)).or_insert(0);
            *count += 1;
            *count - 1
        };
        let words = self.lengths[n.min(self.lengths.len() - 1)];
        SectionBody::Prose(format!("<p>{}</p>", vec!["acre"; words].join(" ")))
    }
}

#[async_trait]
impl SectionGenerator for LengthScript {
    async fn generate(
        &self,
        task: &ConversionPairTask,
        key: SectionKey,
    ) -> Result<SectionBody, GenerationError> {
        Ok(self.next_body(routing_slug(task.from_code(), task.to_code()), key))
    }
}

#[async_trait]
impl SectionGenerator<LandingBrief> for LengthScript {
    async fn generate(
        &self,
        brief: &LandingBrief,
        key: SectionKey,
    ) -> Result<SectionBody, GenerationError> {
        Ok(self.next_body(brief.slug.clone(), key))
    }
}

/// Always unavailable, counting every call.
struct DownGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl SectionGenerator for DownGenerator {
    async fn generate(
        &self,
        _task: &ConversionPairTask,
        _key: SectionKey,
    ) -> Result<SectionBody, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GenerationError::Unavailable("503 upstream".to_string()))
    }
}

/// Delegates to an inner store but refuses one slug.
struct RefusingStore {
    inner: SqlitePageStore,
    refused_slug: String,
}

#[async_trait]
impl PageStore for RefusingStore {
    async fn upsert_page(&self, page: &StoredPage) -> Result<(), StoreError> {
        if page.slug == self.refused_slug {
            return Err(StoreError::ConnectionFailed("disk full".to_string()));
        }
        self.inner.upsert_page(page).await
    }

    async fn get_page(&self, slug: &str) -> Result<Option<PageRecord>, StoreError> {
        self.inner.get_page(slug).await
    }

    async fn count_pages(&self) -> Result<u64, StoreError> {
        self.inner.count_pages().await
    }

    async fn upsert_landing(&self, landing: &StoredLanding) -> Result<(), StoreError> {
        if landing.slug == self.refused_slug {
            return Err(StoreError::ConnectionFailed("disk full".to_string()));
        }
        self.inner.upsert_landing(landing).await
    }

    async fn get_landing(&self, slug: &str) -> Result<Option<LandingRecord>, StoreError> {
        self.inner.get_landing(slug).await
    }
}

fn sq_m_to_sq_ft() -> ConversionPairTask {
    ConversionPairTask::new(
        "SQ_M",
        "SQ_FT",
        "Square Meter",
        "Square Feet",
        10.7639,
        "Pan-India",
        "Pan-India",
        Some("Pune".to_string()),
    )
    .unwrap()
}

fn pair(from: &str, to: &str) -> ConversionPairTask {
    ConversionPairTask::new(from, to, from, to, 3.0, "Pan-India", "Pan-India", None).unwrap()
}

/// One prose section with a 200–300 word window.
fn single_section_config() -> PipelineConfig {
    PipelineConfig::default()
        .with_policies(vec![SectionPolicy::prose(SectionKey::WhyConvert, 200, 300)])
        .with_retry(RetryPolicy::immediate(1))
}

async fn sqlite_store(dir: &tempfile::TempDir) -> SqlitePageStore {
    SqlitePageStore::open(dir.path().join("pages.db").to_str().unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_short_draft_is_regenerated_into_compliance() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(sqlite_store(&dir).await);
    let generator = Arc::new(LengthScript::new(vec![150, 240]));
    let task = sq_m_to_sq_ft();

    let controller = BatchController::new(
        single_section_config().with_max_fix_passes(3),
        generator.clone(),
        PersistenceSink::new(store.clone()),
    );
    let result = controller.run(vec![SourceRow::Task(task.clone())]).await;

    assert_eq!(result.succeeded.len(), 1);
    let doc = &result.succeeded[0];
    assert!(!doc.needs_review());
    let section = doc.section(SectionKey::WhyConvert).unwrap();
    assert_eq!(section.status, SectionStatus::Compliant);
    assert_eq!(section.word_count, 240);
    assert_eq!(section.passes_used, 2);
    assert_eq!(generator.calls_for(&task, SectionKey::WhyConvert), 2);

    let stored = store.get_page("sq-m-to-sq-ft").await.unwrap().unwrap();
    assert!(!stored.page.needs_review);
    assert_eq!(stored.page.section_report[0].passes_used, 2);
}

#[tokio::test]
async fn test_persistently_short_section_is_flagged_and_previewed() {
    let previews = tempfile::tempdir().unwrap();
    let generator = Arc::new(LengthScript::new(vec![150]));
    let task = sq_m_to_sq_ft();

    let controller = BatchController::new(
        single_section_config()
            .with_max_fix_passes(2)
            .with_preview_only(true)
            .with_preview_dir(previews.path()),
        generator.clone(),
        PersistenceSink::preview_only(),
    );
    let result = controller.run(vec![SourceRow::Task(task.clone())]).await;

    assert_eq!(result.succeeded.len(), 1);
    assert_eq!(result.degraded_count(), 1);
    let doc = &result.succeeded[0];
    assert!(doc.needs_review());
    let section = doc.section(SectionKey::WhyConvert).unwrap();
    assert_eq!(section.status, SectionStatus::TooShort);
    assert_eq!(section.passes_used, 2);
    assert_eq!(generator.calls_for(&task, SectionKey::WhyConvert), 2);

    assert_eq!(
        PersistenceSink::preview_only().upsert(doc).await,
        PersistOutcome::Skipped("preview-only".to_string())
    );
    let preview = previews.path().join("sq-m-to-sq-ft.html");
    assert!(preview.exists());
    assert!(result.render_failures.is_empty());
}

#[tokio::test]
async fn test_regional_unit_keeps_both_regions() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("pairs.csv");
    std::fs::write(
        &input,
        "from_code,to_code,from_label,to_label,factor,from_region,to_region,city\n\
         ANKANAM,ACRE,Ankanam,Acre,0.00165,Andhra Pradesh,Pan-India,Vijayawada\n",
    )
    .unwrap();

    let store = Arc::new(sqlite_store(&dir).await);
    let controller = BatchController::new(
        single_section_config(),
        Arc::new(LengthScript::new(vec![250])),
        PersistenceSink::new(store.clone()),
    );
    let result = controller
        .run(TaskSource::new(&input).load().unwrap())
        .await;

    assert_eq!(result.succeeded.len(), 1);
    let doc = &result.succeeded[0];
    assert_eq!(doc.routing_slug, "ankanam-to-acre");
    assert_eq!(doc.task.from_region(), "Andhra Pradesh");
    assert_eq!(doc.task.to_region(), "Pan-India");

    let stored = store.get_page("ankanam-to-acre").await.unwrap().unwrap().page;
    assert_eq!(stored.from_unit_region, "Andhra Pradesh");
    assert_eq!(stored.to_unit_region, "Pan-India");
    assert_eq!(stored.city_name.as_deref(), Some("Vijayawada"));
}

#[tokio::test]
async fn test_persistence_failure_is_isolated_to_one_task() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RefusingStore {
        inner: sqlite_store(&dir).await,
        refused_slug: "c-to-x".to_string(),
    });
    let controller = BatchController::new(
        single_section_config().with_max_concurrency(2),
        Arc::new(LengthScript::new(vec![250])),
        PersistenceSink::new(store.clone()),
    );
    let rows = ["A", "B", "C", "D", "E"].map(|code| SourceRow::Task(pair(code, "X")));

    let result = controller.run(rows).await;

    let slugs: Vec<_> = result.succeeded.iter().map(|d| d.routing_slug.as_str()).collect();
    assert_eq!(slugs, vec!["a-to-x", "b-to-x", "d-to-x", "e-to-x"]);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].label, "C -> X");
    assert!(result.skipped[0].reason.starts_with("persistence failed"));
    assert_eq!(store.count_pages().await.unwrap(), 4);
}

#[tokio::test]
async fn test_rerun_replaces_pages_instead_of_duplicating() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(sqlite_store(&dir).await);
    let rows = || vec![SourceRow::Task(pair("A", "B")), SourceRow::Task(pair("B", "A"))];

    let first = BatchController::new(
        single_section_config(),
        Arc::new(LengthScript::new(vec![220])),
        PersistenceSink::new(store.clone()),
    );
    first.run(rows()).await;
    let before = store.get_page("a-to-b").await.unwrap().unwrap();

    let second = BatchController::new(
        single_section_config(),
        Arc::new(LengthScript::new(vec![280])),
        PersistenceSink::new(store.clone()),
    );
    let result = second.run(rows()).await;

    assert_eq!(result.succeeded.len(), 2);
    assert_eq!(store.count_pages().await.unwrap(), 2);
    let after = store.get_page("a-to-b").await.unwrap().unwrap();
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.page.section_report[0].word_count, 280);
}

#[tokio::test]
async fn test_directional_pairs_get_distinct_slugs() {
    assert_eq!(routing_slug("SQ_M", "SQ_FT"), routing_slug("SQ_M", "SQ_FT"));
    assert_ne!(routing_slug("SQ_M", "SQ_FT"), routing_slug("SQ_FT", "SQ_M"));
    assert_eq!(routing_slug("BIGHA_ASSAM", "SQ_FT"), "bigha-assam-to-sq-ft");
}

#[tokio::test]
async fn test_unavailable_generator_is_bounded() {
    let generator = Arc::new(DownGenerator {
        calls: AtomicUsize::new(0),
    });
    let controller = BatchController::new(
        single_section_config()
            .with_retry(RetryPolicy::immediate(2))
            .with_max_fix_passes(3)
            .with_preview_only(true),
        generator.clone(),
        PersistenceSink::preview_only(),
    );

    let result = controller.run(vec![SourceRow::Task(sq_m_to_sq_ft())]).await;

    // 3 passes of 2 attempts each.
    assert_eq!(generator.calls.load(Ordering::SeqCst), 6);
    let section = result.succeeded[0].section(SectionKey::WhyConvert).unwrap();
    assert_eq!(section.status, SectionStatus::GenerationFailed);
    assert!(section.error.as_deref().unwrap().contains("503 upstream"));
    assert!(result.succeeded[0].needs_review());
}

#[tokio::test]
async fn test_regeneration_budget_is_shared_across_the_batch() {
    let generator = Arc::new(LengthScript::new(vec![150]));
    let controller = BatchController::new(
        single_section_config()
            .with_max_fix_passes(5)
            .with_max_concurrency(1)
            .with_regeneration_budget(Some(3))
            .with_preview_only(true),
        generator.clone(),
        PersistenceSink::preview_only(),
    );
    let rows = vec![SourceRow::Task(pair("A", "B")), SourceRow::Task(pair("C", "D"))];

    let result = controller.run(rows).await;

    assert_eq!(result.degraded_count(), 2);
    let total = generator.calls_for(&pair("A", "B"), SectionKey::WhyConvert)
        + generator.calls_for(&pair("C", "D"), SectionKey::WhyConvert);
    // Two drafts plus three regenerations.
    assert_eq!(total, 5);
}

/// Two prose landing sections with a 200–300 word window.
fn landing_config() -> PipelineConfig {
    PipelineConfig::default()
        .with_landing_policies(vec![
            SectionPolicy::prose(SectionKey::Description, 200, 300),
            SectionPolicy::prose(SectionKey::Formulas, 200, 300),
        ])
        .with_retry(RetryPolicy::immediate(1))
}

#[tokio::test]
async fn test_landing_page_is_stored_beside_its_children() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(sqlite_store(&dir).await);
    let generator = Arc::new(LengthScript::new(vec![120, 250]));

    let controller = BatchController::new(
        single_section_config(),
        generator.clone(),
        PersistenceSink::new(store.clone()),
    );
    let tasks = vec![sq_m_to_sq_ft(), pair("ACRE", "SQ_FT")];
    let result = controller
        .run(tasks.iter().cloned().map(SourceRow::Task).collect::<Vec<_>>())
        .await;
    assert_eq!(result.succeeded.len(), 2);

    let config = landing_config().with_preview_dir(dir.path().join("previews"));
    let brief = LandingBrief::from_config(&config).featuring_tasks(&tasks);
    let builder = LandingBuilder::new(config, generator.clone(), PersistenceSink::new(store.clone()));
    let report = builder.build(&brief).await;

    assert_eq!(report.outcome, LandingOutcome::Committed);
    assert_eq!(generator.calls_for_slug("area-convertor", SectionKey::Description), 2);
    assert_eq!(generator.calls_for_slug("area-convertor", SectionKey::Formulas), 2);
    assert!(dir.path().join("previews").join("area-convertor.html").exists());

    let landing = store.get_landing("area-convertor").await.unwrap().unwrap().landing;
    assert_eq!(landing.page_type, "landing");
    assert!(landing.popular_conversions.is_empty());
    assert!(landing.last_updated_display_date.is_some());
    assert!(landing.description_section.main_description_html.starts_with("<p>acre"));
    assert_eq!(landing.section_report.len(), 2);
    assert!(landing.section_report.iter().all(|r| r.passes_used == 2));

    // Children keep their own table and URL under the landing slug.
    assert_eq!(store.count_pages().await.unwrap(), 2);
    let child = store.get_page("sq-m-to-sq-ft").await.unwrap().unwrap().page;
    assert_eq!(child.url_path, format!("{}/sq-m-to-sq-ft", landing.url_path));
}

#[tokio::test]
async fn test_refused_landing_write_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RefusingStore {
        inner: sqlite_store(&dir).await,
        refused_slug: "area-convertor".to_string(),
    });
    let builder = LandingBuilder::new(
        landing_config(),
        Arc::new(LengthScript::new(vec![250])),
        PersistenceSink::new(store.clone()),
    );

    let report = builder.build(&LandingBrief::default()).await;

    assert!(matches!(report.outcome, LandingOutcome::Failed(ref r) if r.starts_with("persistence failed")));
    assert!(!report.document.needs_review());
    assert!(store.get_landing("area-convertor").await.unwrap().is_none());
}
