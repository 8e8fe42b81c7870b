//! CLI command definitions for unit-forge.
//!
//! `generate` runs the full batch, `landing` builds the parent landing page,
//! `section` regenerates one section of one pair, and `validate` checks an
//! input file without calling the model.

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::generation::{LlmSectionGenerator, SectionGenerator};
use crate::landing::{LandingBrief, LandingBuilder, LandingReport};
use crate::llm::{DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT};
use crate::pipeline::{
    BatchController, BatchRunResult, LlmSettings, PipelineConfig, RegenerationOrchestrator,
    SectionResult,
};
use crate::sections::{default_policy, SectionBody, SectionKey};
use crate::storage::PersistenceSink;
use crate::units::{
    extract_region, guess_city, normalize_unit_code, ConversionPairTask, InputLayout, SourceRow,
    TaskSource, DEFAULT_CITY, PAN_INDIA,
};

/// Default directory for HTML previews.
const DEFAULT_PREVIEW_DIR: &str = "./previews";

/// Generate unit-conversion landing pages with a chat-completions model.
#[derive(Parser)]
#[command(name = "unit-forge")]
#[command(about = "Generate unit-conversion landing pages with length-checked sections")]
#[command(version)]
#[command(
    long_about = "unit-forge reads conversion pairs from a CSV file, generates every page section with an LLM, regenerates only the sections that miss their word window, and stores one page per routing slug.\n\nExample usage:\n  unit-forge generate --input units.csv --limit 5 --preview-only"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate pages for every pair in an input file.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Generate the landing page that parents every conversion page.
    Landing(LandingArgs),

    /// Regenerate one section of one pair and print it with its length status.
    Section(SectionArgs),

    /// Read an input file and report its pairs and malformed rows.
    Validate(ValidateArgs),
}

/// Chat-completions backend flags shared by generating commands.
#[derive(clap::Args, Debug, Clone)]
pub struct LlmArgs {
    /// API key (can also be set via OPENAI_API_KEY or LITELLM_API_KEY env var).
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, env = "LITELLM_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Model used for every section.
    #[arg(short = 'm', long, env = "LITELLM_DEFAULT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Sampling temperature.
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "LITELLM_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout_secs: u64,
}

impl LlmArgs {
    fn settings(&self) -> LlmSettings {
        LlmSettings {
            api_base: self.api_base.clone(),
            api_key: self
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .or_else(|| LlmSettings::from_env().api_key),
            model: self.model.clone(),
            temperature: self.temperature,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Input-file flags shared by `generate` and `validate`.
#[derive(clap::Args, Debug, Clone)]
pub struct InputArgs {
    /// CSV file of conversion pairs (pair table or conversion matrix).
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Input layout: auto, pairs or matrix.
    #[arg(long, default_value = "auto")]
    pub layout: String,

    /// City used when neither the row nor the unit labels suggest one.
    #[arg(long, default_value = DEFAULT_CITY)]
    pub default_city: String,
}

impl InputArgs {
    fn source(&self) -> anyhow::Result<TaskSource> {
        let layout: InputLayout = self.layout.parse()?;
        let mut source = TaskSource::new(&self.input).with_layout(layout);
        if !self.default_city.trim().is_empty() {
            source = source.with_default_city(self.default_city.trim());
        }
        Ok(source)
    }
}

/// Output, regeneration and metadata flags shared by `generate` and `landing`.
#[derive(clap::Args, Debug, Clone)]
pub struct PublishArgs {
    /// Write previews only; never touch the store.
    #[arg(long)]
    pub preview_only: bool,

    /// Regenerate sections that miss their word window.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_fix: bool,

    /// Maximum passes per section, counting the first draft; 1 means no regeneration.
    #[arg(long, default_value_t = 3)]
    pub max_fix_passes: usize,

    /// Directory for HTML previews.
    #[arg(short = 'o', long, default_value = DEFAULT_PREVIEW_DIR)]
    pub output: PathBuf,

    /// Do not write HTML previews.
    #[arg(long)]
    pub no_preview: bool,

    /// Destination store (sqlite://path.db or postgres://...).
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub store_url: Option<String>,

    /// Store pages that still need review.
    #[arg(long)]
    pub persist_degraded: bool,

    /// Locale written into page metadata.
    #[arg(long, default_value = "en-IN")]
    pub locale: String,

    /// Site code written into page metadata.
    #[arg(long, default_value = "sqy-india-web")]
    pub site_code: String,

    /// Parent path segment of every page URL.
    #[arg(long, default_value = "area-convertor")]
    pub parent_slug: String,

    /// Host prepended to canonical URLs.
    #[arg(long, default_value = "https://www.squareyards.com")]
    pub canonical_host: String,
}

impl PublishArgs {
    fn apply(&self, config: PipelineConfig) -> PipelineConfig {
        let mut config = config
            .with_auto_fix(self.auto_fix)
            .with_max_fix_passes(self.max_fix_passes)
            .with_preview_only(self.preview_only)
            .with_persist_degraded(self.persist_degraded)
            .with_locale(self.locale.clone())
            .with_site_code(self.site_code.clone())
            .with_parent_slug(self.parent_slug.clone())
            .with_canonical_host(self.canonical_host.clone());
        if !self.no_preview {
            config = config.with_preview_dir(self.output.clone());
        }
        if let Some(url) = &self.store_url {
            config = config.with_store_url(url.clone());
        }
        config
    }
}

/// Arguments for `unit-forge generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Stop after this many pairs have been dispatched.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Batch-wide cap on regeneration calls.
    #[arg(long)]
    pub regeneration_budget: Option<usize>,

    /// Pairs processed at once.
    #[arg(short = 'c', long, default_value_t = 4)]
    pub concurrency: usize,

    #[command(flatten)]
    pub publish: PublishArgs,

    #[command(flatten)]
    pub llm: LlmArgs,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

impl GenerateArgs {
    fn config(&self) -> PipelineConfig {
        let config = PipelineConfig::new()
            .with_pair_limit(self.limit)
            .with_max_concurrency(self.concurrency)
            .with_regeneration_budget(self.regeneration_budget)
            .with_llm(self.llm.settings());
        self.publish.apply(config)
    }
}

/// Arguments for `unit-forge landing`.
#[derive(Parser, Debug)]
pub struct LandingArgs {
    /// CSV of conversion pairs whose unit labels the page should feature.
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,

    /// Input layout: auto, pairs or matrix.
    #[arg(long, default_value = "auto")]
    pub layout: String,

    /// Country the page is written for.
    #[arg(long, default_value = "India")]
    pub country: String,

    /// Use case to mention; repeat for several (defaults to real estate,
    /// construction and land measurement).
    #[arg(long = "use-case")]
    pub use_cases: Vec<String>,

    #[command(flatten)]
    pub publish: PublishArgs,

    #[command(flatten)]
    pub llm: LlmArgs,

    /// Output JSON report.
    #[arg(short = 'j', long)]
    pub json: bool,
}

impl LandingArgs {
    fn config(&self) -> PipelineConfig {
        self.publish
            .apply(PipelineConfig::new().with_llm(self.llm.settings()))
    }

    fn brief(&self, config: &PipelineConfig) -> anyhow::Result<LandingBrief> {
        let mut brief = LandingBrief::from_config(config).with_target_country(self.country.trim());
        if !self.use_cases.is_empty() {
            brief = brief.with_use_cases(self.use_cases.clone());
        }
        if let Some(input) = &self.input {
            let layout: InputLayout = self.layout.parse()?;
            let source = TaskSource::new(input).with_layout(layout);
            let tasks: Vec<ConversionPairTask> = source
                .load()
                .with_context(|| format!("Failed to read {}", source.path().display()))?
                .into_iter()
                .filter_map(|row| match row {
                    SourceRow::Task(task) => Some(task),
                    SourceRow::Malformed { .. } => None,
                })
                .collect();
            brief = brief.featuring_tasks(&tasks);
        }
        Ok(brief)
    }
}

/// Arguments for `unit-forge section`.
#[derive(Parser, Debug)]
pub struct SectionArgs {
    /// Conversion-page section to generate (why_convert, from_unit, to_unit, examples,
    /// technical, faq_block).
    #[arg(short = 's', long)]
    pub section: String,

    /// Source unit label, e.g. "Bigha – Assam".
    #[arg(long)]
    pub from_label: String,

    /// Target unit label, e.g. "Square Feet".
    #[arg(long)]
    pub to_label: String,

    /// Units of the target per one unit of the source.
    #[arg(long)]
    pub factor: f64,

    /// Source unit code (derived from the label when omitted).
    #[arg(long)]
    pub from_code: Option<String>,

    /// Target unit code (derived from the label when omitted).
    #[arg(long)]
    pub to_code: Option<String>,

    /// Source region (taken from the label, else Pan-India).
    #[arg(long)]
    pub from_region: Option<String>,

    /// Target region (taken from the label, else Pan-India).
    #[arg(long)]
    pub to_region: Option<String>,

    /// City to mention in examples.
    #[arg(long)]
    pub city: Option<String>,

    /// Maximum passes, counting the first draft; 1 means no regeneration.
    #[arg(long, default_value_t = 3)]
    pub max_fix_passes: usize,

    #[command(flatten)]
    pub llm: LlmArgs,

    /// Output JSON instead of text.
    #[arg(short = 'j', long)]
    pub json: bool,
}

impl SectionArgs {
    fn task(&self) -> anyhow::Result<ConversionPairTask> {
        let region = |explicit: &Option<String>, label: &str| {
            explicit
                .clone()
                .or_else(|| extract_region(label))
                .unwrap_or_else(|| PAN_INDIA.to_string())
        };
        ConversionPairTask::new(
            self.from_code
                .clone()
                .unwrap_or_else(|| normalize_unit_code(&self.from_label)),
            self.to_code
                .clone()
                .unwrap_or_else(|| normalize_unit_code(&self.to_label)),
            self.from_label.clone(),
            self.to_label.clone(),
            self.factor,
            region(&self.from_region, &self.from_label),
            region(&self.to_region, &self.to_label),
            self.city
                .clone()
                .or_else(|| guess_city(&self.from_label, &self.to_label, None)),
        )
        .map_err(|e| anyhow::anyhow!("Invalid pair: {}", e))
    }
}

/// Arguments for `unit-forge validate`.
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output JSON instead of text.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => run_generate_command(args).await,
        Commands::Landing(args) => run_landing_command(args).await,
        Commands::Section(args) => run_section_command(args).await,
        Commands::Validate(args) => run_validate_command(args),
    }
}

// ============================================================================
// Generate
// ============================================================================

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let config = args.config();
    config.validate().context("Invalid configuration")?;
    if config.auto_fix_is_inert() {
        warn!(
            max_fix_passes = config.max_fix_passes,
            "Auto-fix is on but --max-fix-passes counts the first draft; use 2 or more to regenerate"
        );
    }

    let provider = config
        .llm
        .client()
        .context("Failed to initialize LLM client. Provide --api-key or set OPENAI_API_KEY/LITELLM_API_KEY")?;
    info!(model = %config.llm.model, api_base = %config.llm.api_base, "Using chat-completions backend");

    let generator: Arc<dyn SectionGenerator> = Arc::new(
        LlmSectionGenerator::new(Arc::new(provider))
            .with_model(config.llm.model.clone())
            .with_temperature(config.llm.temperature)
            .with_policies(config.policies.clone()),
    );

    let sink = PersistenceSink::from_config(&config)
        .await
        .context("Failed to open destination store")?;

    let source = args.input.source()?;
    let rows = source
        .load()
        .with_context(|| format!("Failed to read {}", source.path().display()))?;

    let preview_dir = config.preview_dir.clone();
    let controller = BatchController::new(config, generator, sink);
    let start = std::time::Instant::now();
    let result = controller.run(rows).await;
    let elapsed = start.elapsed();

    if args.json {
        #[derive(Serialize)]
        struct GenerateOutput<'a> {
            #[serde(flatten)]
            summary: crate::pipeline::BatchSummary,
            render_failures: &'a [(String, String)],
            preview_dir: Option<String>,
            duration_secs: f64,
        }
        let output = GenerateOutput {
            summary: result.summary(),
            render_failures: &result.render_failures,
            preview_dir: preview_dir.map(|d| d.display().to_string()),
            duration_secs: elapsed.as_secs_f64(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_batch_report(&result, preview_dir.as_deref(), elapsed);
    }

    Ok(())
}

fn print_batch_report(
    result: &BatchRunResult,
    preview_dir: Option<&std::path::Path>,
    elapsed: std::time::Duration,
) {
    println!();
    println!("=== unit-forge run ===");
    println!(
        "Succeeded: {} ({} need review)",
        result.succeeded.len(),
        result.degraded_count()
    );
    println!("Skipped:   {}", result.skipped.len());
    println!("Duration:  {:.1}s", elapsed.as_secs_f64());
    if let Some(dir) = preview_dir {
        println!("Previews:  {}", dir.display());
    }

    for doc in result.succeeded.iter().filter(|d| d.needs_review()) {
        println!("  review {}: {}", doc.routing_slug, doc.review_summary());
    }
    for skipped in &result.skipped {
        println!("  skipped {}: {}", skipped.label, skipped.reason);
    }
    for (slug, reason) in &result.render_failures {
        println!("  preview failed {}: {}", slug, reason);
    }
}

// ============================================================================
// Landing
// ============================================================================

async fn run_landing_command(args: LandingArgs) -> anyhow::Result<()> {
    let config = args.config();
    config.validate().context("Invalid configuration")?;
    if config.auto_fix_is_inert() {
        warn!(
            max_fix_passes = config.max_fix_passes,
            "Auto-fix is on but --max-fix-passes counts the first draft; use 2 or more to regenerate"
        );
    }
    let brief = args.brief(&config)?;

    let provider = config
        .llm
        .client()
        .context("Failed to initialize LLM client. Provide --api-key or set OPENAI_API_KEY/LITELLM_API_KEY")?;
    info!(model = %config.llm.model, api_base = %config.llm.api_base, "Using chat-completions backend");

    let generator: Arc<dyn SectionGenerator<LandingBrief>> = Arc::new(
        LlmSectionGenerator::new(Arc::new(provider))
            .with_model(config.llm.model.clone())
            .with_temperature(config.llm.temperature)
            .with_policies(config.landing_policies.clone()),
    );

    let sink = PersistenceSink::from_config(&config)
        .await
        .context("Failed to open destination store")?;

    let preview_dir = config.preview_dir.clone();
    let report = LandingBuilder::new(config, generator, sink).build(&brief).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_landing_report(&report, preview_dir.as_deref());
    }
    Ok(())
}

fn print_landing_report(report: &LandingReport, preview_dir: Option<&std::path::Path>) {
    let doc = &report.document;
    println!();
    println!("=== unit-forge landing ===");
    println!("Page:     {}", doc.url_path);
    println!("Outcome:  {}", report.outcome);
    if let Some(dir) = preview_dir {
        println!("Preview:  {}", dir.display());
    }
    for result in doc.sections.values() {
        println!(
            "  {}: {} ({} words, {} pass(es))",
            result.key, result.status, result.word_count, result.passes_used
        );
    }
    if doc.needs_review() {
        println!("  review: {}", doc.review_summary());
    }
    if let Some(reason) = &report.render_failure {
        println!("  preview failed: {}", reason);
    }
}

// ============================================================================
// Section
// ============================================================================

async fn run_section_command(args: SectionArgs) -> anyhow::Result<()> {
    let key: SectionKey = args.section.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    if key.is_landing() {
        anyhow::bail!("{} is a landing-page section; use `unit-forge landing`", key);
    }
    let task = args.task()?;
    if args.max_fix_passes == 0 {
        anyhow::bail!("--max-fix-passes must be at least 1");
    }

    let settings = args.llm.settings();
    let provider = settings
        .client()
        .context("Failed to initialize LLM client. Provide --api-key or set OPENAI_API_KEY/LITELLM_API_KEY")?;
    let policy = default_policy(key);
    let generator: Arc<dyn SectionGenerator> = Arc::new(
        LlmSectionGenerator::new(Arc::new(provider))
            .with_model(settings.model.clone())
            .with_temperature(settings.temperature),
    );

    let orchestrator = RegenerationOrchestrator::new(generator, PipelineConfig::default().retry);
    let mut results = orchestrator
        .produce(&task, &[policy], args.max_fix_passes)
        .await;
    let result = results
        .remove(&key)
        .ok_or_else(|| anyhow::anyhow!("No result produced for {}", key))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_section(&task, &result);
    }
    Ok(())
}

fn print_section(task: &ConversionPairTask, result: &SectionResult) {
    println!("{} [{}]", task.identity(), result.key);
    println!(
        "status: {} | words: {} | passes: {}",
        result.status, result.word_count, result.passes_used
    );
    for issue in &result.issues {
        println!("  {}", issue);
    }
    if let Some(err) = &result.error {
        println!("  error: {}", err);
    }
    println!();
    match &result.body {
        SectionBody::Prose(html) => println!("{}", html),
        SectionBody::Faqs(faqs) => {
            for (i, faq) in faqs.iter().enumerate() {
                println!("Q{}: {}", i + 1, faq.question);
                println!("{}", faq.answer_html);
                println!();
            }
        }
        SectionBody::Highlights(blocks) => {
            for block in blocks {
                println!("{}: {}", block.heading, block.subheading);
            }
        }
    }
}

// ============================================================================
// Validate
// ============================================================================

#[derive(Debug, Serialize)]
struct ValidateOutput {
    input: String,
    pairs: usize,
    malformed: Vec<MalformedEntry>,
}

#[derive(Debug, Serialize)]
struct MalformedEntry {
    line: u64,
    reason: String,
}

fn run_validate_command(args: ValidateArgs) -> anyhow::Result<()> {
    let source = args.input.source()?;
    let rows = source
        .load()
        .with_context(|| format!("Failed to read {}", source.path().display()))?;

    let mut output = ValidateOutput {
        input: source.path().display().to_string(),
        pairs: 0,
        malformed: Vec::new(),
    };
    for row in rows {
        match row {
            SourceRow::Task(_) => output.pairs += 1,
            SourceRow::Malformed { line, reason } => {
                output.malformed.push(MalformedEntry { line, reason })
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}: {} pairs, {} malformed rows", output.input, output.pairs, output.malformed.len());
        for entry in &output.malformed {
            println!("  line {}: {}", entry.line, entry.reason);
        }
    }
    Ok(())
}
