//! Pipeline configuration.
//!
//! Everything the batch needs is carried in [`PipelineConfig`] and handed to
//! the controller explicitly; nothing inside the pipeline reads the process
//! environment.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::generation::RetryPolicy;
use crate::llm::{
    LiteLlmClient, DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT,
};
use crate::sections::{default_policies, landing_policies, SectionPolicy, SectionShape};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is missing.
    #[error("Missing setting: {0}")]
    Missing(String),

    /// A setting has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Connection settings for the chat-completions backend.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl LlmSettings {
    /// Read settings from the environment.
    ///
    /// - `LITELLM_API_BASE`: Base URL (default: OpenAI API)
    /// - `OPENAI_API_KEY` or `LITELLM_API_KEY`: API key
    /// - `LITELLM_DEFAULT_MODEL`: Model (default: [`DEFAULT_MODEL`])
    /// - `LITELLM_TIMEOUT_SECS`: Request timeout in seconds (default: 120)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base: std::env::var("LITELLM_API_BASE").unwrap_or(defaults.api_base),
            api_key: std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("LITELLM_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: std::env::var("LITELLM_DEFAULT_MODEL").unwrap_or(defaults.model),
            temperature: defaults.temperature,
            timeout: std::env::var("LITELLM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Validates the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            return Err(ConfigError::Missing(
                "API key (OPENAI_API_KEY or LITELLM_API_KEY)".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the HTTP client described by these settings.
    pub fn client(&self) -> Result<LiteLlmClient, ConfigError> {
        self.validate()?;
        Ok(LiteLlmClient::new(
            self.api_base.clone(),
            self.api_key.clone(),
            self.model.clone(),
        )
        .with_timeout(self.timeout))
    }
}

/// Configuration for one batch run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Batch shape
    /// Stop dispatching after this many tasks.
    pub pair_limit: Option<usize>,
    /// Maximum number of tasks processed at once.
    pub max_concurrency: usize,

    // Regeneration
    /// Whether non-compliant sections are regenerated at all.
    pub auto_fix: bool,
    /// Cap on passes per section, counting the initial draft.
    pub max_fix_passes: usize,
    /// Batch-wide cap on regeneration calls; `None` is unlimited.
    pub regeneration_budget: Option<usize>,
    /// Backoff for transient generation failures.
    pub retry: RetryPolicy,
    /// Length policy table for conversion pages, one entry per section.
    pub policies: Vec<SectionPolicy>,
    /// Length policy table for the landing page.
    pub landing_policies: Vec<SectionPolicy>,

    // Output
    /// Skip the store; only previews are written.
    pub preview_only: bool,
    /// Store documents that still need review after the last pass.
    pub persist_degraded: bool,
    /// Directory for HTML previews.
    pub preview_dir: Option<PathBuf>,
    /// Destination store connection string (`sqlite://...` or `postgres://...`).
    pub store_url: Option<String>,

    // Document metadata
    pub locale: String,
    pub site_code: String,
    pub parent_slug: String,
    pub canonical_host: String,

    /// Generation backend.
    pub llm: LlmSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pair_limit: None,
            max_concurrency: 4,

            auto_fix: true,
            max_fix_passes: 3,
            regeneration_budget: None,
            retry: RetryPolicy::default(),
            policies: default_policies(),
            landing_policies: landing_policies(),

            preview_only: false,
            persist_degraded: false,
            preview_dir: None,
            store_url: None,

            locale: "en-IN".to_string(),
            site_code: "sqy-india-web".to_string(),
            parent_slug: "area-convertor".to_string(),
            canonical_host: "https://www.squareyards.com".to_string(),

            llm: LlmSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass cap actually applied: with auto-fix off only the draft is made.
    pub fn effective_max_passes(&self) -> usize {
        if self.auto_fix {
            self.max_fix_passes
        } else {
            1
        }
    }

    /// Auto-fix is on but the pass cap leaves no room for a regeneration.
    pub fn auto_fix_is_inert(&self) -> bool {
        self.auto_fix && self.max_fix_passes == 1
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.max_fix_passes == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_fix_passes must be at least 1".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        check_policy_table("policies", &self.policies, false)?;
        check_policy_table("landing_policies", &self.landing_policies, true)?;

        for (key, value) in [
            ("locale", &self.locale),
            ("site_code", &self.site_code),
            ("parent_slug", &self.parent_slug),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} cannot be empty",
                    key
                )));
            }
        }

        if !self
            .parent_slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ConfigError::InvalidValue {
                key: "parent_slug".to_string(),
                message: format!("'{}' is not a URL-safe slug", self.parent_slug),
            });
        }

        if !(self.canonical_host.starts_with("http://")
            || self.canonical_host.starts_with("https://"))
        {
            return Err(ConfigError::InvalidValue {
                key: "canonical_host".to_string(),
                message: format!("'{}' must start with http:// or https://", self.canonical_host),
            });
        }

        if !self.preview_only && self.store_url.as_deref().map_or(false, |u| u.trim().is_empty()) {
            return Err(ConfigError::ValidationFailed(
                "store_url cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_pair_limit(mut self, limit: Option<usize>) -> Self {
        self.pair_limit = limit;
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn with_auto_fix(mut self, enabled: bool) -> Self {
        self.auto_fix = enabled;
        self
    }

    pub fn with_max_fix_passes(mut self, passes: usize) -> Self {
        self.max_fix_passes = passes;
        self
    }

    pub fn with_regeneration_budget(mut self, budget: Option<usize>) -> Self {
        self.regeneration_budget = budget;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_policies(mut self, policies: Vec<SectionPolicy>) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_landing_policies(mut self, policies: Vec<SectionPolicy>) -> Self {
        self.landing_policies = policies;
        self
    }

    pub fn with_preview_only(mut self, enabled: bool) -> Self {
        self.preview_only = enabled;
        self
    }

    pub fn with_persist_degraded(mut self, enabled: bool) -> Self {
        self.persist_degraded = enabled;
        self
    }

    pub fn with_preview_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.preview_dir = Some(dir.into());
        self
    }

    pub fn with_store_url(mut self, url: impl Into<String>) -> Self {
        self.store_url = Some(url.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_site_code(mut self, site_code: impl Into<String>) -> Self {
        self.site_code = site_code.into();
        self
    }

    pub fn with_parent_slug(mut self, parent_slug: impl Into<String>) -> Self {
        self.parent_slug = parent_slug.into();
        self
    }

    pub fn with_canonical_host(mut self, host: impl Into<String>) -> Self {
        self.canonical_host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_llm(mut self, llm: LlmSettings) -> Self {
        self.llm = llm;
        self
    }
}

/// A table must be non-empty, list each section once, hold only sections of
/// its page kind and have ordered windows.
fn check_policy_table(
    name: &str,
    policies: &[SectionPolicy],
    landing: bool,
) -> Result<(), ConfigError> {
    if policies.is_empty() {
        return Err(ConfigError::ValidationFailed(format!(
            "{} cannot be empty",
            name
        )));
    }

    let mut seen = HashSet::new();
    for policy in policies {
        if policy.key.is_landing() != landing {
            return Err(ConfigError::ValidationFailed(format!(
                "{} cannot include section {}",
                name, policy.key
            )));
        }
        if !seen.insert(policy.key) {
            return Err(ConfigError::ValidationFailed(format!(
                "{} list section {} twice",
                name, policy.key
            )));
        }
        if policy.min_words > policy.max_words {
            return Err(ConfigError::ValidationFailed(format!(
                "policy for {} has min_words above max_words",
                policy.key
            )));
        }
        if let SectionShape::Collection {
            min_items,
            max_items,
        } = policy.shape
        {
            if min_items > max_items {
                return Err(ConfigError::ValidationFailed(format!(
                    "policy for {} has min_items above max_items",
                    policy.key
                )));
            }
        }
    }
    Ok(())
}
