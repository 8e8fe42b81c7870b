//! LLM prompts for section generation.
//!
//! # Usage
//!
//! ```no_run
//! use unit_forge::prompts::build_section_prompt;
//! use unit_forge::sections::{default_policy, SectionKey};
//! use unit_forge::units::ConversionPairTask;
//!
//! let task = ConversionPairTask::new(
//!     "SQ_M", "SQ_FT", "Square Meter", "Square Feet", 10.7639,
//!     "Pan-India", "Pan-India", Some("Mumbai".to_string()),
//! )
//! .expect("valid task");
//! let prompt = build_section_prompt(&task, &default_policy(SectionKey::Examples))
//!     .expect("template renders");
//! assert!(prompt.user.contains("examples_section_html"));
//! ```

pub mod landing;
pub mod section;

pub use landing::{build_landing_prompt, DEFAULT_UNITS_PHRASE, LANDING_SYSTEM_PROMPT};
pub use section::{
    build_section_prompt, format_factor, section_instruction, SectionPrompt, DEFAULT_CITY_PHRASE,
    SECTION_SYSTEM_PROMPT,
};
