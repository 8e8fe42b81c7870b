//! Conversion-pair catalogue: tasks, unit codes and the CSV task source.

pub mod codes;
pub mod source;
pub mod task;

pub use codes::{
    extract_region, guess_city, normalize_unit_code, validate_unit_code, DEFAULT_CITY,
    PAN_INDIA,
};
pub use source::{InputLayout, SourceRow, TaskSource};
pub use task::{ConversionPairTask, PairIdentity};
