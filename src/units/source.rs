//! CSV task source.
//!
//! Two input shapes are accepted:
//! - a pair table with one row per conversion pair
//!   (`from_code,to_code,from_label,to_label,factor,from_region,to_region,city`);
//! - a conversion matrix whose first column holds source labels, whose header
//!   holds target labels and whose cells hold factors.
//!
//! Loading is lazy: rows are parsed as the returned iterator is consumed, and
//! calling [`TaskSource::load`] again reopens the file from the start.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::debug;

use super::codes::{extract_region, guess_city, normalize_unit_code, PAN_INDIA};
use super::task::ConversionPairTask;
use crate::error::TaskSourceError;

/// Shape of the CSV input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputLayout {
    /// Decide from the header row.
    #[default]
    Auto,
    /// One row per pair.
    Pairs,
    /// Source labels down, target labels across.
    Matrix,
}

impl FromStr for InputLayout {
    type Err = TaskSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(InputLayout::Auto),
            "pairs" | "pair" | "table" => Ok(InputLayout::Pairs),
            "matrix" => Ok(InputLayout::Matrix),
            other => Err(TaskSourceError::UnknownLayout(other.to_string())),
        }
    }
}

/// One item yielded by a task source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRow {
    Task(ConversionPairTask),
    /// The row (or matrix cell) could not become a task; loading continues.
    Malformed { line: u64, reason: String },
}

/// Lazily reads conversion-pair tasks from a CSV file.
#[derive(Debug, Clone)]
pub struct TaskSource {
    path: PathBuf,
    layout: InputLayout,
    default_city: Option<String>,
}

impl TaskSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            layout: InputLayout::Auto,
            default_city: None,
        }
    }

    pub fn with_layout(mut self, layout: InputLayout) -> Self {
        self.layout = layout;
        self
    }

    /// City used when neither the row nor the unit labels suggest one.
    pub fn with_default_city(mut self, city: impl Into<String>) -> Self {
        self.default_city = Some(city.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the input and return an iterator over its rows.
    ///
    /// # Errors
    ///
    /// Fails only when the file cannot be opened or its header cannot be read;
    /// problems with individual rows are yielded as [`SourceRow::Malformed`].
    pub fn load(&self) -> Result<Box<dyn Iterator<Item = SourceRow> + Send>, TaskSourceError> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_path(&self.path)
            .map_err(|e| TaskSourceError::Open {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(TaskSourceError::Header("input has no header row".to_string()));
        }

        let layout = match self.layout {
            InputLayout::Auto => detect_layout(&headers),
            explicit => explicit,
        };
        debug!(path = %self.path.display(), ?layout, "Opened task input");

        let default_city = self.default_city.clone();
        match layout {
            InputLayout::Pairs => {
                let columns = PairColumns::from_headers(&headers)?;
                Ok(Box::new(reader.into_records().map(move |record| match record {
                    Ok(record) => columns.parse(&record, default_city.as_deref()),
                    Err(err) => malformed_from_csv(err),
                })))
            }
            _ => {
                let targets: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
                if targets.is_empty() {
                    return Err(TaskSourceError::Header(
                        "matrix input needs at least one target column".to_string(),
                    ));
                }
                Ok(Box::new(reader.into_records().flat_map(move |record| {
                    match record {
                        Ok(record) => parse_matrix_row(&record, &targets, default_city.as_deref()),
                        Err(err) => vec![malformed_from_csv(err)],
                    }
                })))
            }
        }
    }
}

fn detect_layout(headers: &StringRecord) -> InputLayout {
    let has = |name: &str| headers.iter().any(|h| h.eq_ignore_ascii_case(name));
    if has("from_label") || has("from_code") {
        InputLayout::Pairs
    } else {
        InputLayout::Matrix
    }
}

fn malformed_from_csv(err: csv::Error) -> SourceRow {
    SourceRow::Malformed {
        line: err.position().map(|p| p.line()).unwrap_or(0),
        reason: err.to_string(),
    }
}

fn record_line(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Column positions of a pair-table header.
#[derive(Debug, Clone)]
struct PairColumns {
    index: HashMap<&'static str, usize>,
}

impl PairColumns {
    const KNOWN: [&'static str; 8] = [
        "from_code",
        "to_code",
        "from_label",
        "to_label",
        "factor",
        "from_region",
        "to_region",
        "city",
    ];

    fn from_headers(headers: &StringRecord) -> Result<Self, TaskSourceError> {
        let mut index = HashMap::new();
        for (pos, header) in headers.iter().enumerate() {
            let name = header.to_lowercase();
            let name = match name.as_str() {
                "city_hint" | "city_name" | "default_city" => "city",
                "factor_to_unit" => "factor",
                other => other,
            };
            if let Some(known) = Self::KNOWN.iter().find(|k| **k == name) {
                index.insert(*known, pos);
            }
        }

        for required in ["from_label", "to_label", "factor"] {
            if !index.contains_key(required) {
                return Err(TaskSourceError::Header(format!(
                    "pair table is missing the '{}' column",
                    required
                )));
            }
        }
        Ok(Self { index })
    }

    fn get<'r>(&self, record: &'r StringRecord, column: &str) -> Option<&'r str> {
        self.index
            .get(column)
            .and_then(|pos| record.get(*pos))
            .filter(|value| !value.is_empty())
    }

    fn parse(&self, record: &StringRecord, default_city: Option<&str>) -> SourceRow {
        let line = record_line(record);
        let malformed = |reason: String| SourceRow::Malformed { line, reason };

        let (Some(from_label), Some(to_label)) =
            (self.get(record, "from_label"), self.get(record, "to_label"))
        else {
            return malformed("missing unit label".to_string());
        };

        let factor = match self.get(record, "factor") {
            None => return malformed("missing factor".to_string()),
            Some(raw) => match parse_factor(raw) {
                Some(factor) => factor,
                None => return malformed(format!("factor '{}' is not a number", raw)),
            },
        };

        let draft = PairDraft {
            from_label,
            to_label,
            factor,
            from_code: self.get(record, "from_code"),
            to_code: self.get(record, "to_code"),
            from_region: self.get(record, "from_region"),
            to_region: self.get(record, "to_region"),
            city: self.get(record, "city"),
        };
        match draft.build(default_city) {
            Ok(task) => SourceRow::Task(task),
            Err(reason) => malformed(reason),
        }
    }
}

fn parse_factor(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

/// Cell values that mean "no conversion here" in a matrix.
fn is_blank_factor(raw: &str) -> bool {
    raw.is_empty()
        || raw.eq_ignore_ascii_case("nan")
        || raw == "-"
        || parse_factor(raw) == Some(0.0)
}

fn parse_matrix_row(
    record: &StringRecord,
    targets: &[String],
    default_city: Option<&str>,
) -> Vec<SourceRow> {
    let line = record_line(record);
    let Some(from_label) = record.get(0).filter(|l| !l.is_empty()) else {
        return vec![SourceRow::Malformed {
            line,
            reason: "matrix row has no source label".to_string(),
        }];
    };

    let mut rows = Vec::new();
    for (offset, to_label) in targets.iter().enumerate() {
        let raw = record.get(offset + 1).unwrap_or("");
        if is_blank_factor(raw) || from_label == to_label.trim() {
            continue;
        }

        let Some(factor) = parse_factor(raw) else {
            rows.push(SourceRow::Malformed {
                line,
                reason: format!(
                    "factor '{}' for {} -> {} is not a number",
                    raw, from_label, to_label
                ),
            });
            continue;
        };

        let draft = PairDraft {
            from_label,
            to_label,
            factor,
            from_code: None,
            to_code: None,
            from_region: None,
            to_region: None,
            city: None,
        };
        rows.push(match draft.build(default_city) {
            Ok(task) => SourceRow::Task(task),
            Err(reason) => SourceRow::Malformed { line, reason },
        });
    }
    rows
}

/// Raw field values before codes, regions and city are filled in.
struct PairDraft<'a> {
    from_label: &'a str,
    to_label: &'a str,
    factor: f64,
    from_code: Option<&'a str>,
    to_code: Option<&'a str>,
    from_region: Option<&'a str>,
    to_region: Option<&'a str>,
    city: Option<&'a str>,
}

impl PairDraft<'_> {
    fn build(self, default_city: Option<&str>) -> Result<ConversionPairTask, String> {
        let from_code = self
            .from_code
            .map(str::to_string)
            .unwrap_or_else(|| normalize_unit_code(self.from_label));
        let to_code = self
            .to_code
            .map(str::to_string)
            .unwrap_or_else(|| normalize_unit_code(self.to_label));

        let region_for = |given: Option<&str>, label: &str| {
            given
                .map(str::to_string)
                .or_else(|| extract_region(label))
                .unwrap_or_else(|| PAN_INDIA.to_string())
        };
        let from_region = region_for(self.from_region, self.from_label);
        let to_region = region_for(self.to_region, self.to_label);

        let city = self
            .city
            .map(str::to_string)
            .or_else(|| guess_city(self.from_label, self.to_label, default_city));

        ConversionPairTask::new(
            from_code,
            to_code,
            self.from_label,
            self.to_label,
            self.factor,
            from_region,
            to_region,
            city,
        )
    }
}
