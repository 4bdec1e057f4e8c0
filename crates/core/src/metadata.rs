//! Sidecar metadata model and the input rules applied when saving it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::YearRangeError;

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

/// Filename stem used when a title sanitizes to nothing.
pub const FALLBACK_FILENAME: &str = "Untitled_Manual";

const KNOWN_MANUAL_TYPES: [&str; 5] = [
    "service",
    "user manual",
    "diagram",
    "electrical",
    "parts catalog",
];

/// Structured metadata persisted as `<name>.json` beside each PDF.
///
/// Keys this version does not know about are kept in `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub brand: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_range_data: Option<YearRangeData>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub all_covered_years: Vec<i32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub manual_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bike_type: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub language: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pdf_signature_added: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRangeData {
    pub start_year: i32,
    pub end_year: i32,
    pub original_range: String,
}

/// The user-editable subset of a [`MetadataRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataForm {
    pub title: String,
    pub brand: String,
    pub model: String,
    pub year: Option<i32>,
    pub year_range: Option<String>,
    pub manual_type: String,
    pub bike_type: Vec<String>,
    pub language: String,
    pub tags: Vec<String>,
    pub description: String,
}

impl MetadataForm {
    /// Prefill a form from a loaded record.
    pub fn from_record(record: &MetadataRecord) -> Self {
        Self {
            title: record.title.clone(),
            brand: record.brand.clone(),
            model: record.model.clone(),
            year: record.year,
            year_range: record.year_range.clone(),
            manual_type: record.manual_type.clone(),
            bike_type: record.bike_type.clone(),
            language: record.language.clone(),
            tags: record.tags.clone(),
            description: record.description.clone(),
        }
    }

    /// Trim free-text fields and drop empty or repeated list entries.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.title,
            &mut self.brand,
            &mut self.model,
            &mut self.manual_type,
            &mut self.language,
            &mut self.description,
        ] {
            *field = field.trim().to_string();
        }
        self.year_range = self
            .year_range
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let mut bike_type: Vec<String> = Vec::with_capacity(self.bike_type.len());
        for kind in self.bike_type.iter().map(|k| k.trim()) {
            if !kind.is_empty() && !bike_type.iter().any(|k| k == kind) {
                bike_type.push(kind.to_string());
            }
        }
        self.bike_type = bike_type;
        self.tags = self
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }
}

impl MetadataRecord {
    /// Shallow merge: `self` overlaid with every form field, then `id` applied last.
    ///
    /// Fields the form does not own (`pdfSignatureAdded`, unknown keys) survive.
    pub fn merged_with(
        &self,
        form: &MetadataForm,
        years: Option<&CoveredYears>,
        id: String,
    ) -> MetadataRecord {
        let mut out = self.clone();
        out.title = form.title.clone();
        out.brand = form.brand.clone();
        out.model = form.model.clone();
        out.year = form.year;
        out.year_range = form.year_range.clone();
        out.manual_type = form.manual_type.clone();
        out.bike_type = form.bike_type.clone();
        out.language = form.language.clone();
        out.tags = form.tags.clone();
        out.description = form.description.clone();
        match years {
            Some(years) => {
                out.year_range_data = years.range.as_ref().map(YearRange::to_data);
                out.all_covered_years = years.all.clone();
            }
            None => {
                out.year_range_data = None;
                out.all_covered_years = Vec::new();
            }
        }
        out.id = Some(id);
        out
    }

    pub fn is_signed(&self) -> bool {
        self.pdf_signature_added
    }

    /// `Brand Model (Year)` as shown in manual listings.
    pub fn summary(&self) -> String {
        let mut out = format!("{} {}", self.brand, self.model).trim().to_string();
        if let Some(year) = self.year {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&format!("({year})"));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearRange {
    pub start_year: i32,
    pub end_year: i32,
    pub original_range: String,
}

impl YearRange {
    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.start_year..=self.end_year
    }

    pub fn to_data(&self) -> YearRangeData {
        YearRangeData {
            start_year: self.start_year,
            end_year: self.end_year,
            original_range: self.original_range.clone(),
        }
    }
}

/// Parse `YYYY-YYYY` (hyphen, en dash or em dash), inclusive, within `[MIN_YEAR, MAX_YEAR]`.
pub fn parse_year_range(input: &str) -> Result<YearRange, YearRangeError> {
    let trimmed = input.trim();
    let format_err = || YearRangeError::Format(trimmed.to_string());

    let (start, end) = trimmed
        .split_once(['-', '\u{2013}', '\u{2014}'])
        .ok_or_else(format_err)?;
    let start = parse_four_digit_year(start.trim()).ok_or_else(format_err)?;
    let end = parse_four_digit_year(end.trim()).ok_or_else(format_err)?;

    if !(MIN_YEAR..=MAX_YEAR).contains(&start) || !(MIN_YEAR..=MAX_YEAR).contains(&end) {
        return Err(YearRangeError::OutOfBounds {
            min: MIN_YEAR,
            max: MAX_YEAR,
        });
    }
    if start > end {
        return Err(YearRangeError::Reversed { start, end });
    }

    Ok(YearRange {
        start_year: start,
        end_year: end,
        original_range: trimmed.to_string(),
    })
}

fn parse_four_digit_year(s: &str) -> Option<i32> {
    if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

/// Every year a manual covers: the range expansion plus the single year, sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoveredYears {
    pub range: Option<YearRange>,
    pub all: Vec<i32>,
}

pub fn covered_years(
    year_range: Option<&str>,
    year: Option<i32>,
) -> Result<Option<CoveredYears>, YearRangeError> {
    let range = match year_range.map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => Some(parse_year_range(raw)?),
        None => None,
    };

    let mut all: Vec<i32> = range.as_ref().map(|r| r.years().collect()).unwrap_or_default();
    if let Some(year) = year
        && !all.contains(&year)
    {
        all.push(year);
        all.sort_unstable();
    }

    if range.is_none() && all.is_empty() {
        return Ok(None);
    }
    Ok(Some(CoveredYears { range, all }))
}

/// Make a title safe to use as a filename stem.
///
/// Runs of whitespace and path-unsafe characters become one `_`; anything outside
/// `[A-Za-z0-9_.-]` is then dropped. An empty result falls back to [`FALLBACK_FILENAME`].
pub fn sanitize_title(title: &str) -> String {
    let mut replaced = String::with_capacity(title.len());
    let mut in_run = false;
    for ch in title.chars() {
        if ch.is_whitespace() || matches!(ch, '/' | '\\' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>') {
            if !in_run {
                replaced.push('_');
                in_run = true;
            }
        } else {
            replaced.push(ch);
            in_run = false;
        }
    }

    let out: String = replaced
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
        .collect();
    if out.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        out
    }
}

/// `<dir>/<sanitized title>.pdf`
pub fn pdf_path_for_title(current_pdf: &Path, title: &str) -> PathBuf {
    let dir = current_pdf.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{}.pdf", sanitize_title(title)))
}

/// The sidecar JSON path for a PDF: same stem, `.json` extension.
pub fn sidecar_path(pdf_path: &Path) -> PathBuf {
    pdf_path.with_extension("json")
}

/// Split comma-separated tag input into an ordered list.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Best-effort metadata guessed from a `Brand_Model_Year_Type.pdf` style filename.
pub fn metadata_from_filename(filename: &str) -> MetadataRecord {
    let stem = filename
        .strip_suffix(".pdf")
        .or_else(|| filename.strip_suffix(".PDF"))
        .unwrap_or(filename);
    let parts: Vec<&str> = stem.split('_').collect();

    let mut metadata = MetadataRecord {
        title: stem.to_string(),
        brand: parts.first().copied().unwrap_or_default().to_string(),
        ..MetadataRecord::default()
    };
    if let Some(model) = parts.get(1) {
        metadata.model = model.to_string();
    }
    if let Some(year) = parts.get(2) {
        metadata.year = parse_four_digit_year(year);
    }
    if let Some(kind) = parts.get(3) {
        let lower = kind.to_lowercase();
        if let Some(known) = KNOWN_MANUAL_TYPES.iter().find(|t| lower.contains(**t)) {
            metadata.manual_type = known.to_string();
        }
    }
    metadata
}

/// An explicit `null` reads the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
