//! Core domain types for the manual library.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod error;
mod learning;
mod metadata;
mod similarity;

pub use error::{Error, Result, ValidationError, YearRangeError};
pub use learning::{
    ASSOCIATION_KEY_CHARS, Candidate, CompletionStats, FilenameAssociation, LearningState,
    MIN_TOKEN_CHARS, Pattern, SuggestionField, Suggestions, association_key, tokenize,
};
pub use metadata::{
    CoveredYears, FALLBACK_FILENAME, MAX_YEAR, MIN_YEAR, MetadataForm, MetadataRecord, YearRange,
    YearRangeData, covered_years, metadata_from_filename, parse_tags, parse_year_range,
    pdf_path_for_title, sanitize_title, sidecar_path,
};
pub use similarity::{edit_distance, similarity};

/// Producer string stamped into PDFs the first time their metadata is saved.
pub const DEFAULT_SIGNATURE: &str = "Processed by Moto-Manual.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub library_roots: Vec<String>,
    pub scan_scope: ScanScope,
    pub signature: String,
    /// Upper bound for a single associated-word counter; `None` leaves counters unbounded.
    pub word_weight_cap: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanScope {
    Direct,
    Recursive,
}

impl ScanScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanScope::Direct => "direct",
            ScanScope::Recursive => "recursive",
        }
    }
}

impl std::fmt::Display for ScanScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScanScope {
    type Err = &'static str;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(ScanScope::Direct),
            "recursive" => Ok(ScanScope::Recursive),
            _ => Err("unknown scan scope"),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            library_roots: Vec::new(),
            scan_scope: ScanScope::Recursive,
            signature: DEFAULT_SIGNATURE.to_string(),
            word_weight_cap: None,
        }
    }
}

impl Settings {
    pub fn normalize(&mut self) {
        self.library_roots = self
            .library_roots
            .iter()
            .map(|root| root.trim().to_string())
            .filter(|root| !root.is_empty())
            .collect();
        self.library_roots.sort();
        self.library_roots.dedup();

        self.signature = self.signature.trim().to_string();
        if self.signature.is_empty() {
            self.signature = DEFAULT_SIGNATURE.to_string();
        }
        self.word_weight_cap = self.word_weight_cap.filter(|cap| *cap > 0);
    }

    pub fn add_root(&mut self, root: &str) -> bool {
        let before = self.library_roots.len();
        self.library_roots.push(root.to_string());
        self.normalize();
        self.library_roots.len() != before
    }

    pub fn remove_root(&mut self, root: &str) -> bool {
        let before = self.library_roots.len();
        self.library_roots.retain(|r| r != root.trim());
        self.library_roots.len() != before
    }
}

/// One PDF discovered by a directory scan.
///
/// Lives only as long as the scan result; the sidecar JSON is the durable record.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualRecord {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub metadata: Option<MetadataRecord>,
}

impl ManualRecord {
    pub fn new(path: PathBuf, size: u64, last_modified: Option<DateTime<Utc>>) -> Self {
        let filename = file_name_of(&path);
        Self {
            path,
            filename,
            size,
            last_modified,
            metadata: None,
        }
    }

    /// Point the record at a new location after a rename or relocation.
    pub fn set_path(&mut self, path: PathBuf) {
        self.filename = file_name_of(&path);
        self.path = path;
    }

    /// Title shown in listings: the metadata title, else the filename without `.pdf`.
    pub fn display_title(&self) -> String {
        match &self.metadata {
            Some(m) if !m.title.trim().is_empty() => m.title.clone(),
            _ => file_stem_of(&self.path),
        }
    }
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn file_stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
