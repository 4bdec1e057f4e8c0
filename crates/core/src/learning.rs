//! Learned suggestion state and the query result types built from it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Longest filename prefix (in characters) used as a filename-association key.
pub const ASSOCIATION_KEY_CHARS: usize = 50;

/// Tokens of this many characters or fewer are ignored.
pub const MIN_TOKEN_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SuggestionField {
    Brand,
    Model,
    ManualType,
}

impl SuggestionField {
    pub const ALL: [SuggestionField; 3] = [
        SuggestionField::Brand,
        SuggestionField::Model,
        SuggestionField::ManualType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionField::Brand => "brand",
            SuggestionField::Model => "model",
            SuggestionField::ManualType => "manualType",
        }
    }
}

impl std::fmt::Display for SuggestionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SuggestionField {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "brand" => Ok(SuggestionField::Brand),
            "model" => Ok(SuggestionField::Model),
            "manualtype" | "type" => Ok(SuggestionField::ManualType),
            _ => Err(Error::InvalidSuggestionType(value.to_string())),
        }
    }
}

/// What has been learned about one brand, model or type value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    /// Number of saves that contributed to this pattern.
    pub count: u32,
    /// Most recent casing the user typed.
    pub original_value: String,
    #[serde(default)]
    pub associated_words: BTreeMap<String, u32>,
    /// Brand co-occurrence; only kept for model patterns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brands: Option<BTreeMap<String, u32>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilenameAssociation {
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub manual_type: String,
    #[serde(default)]
    pub year: Option<i32>,
    pub last_used: DateTime<Utc>,
}

impl FilenameAssociation {
    pub fn value(&self, field: SuggestionField) -> &str {
        match field {
            SuggestionField::Brand => &self.brand,
            SuggestionField::Model => &self.model,
            SuggestionField::ManualType => &self.manual_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStats {
    pub total_saved: u64,
    #[serde(default)]
    pub last_saved: Option<DateTime<Utc>>,
}

/// The whole persisted learning state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningState {
    pub brand_patterns: BTreeMap<String, Pattern>,
    pub model_patterns: BTreeMap<String, Pattern>,
    pub type_patterns: BTreeMap<String, Pattern>,
    pub filename_associations: BTreeMap<String, FilenameAssociation>,
    pub completion_stats: CompletionStats,
}

impl LearningState {
    pub fn patterns(&self, field: SuggestionField) -> &BTreeMap<String, Pattern> {
        match field {
            SuggestionField::Brand => &self.brand_patterns,
            SuggestionField::Model => &self.model_patterns,
            SuggestionField::ManualType => &self.type_patterns,
        }
    }

    pub fn patterns_mut(&mut self, field: SuggestionField) -> &mut BTreeMap<String, Pattern> {
        match field {
            SuggestionField::Brand => &mut self.brand_patterns,
            SuggestionField::Model => &mut self.model_patterns,
            SuggestionField::ManualType => &mut self.type_patterns,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.brand_patterns.is_empty()
            && self.model_patterns.is_empty()
            && self.type_patterns.is_empty()
            && self.filename_associations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub value: String,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Suggestions {
    pub brand: Vec<Candidate>,
    pub model: Vec<Candidate>,
    pub manual_type: Vec<Candidate>,
    pub confidence: f64,
}

impl Suggestions {
    pub fn candidates(&self, field: SuggestionField) -> &[Candidate] {
        match field {
            SuggestionField::Brand => &self.brand,
            SuggestionField::Model => &self.model,
            SuggestionField::ManualType => &self.manual_type,
        }
    }

    pub fn candidates_mut(&mut self, field: SuggestionField) -> &mut Vec<Candidate> {
        match field {
            SuggestionField::Brand => &mut self.brand,
            SuggestionField::Model => &mut self.model,
            SuggestionField::ManualType => &mut self.manual_type,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.brand.is_empty() && self.model.is_empty() && self.manual_type.is_empty()
    }
}

/// Lower-case, split on every non-alphanumeric run, keep tokens longer than two characters.
pub fn tokenize(filename: &str) -> Vec<String> {
    filename
        .to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| token.chars().count() > MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// Lower-cased filename truncated to [`ASSOCIATION_KEY_CHARS`] characters.
pub fn association_key(filename: &str) -> String {
    filename
        .to_lowercase()
        .chars()
        .take(ASSOCIATION_KEY_CHARS)
        .collect()
}
