//! Learning store: remembers which filename tokens went with which brand, model and type.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use manuals_core::{
    CompletionStats, FilenameAssociation, LearningState, MetadataRecord, SuggestionField,
    Suggestions, association_key, tokenize,
};
use manuals_storage::LearningBackend;
use tracing::{debug, info};

use crate::suggest;

/// Explicit acknowledgement required by [`LearningStore::reset_all`].
///
/// Resetting discards every learned pattern and cannot be undone; only build one of these
/// after the user has confirmed.
#[derive(Debug)]
pub struct ResetConfirmation(());

impl ResetConfirmation {
    pub fn confirmed_by_user() -> Self {
        Self(())
    }
}

/// The learning state plus the backend it is persisted to after every change.
#[derive(Debug)]
pub struct LearningStore<B> {
    backend: B,
    state: LearningState,
    word_weight_cap: Option<u32>,
}

impl<B: LearningBackend> LearningStore<B> {
    pub fn open(backend: B) -> anyhow::Result<Self> {
        let state = backend.load_learning()?;
        debug!(
            "loaded learning state: {} brands, {} models, {} types, {} filenames",
            state.brand_patterns.len(),
            state.model_patterns.len(),
            state.type_patterns.len(),
            state.filename_associations.len()
        );
        Ok(Self {
            backend,
            state,
            word_weight_cap: None,
        })
    }

    /// Cap every associated-word counter at `cap`; `None` keeps them unbounded.
    pub fn with_word_weight_cap(mut self, cap: Option<u32>) -> Self {
        self.word_weight_cap = cap;
        self
    }

    pub fn state(&self) -> &LearningState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn completion_stats(&self) -> &CompletionStats {
        &self.state.completion_stats
    }

    pub fn suggest(&self, filename: &str) -> Suggestions {
        suggest::suggest(&self.state, filename)
    }

    pub fn record(&mut self, filename: &str, metadata: &MetadataRecord) -> anyhow::Result<()> {
        self.record_at(filename, metadata, Utc::now())
    }

    /// Learn from one saved manual.
    pub fn record_at(
        &mut self,
        filename: &str,
        metadata: &MetadataRecord,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let tokens = tokenize(filename);
        let brand_key = metadata.brand.trim().to_lowercase();

        for field in SuggestionField::ALL {
            let value = field_value(metadata, field).trim();
            if value.is_empty() {
                continue;
            }
            let pattern = self
                .state
                .patterns_mut(field)
                .entry(value.to_lowercase())
                .or_default();
            pattern.count += 1;
            pattern.original_value = value.to_string();
            for token in &tokens {
                let weight = pattern.associated_words.entry(token.clone()).or_insert(0);
                *weight += 1;
                if let Some(cap) = self.word_weight_cap {
                    *weight = (*weight).min(cap);
                }
            }
            if field == SuggestionField::Model {
                let brands = pattern.brands.get_or_insert_with(BTreeMap::new);
                if !brand_key.is_empty() {
                    *brands.entry(brand_key.clone()).or_insert(0) += 1;
                }
            }
        }

        self.state.filename_associations.insert(
            association_key(filename),
            FilenameAssociation {
                brand: metadata.brand.trim().to_string(),
                model: metadata.model.trim().to_string(),
                manual_type: metadata.manual_type.trim().to_string(),
                year: metadata.year,
                last_used: now,
            },
        );

        let stats = &mut self.state.completion_stats;
        stats.total_saved += 1;
        stats.last_saved = Some(now);

        self.backend.save_learning(&self.state)
    }

    /// Drop one learned value. Filename associations are left alone.
    ///
    /// Returns whether a pattern was removed.
    pub fn forget(&mut self, field: SuggestionField, value: &str) -> anyhow::Result<bool> {
        let removed = self
            .state
            .patterns_mut(field)
            .remove(&value.trim().to_lowercase())
            .is_some();
        if removed {
            info!("forgot {field} suggestion {value:?}");
            self.backend.save_learning(&self.state)?;
        }
        Ok(removed)
    }

    /// Wipe everything learned, including the filename cache and statistics.
    pub fn reset_all(&mut self, _confirmation: ResetConfirmation) -> anyhow::Result<()> {
        self.state = LearningState::default();
        info!("learning state reset");
        self.backend.save_learning(&self.state)
    }
}

fn field_value(metadata: &MetadataRecord, field: SuggestionField) -> &str {
    match field {
        SuggestionField::Brand => &metadata.brand,
        SuggestionField::Model => &metadata.model,
        SuggestionField::ManualType => &metadata.manual_type,
    }
}
