//! Application orchestration for the manual library: relocation, learning, suggestions and
//! the save workflow, plus the in-memory catalog that ties them to a scanned directory.

use std::fs;
use std::path::{Path, PathBuf};

use manuals_core::{
    ManualRecord, MetadataRecord, Result, ScanScope, file_name_of, metadata_from_filename,
    sidecar_path,
};
use manuals_storage::{load_sidecar, scan};
use tracing::debug;

pub mod learning;
pub mod locate;
pub mod reconcile;
pub mod suggest;

pub use learning::{LearningStore, ResetConfirmation};
pub use locate::{Located, MatchKind, SIMILARITY_THRESHOLD, locate};
pub use reconcile::{Reconciler, STAGES, SaveOutcome, SaveRequest, SaveStatus, Stage};
pub use suggest::suggest;

/// Metadata for a PDF: its sidecar when one loads, else a guess from the filename.
///
/// The flag tells whether the sidecar was used.
pub fn load_metadata(pdf: &Path) -> (MetadataRecord, bool) {
    match load_sidecar(&sidecar_path(pdf)) {
        Some(record) => (record, true),
        None => {
            let filename = file_name_of(pdf);
            debug!("no sidecar for {filename}; guessing from the name");
            (metadata_from_filename(&filename), false)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub index: usize,
    pub path: PathBuf,
    pub metadata: MetadataRecord,
    pub from_sidecar: bool,
    /// Set when the manual had to be found under a new name.
    pub relocated: Option<Located>,
}

/// The scanned manuals and the current selection.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    manuals: Vec<ManualRecord>,
    selected: usize,
}

impl Catalog {
    pub fn from_scan(manuals: Vec<ManualRecord>) -> Self {
        Self {
            manuals,
            selected: 0,
        }
    }

    pub fn manuals(&self) -> &[ManualRecord] {
        &self.manuals
    }

    pub fn len(&self) -> usize {
        self.manuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manuals.is_empty()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Load metadata for every manual that has none yet.
    pub fn hydrate(&mut self) {
        for manual in self.manuals.iter_mut().filter(|m| m.metadata.is_none()) {
            manual.metadata = Some(load_metadata(&manual.path).0);
        }
    }

    pub fn position_of(&self, path: &Path) -> Option<usize> {
        self.manuals.iter().position(|m| m.path == path)
    }

    /// Catalog of the PDFs beside `pdf`, with the index of `pdf` itself.
    ///
    /// A `pdf` that no longer exists under its name is still listed so that
    /// [`Catalog::select`] can re-locate it.
    pub fn around(pdf: &Path) -> (Self, usize) {
        let parent = match pdf.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let dir = fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf());
        let path = dir.join(file_name_of(pdf));

        let mut catalog = Self::from_scan(scan(&dir, ScanScope::Direct));
        let index = match catalog.position_of(&path) {
            Some(index) => index,
            None => {
                debug!("{} is not in the listing of {}", path.display(), dir.display());
                catalog.manuals.push(ManualRecord::new(path, 0, None));
                catalog.manuals.len() - 1
            }
        };
        (catalog, index)
    }

    /// Select a manual, re-locating its file if it was renamed behind our back, and load
    /// its metadata. `Ok(None)` when `index` is past the end.
    ///
    /// A failed relocation leaves the previous selection in place.
    pub fn select(&mut self, mut index: usize) -> Result<Option<Selection>> {
        let Some(record) = self.manuals.get(index) else {
            return Ok(None);
        };
        let located = locate(&record.path)?;

        if located.was_renamed {
            // The new name may already be listed on its own.
            if let Some(duplicate) = self
                .manuals
                .iter()
                .enumerate()
                .position(|(i, m)| i != index && m.path == located.found_path)
            {
                self.manuals.remove(duplicate);
                if duplicate < index {
                    index -= 1;
                }
            }
            self.manuals[index].set_path(located.found_path.clone());
        }
        self.selected = index;

        let record = &mut self.manuals[index];
        let (metadata, from_sidecar) = load_metadata(&record.path);
        record.metadata = Some(metadata.clone());

        Ok(Some(Selection {
            index,
            path: record.path.clone(),
            metadata,
            from_sidecar,
            relocated: located.was_renamed.then_some(located),
        }))
    }

    /// Reflect a finished save in the list.
    pub fn apply_save(&mut self, index: usize, outcome: &SaveOutcome) {
        if let Some(record) = self.manuals.get_mut(index) {
            record.set_path(outcome.pdf_path.clone());
            record.metadata = Some(outcome.metadata.clone());
        }
    }

    /// Index after the selection, or `None` at the end.
    pub fn next(&self) -> Option<usize> {
        let next = self.selected + 1;
        (next < self.manuals.len()).then_some(next)
    }
}
