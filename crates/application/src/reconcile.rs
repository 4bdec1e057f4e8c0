//! The save workflow: validate form input, rename the PDF to match its title, persist the
//! sidecar, stamp the signature, then feed the learning store.

use std::path::{Path, PathBuf};

use manuals_core::{
    CoveredYears, DEFAULT_SIGNATURE, Error, MetadataForm, MetadataRecord, Result,
    ValidationError, covered_years, file_name_of, pdf_path_for_title, sidecar_path,
};
use manuals_engine::PdfCodec;
use manuals_storage::{CollisionPolicy, LearningBackend, rename_file, write_sidecar};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::learning::LearningStore;

/// Save stages, run strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Identity,
    Validate,
    YearRange,
    Merge,
    Filename,
    Rename,
    Persist,
    Signature,
    Learn,
}

pub const STAGES: [Stage; 9] = [
    Stage::Identity,
    Stage::Validate,
    Stage::YearRange,
    Stage::Merge,
    Stage::Filename,
    Stage::Rename,
    Stage::Persist,
    Stage::Signature,
    Stage::Learn,
];

/// Outcome of a stage that did not abort the save.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StageResult {
    Done,
    Degraded(String),
}

#[derive(Debug, Clone)]
pub struct SaveRequest {
    /// Where the PDF currently lives.
    pub pdf_path: PathBuf,
    /// The record loaded when the manual was selected, if any.
    pub previous: Option<MetadataRecord>,
    pub form: MetadataForm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Saved,
    /// Metadata is on disk, but later stages reported problems.
    PartialSuccess(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub pdf_path: PathBuf,
    pub sidecar_path: PathBuf,
    pub renamed_from: Option<PathBuf>,
    pub metadata: MetadataRecord,
    pub status: SaveStatus,
}

impl SaveOutcome {
    pub fn is_partial(&self) -> bool {
        matches!(self.status, SaveStatus::PartialSuccess(_))
    }

    /// One line for the user.
    pub fn message(&self) -> String {
        match &self.status {
            SaveStatus::Saved => format!("Saved \"{}\"", self.metadata.title),
            SaveStatus::PartialSuccess(notes) => format!(
                "Saved \"{}\" with warnings: {}",
                self.metadata.title,
                notes.join("; ")
            ),
        }
    }
}

/// Working state threaded through the stages of one save.
struct SaveRun {
    current: PathBuf,
    previous: MetadataRecord,
    form: MetadataForm,
    id: String,
    years: Option<CoveredYears>,
    metadata: MetadataRecord,
    target: PathBuf,
    renamed_from: Option<PathBuf>,
}

pub struct Reconciler<'a, C: ?Sized, B> {
    codec: &'a C,
    learning: &'a mut LearningStore<B>,
    signature: &'a str,
}

impl<'a, C, B> Reconciler<'a, C, B>
where
    C: PdfCodec + ?Sized,
    B: LearningBackend,
{
    pub fn new(codec: &'a C, learning: &'a mut LearningStore<B>) -> Self {
        Self {
            codec,
            learning,
            signature: DEFAULT_SIGNATURE,
        }
    }

    pub fn with_signature(mut self, signature: &'a str) -> Self {
        self.signature = signature;
        self
    }

    /// Run every stage in order. The first fatal error aborts the rest; stages already
    /// completed (a rename, say) are not undone.
    pub fn save(&mut self, request: SaveRequest) -> Result<SaveOutcome> {
        let mut run = SaveRun {
            current: request.pdf_path,
            previous: request.previous.unwrap_or_default(),
            form: request.form.normalized(),
            id: String::new(),
            years: None,
            metadata: MetadataRecord::default(),
            target: PathBuf::new(),
            renamed_from: None,
        };

        let mut notes = Vec::new();
        for stage in STAGES {
            match self.run_stage(stage, &mut run)? {
                StageResult::Done => {}
                StageResult::Degraded(note) => {
                    warn!(?stage, "{note}");
                    notes.push(note);
                }
            }
        }

        let status = if notes.is_empty() {
            SaveStatus::Saved
        } else {
            SaveStatus::PartialSuccess(notes)
        };
        info!("saved metadata for {}", run.current.display());
        Ok(SaveOutcome {
            sidecar_path: sidecar_path(&run.current),
            pdf_path: run.current,
            renamed_from: run.renamed_from,
            metadata: run.metadata,
            status,
        })
    }

    fn run_stage(&mut self, stage: Stage, run: &mut SaveRun) -> Result<StageResult> {
        match stage {
            Stage::Identity => {
                run.id = match run.previous.id.as_deref().map(str::trim) {
                    Some(id) if !id.is_empty() => id.to_string(),
                    _ => {
                        let id = Uuid::new_v4().to_string();
                        debug!("generated id {id}");
                        id
                    }
                };
            }
            Stage::Validate => {
                if run.form.title.is_empty() {
                    return Err(ValidationError::EmptyTitle.into());
                }
            }
            Stage::YearRange => {
                run.years = covered_years(run.form.year_range.as_deref(), run.form.year)
                    .map_err(ValidationError::from)?;
            }
            Stage::Merge => {
                run.metadata =
                    run.previous
                        .merged_with(&run.form, run.years.as_ref(), run.id.clone());
            }
            Stage::Filename => {
                run.target = pdf_path_for_title(&run.current, &run.metadata.title);
            }
            Stage::Rename => return rename_to_target(run),
            Stage::Persist => write_sidecar(&sidecar_path(&run.current), &run.metadata)?,
            Stage::Signature => return Ok(self.stamp_signature(run)),
            Stage::Learn => {
                let filename = file_name_of(&run.current);
                if let Err(err) = self.learning.record(&filename, &run.metadata) {
                    return Ok(StageResult::Degraded(format!(
                        "suggestions could not be updated: {err:#}"
                    )));
                }
            }
        }
        Ok(StageResult::Done)
    }

    fn stamp_signature(&self, run: &mut SaveRun) -> StageResult {
        if run.metadata.is_signed() {
            return StageResult::Done;
        }
        if let Err(err) = self.codec.set_producer(&run.current, self.signature) {
            return StageResult::Degraded(format!(
                "the PDF signature could not be added: {err:#}"
            ));
        }
        run.metadata.pdf_signature_added = true;
        match write_sidecar(&sidecar_path(&run.current), &run.metadata) {
            Ok(()) => StageResult::Done,
            Err(err) => StageResult::Degraded(format!(
                "the PDF was signed but the signature flag could not be saved: {err}"
            )),
        }
    }
}

fn rename_to_target(run: &mut SaveRun) -> Result<StageResult> {
    if same_path_ignoring_case(&run.current, &run.target) {
        return Ok(StageResult::Done);
    }
    if run.target.exists() {
        return Err(Error::Collision {
            name: file_name_of(&run.target),
            path: run.target.clone(),
        });
    }

    let old = run.current.clone();
    let new = rename_file(&old, &run.target, CollisionPolicy::Fail)?;
    info!("renamed {} -> {}", old.display(), new.display());

    let old_sidecar = sidecar_path(&old);
    if old_sidecar.exists()
        && let Err(err) = rename_file(&old_sidecar, &sidecar_path(&new), CollisionPolicy::Fail)
    {
        warn!("could not move sidecar {}: {err}", old_sidecar.display());
    }

    run.current = new;
    run.renamed_from = Some(old);
    Ok(StageResult::Done)
}

fn same_path_ignoring_case(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}
