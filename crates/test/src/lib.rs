//! Test helpers and fixtures.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use manuals_core::{MetadataForm, MetadataRecord, ScanScope, Settings, sidecar_path};
use manuals_engine::{PdfCodec, PdfInfo};
use manuals_storage::write_sidecar;
use tempfile::TempDir;

pub fn make_settings(root: &Path) -> Settings {
    let mut settings = Settings {
        library_roots: vec![root.to_string_lossy().to_string()],
        scan_scope: ScanScope::Direct,
        ..Settings::default()
    };
    settings.normalize();
    settings
}

/// A throwaway directory of PDFs and sidecars.
pub struct TempLibrary {
    dir: TempDir,
}

impl TempLibrary {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create a placeholder PDF; its bytes are never parsed by the fake codec.
    pub fn add_pdf(&self, name: &str) -> anyhow::Result<PathBuf> {
        let path = self.path(name);
        fs::write(&path, b"%PDF-1.4\n%%EOF\n")?;
        Ok(path)
    }

    pub fn add_sidecar(&self, pdf: &Path, record: &MetadataRecord) -> anyhow::Result<PathBuf> {
        let path = sidecar_path(pdf);
        write_sidecar(&path, record)?;
        Ok(path)
    }

    /// File names in the library, sorted.
    pub fn entries(&self) -> anyhow::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.root())? {
            names.push(entry?.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }
}

/// Codec that records producer stamps instead of touching the file.
#[derive(Debug, Default)]
pub struct RecordingCodec {
    pub fail_stamps: bool,
    stamps: RefCell<Vec<(PathBuf, String)>>,
}

impl RecordingCodec {
    pub fn failing() -> Self {
        Self {
            fail_stamps: true,
            ..Self::default()
        }
    }

    pub fn stamps(&self) -> Vec<(PathBuf, String)> {
        self.stamps.borrow().clone()
    }
}

impl PdfCodec for RecordingCodec {
    fn read_metadata(&self, _path: &Path) -> anyhow::Result<PdfInfo> {
        let producer = self.stamps.borrow().last().map(|(_, p)| p.clone());
        Ok(PdfInfo {
            producer,
            ..PdfInfo::default()
        })
    }

    fn write_metadata(&self, _path: &Path, _info: &PdfInfo) -> anyhow::Result<()> {
        Ok(())
    }

    fn set_producer(&self, path: &Path, producer: &str) -> anyhow::Result<()> {
        if self.fail_stamps {
            anyhow::bail!("cannot write {}", path.display());
        }
        self.stamps
            .borrow_mut()
            .push((path.to_path_buf(), producer.to_string()));
        Ok(())
    }
}

pub fn service_form(title: &str, brand: &str, model: &str) -> MetadataForm {
    MetadataForm {
        title: title.to_string(),
        brand: brand.to_string(),
        model: model.to_string(),
        manual_type: "Service".to_string(),
        ..MetadataForm::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use manuals_application::{
        Catalog, LearningStore, MatchKind, Reconciler, SaveRequest, SaveStatus,
        suggest::EXACT_MATCH_REASON,
    };
    use manuals_core::{DEFAULT_SIGNATURE, Error, SuggestionField, parse_tags};
    use manuals_storage::{MemoryBackend, Storage, read_sidecar, scan_roots};

    #[test]
    fn builds_settings() {
        let settings = make_settings(Path::new("/library"));
        assert_eq!(settings.library_roots, vec!["/library".to_string()]);
        assert_eq!(settings.signature, DEFAULT_SIGNATURE);
    }

    #[test]
    fn save_then_outside_rename_then_select_recovers_manual() -> anyhow::Result<()> {
        let library = TempLibrary::new()?;
        library.add_pdf("scan_0042.pdf")?;
        let settings = make_settings(library.root());
        let mut catalog = Catalog::from_scan(scan_roots(&settings, library.root()));

        let selection = catalog.select(0)?.expect("selection");
        let codec = RecordingCodec::default();
        let mut store = LearningStore::open(MemoryBackend::new())?;
        let mut form = service_form("Honda CBR", "Honda", "CBR600");
        form.tags = parse_tags("engine, , wiring");
        let outcome = Reconciler::new(&codec, &mut store)
            .with_signature(&settings.signature)
            .save(SaveRequest {
                pdf_path: selection.path.clone(),
                previous: None,
                form,
            })?;
        catalog.apply_save(selection.index, &outcome);
        assert_eq!(library.entries()?, vec!["Honda_CBR.json", "Honda_CBR.pdf"]);
        assert_eq!(outcome.metadata.tags, vec!["engine", "wiring"]);

        // The user renames both files outside the application.
        fs::rename(library.path("Honda_CBR.pdf"), library.path("Honda_CBR_2005_shop.pdf"))?;
        fs::rename(
            library.path("Honda_CBR.json"),
            library.path("Honda_CBR_2005_shop.json"),
        )?;

        let again = catalog.select(0)?.expect("selection");
        let relocated = again.relocated.expect("relocated");
        assert_eq!(relocated.matched_by, Some(MatchKind::Sidecar));
        assert!(again.from_sidecar);
        assert_eq!(again.metadata.id, outcome.metadata.id);
        assert_eq!(catalog.manuals()[0].filename, "Honda_CBR_2005_shop.pdf");
        Ok(())
    }

    #[test]
    fn learning_survives_reopening_the_database() -> anyhow::Result<()> {
        let library = TempLibrary::new()?;
        let pdf = library.add_pdf("Honda_CBR600_2005_Service.pdf")?;
        let db = library.path("manuals.db");
        let codec = RecordingCodec::default();

        {
            let storage = Storage::open(&db)?;
            let mut store = LearningStore::open(&storage)?;
            let mut form = service_form("Honda_CBR600_2005_Service", "Honda", "CBR600");
            form.year = Some(2005);
            let outcome = Reconciler::new(&codec, &mut store).save(SaveRequest {
                pdf_path: pdf.clone(),
                previous: None,
                form,
            })?;
            assert_eq!(outcome.status, SaveStatus::Saved);
            assert!(outcome.renamed_from.is_none());
        }

        let storage = Storage::open(&db)?;
        let store = LearningStore::open(&storage)?;
        assert_eq!(store.completion_stats().total_saved, 1);

        let exact = store.suggest("Honda_CBR600_2005_Service.pdf");
        assert_eq!(exact.confidence, 0.9);
        assert_eq!(exact.brand[0].reason, EXACT_MATCH_REASON);

        let learned = store.suggest("Honda_CBR600_2007_Service.pdf");
        assert_eq!(learned.brand[0].value, "Honda");
        assert_eq!(learned.brand[0].reason, "learned from 1 files");
        assert_eq!(learned.confidence, 0.7);
        Ok(())
    }

    #[test]
    fn degraded_signature_still_saves_and_learns() -> anyhow::Result<()> {
        let library = TempLibrary::new()?;
        let pdf = library.add_pdf("Ducati_Monster.pdf")?;
        let codec = RecordingCodec::failing();
        let mut store = LearningStore::open(MemoryBackend::new())?;

        let outcome = Reconciler::new(&codec, &mut store).save(SaveRequest {
            pdf_path: pdf,
            previous: None,
            form: service_form("Ducati Monster", "Ducati", "Monster"),
        })?;

        assert!(matches!(outcome.status, SaveStatus::PartialSuccess(ref notes) if notes.len() == 1));
        let on_disk = read_sidecar(&outcome.sidecar_path)?;
        assert!(!on_disk.pdf_signature_added);
        assert!(codec.stamps().is_empty());
        assert!(store.state().brand_patterns.contains_key("ducati"));
        Ok(())
    }

    #[test]
    fn resave_keeps_identity_and_signs_once() -> anyhow::Result<()> {
        let library = TempLibrary::new()?;
        let pdf = library.add_pdf("Kawasaki_Z900.pdf")?;
        let codec = RecordingCodec::default();
        let mut store = LearningStore::open(MemoryBackend::new())?;

        let first = Reconciler::new(&codec, &mut store).save(SaveRequest {
            pdf_path: pdf,
            previous: None,
            form: service_form("Kawasaki Z900", "Kawasaki", "Z900"),
        })?;
        let mut form = service_form("Kawasaki Z900 Owners", "Kawasaki", "Z900");
        form.year_range = Some("2017\u{2013}2019".to_string());
        let second = Reconciler::new(&codec, &mut store).save(SaveRequest {
            pdf_path: first.pdf_path.clone(),
            previous: Some(first.metadata.clone()),
            form,
        })?;

        assert_eq!(second.metadata.id, first.metadata.id);
        assert_eq!(second.metadata.all_covered_years, vec![2017, 2018, 2019]);
        assert_eq!(codec.stamps().len(), 1);
        assert_eq!(
            codec.read_metadata(&second.pdf_path)?.producer.as_deref(),
            Some(DEFAULT_SIGNATURE)
        );
        assert_eq!(
            library.entries()?,
            vec!["Kawasaki_Z900_Owners.json", "Kawasaki_Z900_Owners.pdf"]
        );
        assert_eq!(store.completion_stats().total_saved, 2);
        assert_eq!(store.state().brand_patterns["kawasaki"].count, 2);
        Ok(())
    }

    #[test]
    fn collision_with_unrelated_manual_is_reported() -> anyhow::Result<()> {
        let library = TempLibrary::new()?;
        let pdf = library.add_pdf("scan.pdf")?;
        library.add_pdf("Suzuki_GSXR.pdf")?;
        let codec = RecordingCodec::default();
        let mut store = LearningStore::open(MemoryBackend::new())?;

        let err = Reconciler::new(&codec, &mut store)
            .save(SaveRequest {
                pdf_path: pdf,
                previous: None,
                form: service_form("Suzuki GSXR", "Suzuki", "GSXR"),
            })
            .unwrap_err();

        assert!(matches!(err, Error::Collision { .. }));
        assert!(err.to_string().contains("Suzuki_GSXR.pdf"));
        assert_eq!(library.entries()?, vec!["Suzuki_GSXR.pdf", "scan.pdf"]);
        assert!(!store.forget(SuggestionField::Brand, "Suzuki")?);
        Ok(())
    }

    #[test]
    fn selecting_legacy_sidecar_keeps_unknown_fields_on_save() -> anyhow::Result<()> {
        let library = TempLibrary::new()?;
        let pdf = library.add_pdf("BMW_R1200GS.pdf")?;
        let mut legacy = MetadataRecord {
            title: "BMW R1200GS".to_string(),
            brand: "BMW".to_string(),
            pdf_signature_added: true,
            ..MetadataRecord::default()
        };
        legacy.extra.insert("revision".to_string(), "3".into());
        library.add_sidecar(&pdf, &legacy)?;

        let settings = make_settings(library.root());
        let mut catalog = Catalog::from_scan(scan_roots(&settings, library.root()));
        let selection = catalog.select(0)?.expect("selection");
        assert!(selection.from_sidecar);
        assert!(selection.metadata.id.is_none());

        let codec = RecordingCodec::default();
        let mut store = LearningStore::open(MemoryBackend::new())?;
        let mut form = MetadataForm::from_record(&selection.metadata);
        form.model = "R1200GS".to_string();
        let outcome = Reconciler::new(&codec, &mut store).save(SaveRequest {
            pdf_path: selection.path,
            previous: Some(selection.metadata),
            form,
        })?;

        let on_disk = read_sidecar(&outcome.sidecar_path)?;
        assert!(on_disk.id.is_some());
        assert_eq!(on_disk.model, "R1200GS");
        assert_eq!(on_disk.extra["revision"], "3");
        assert!(codec.stamps().is_empty());
        assert_eq!(library.entries()?, vec!["BMW_R1200GS.json", "BMW_R1200GS.pdf"]);
        Ok(())
    }
}
