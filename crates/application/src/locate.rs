//! Re-locating a PDF that was renamed since it was last indexed.

use std::path::{Path, PathBuf};

use manuals_core::{Error, Result, file_name_of, file_stem_of, sidecar_path, similarity};
use manuals_storage::{list_pdfs_in, read_sidecar};
use tracing::{debug, info};

/// Minimum name similarity for a candidate without a matching sidecar.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The candidate's sidecar title relates to the original name.
    Sidecar,
    /// The candidate's name is close enough to the original name.
    Similarity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub found_path: PathBuf,
    pub was_renamed: bool,
    pub original_name: Option<String>,
    pub new_name: Option<String>,
    pub similarity: Option<f64>,
    pub matched_by: Option<MatchKind>,
}

impl Located {
    fn unchanged(path: &Path) -> Self {
        Self {
            found_path: path.to_path_buf(),
            was_renamed: false,
            original_name: None,
            new_name: None,
            similarity: None,
            matched_by: None,
        }
    }

    fn renamed(original: &Path, found: PathBuf, kind: MatchKind, score: Option<f64>) -> Self {
        Self {
            original_name: Some(file_name_of(original)),
            new_name: Some(file_name_of(&found)),
            found_path: found,
            was_renamed: true,
            similarity: score,
            matched_by: Some(kind),
        }
    }
}

/// Find where the PDF last seen at `original` lives now.
///
/// An existing path is returned as is without listing the directory. Otherwise PDFs in
/// the same directory are tried, first by sidecar title, then by name similarity; within
/// each pass the first hit in listing order wins. Unreadable directories and sidecars
/// count as "no match".
pub fn locate(original: &Path) -> Result<Located> {
    if original.exists() {
        return Ok(Located::unchanged(original));
    }

    let dir = original.parent().unwrap_or_else(|| Path::new("."));
    let candidates = match list_pdfs_in(dir) {
        Ok(candidates) => candidates,
        Err(err) => {
            debug!("cannot list {}: {err}", dir.display());
            return Err(Error::NotFound(original.to_path_buf()));
        }
    };
    let original_stem = file_stem_of(original).to_lowercase();

    if let Some(found) = candidates
        .iter()
        .find(|candidate| sidecar_matches(candidate, &original_stem))
    {
        info!(
            "relocated {} to {} via sidecar",
            original.display(),
            found.display()
        );
        return Ok(Located::renamed(
            original,
            found.clone(),
            MatchKind::Sidecar,
            None,
        ));
    }

    for candidate in &candidates {
        let score = similarity(&original_stem, &file_stem_of(candidate).to_lowercase());
        if score > SIMILARITY_THRESHOLD {
            info!(
                "relocated {} to {} (similarity {score:.2})",
                original.display(),
                candidate.display()
            );
            return Ok(Located::renamed(
                original,
                candidate.clone(),
                MatchKind::Similarity,
                Some(score),
            ));
        }
    }

    Err(Error::NotFound(original.to_path_buf()))
}

fn sidecar_matches(candidate: &Path, original_stem: &str) -> bool {
    let record = match read_sidecar(&sidecar_path(candidate)) {
        Ok(record) => record,
        Err(Error::NotFound(_)) => return false,
        Err(err) => {
            debug!("ignoring sidecar of {}: {err}", candidate.display());
            return false;
        }
    };
    let title = record.title.trim().to_lowercase();
    let candidate_stem = file_stem_of(candidate).to_lowercase();

    contains_nonempty(original_stem, &title)
        || contains_nonempty(&title, original_stem)
        || contains_nonempty(&candidate_stem, original_stem)
        || contains_nonempty(original_stem, &candidate_stem)
}

fn contains_nonempty(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && !haystack.is_empty() && haystack.contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuals_core::MetadataRecord;
    use manuals_storage::write_sidecar;
    use std::fs;

    fn touch(path: &Path) {
        fs::write(path, b"%PDF-1.4\n").unwrap();
    }

    fn with_title(title: &str) -> MetadataRecord {
        MetadataRecord {
            title: title.to_string(),
            ..MetadataRecord::default()
        }
    }

    #[test]
    fn existing_file_is_returned_unchanged() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("Honda_CBR.pdf");
        touch(&path);

        let located = locate(&path)?;
        assert_eq!(located, Located::unchanged(&path));
        assert!(!located.was_renamed);
        Ok(())
    }

    #[test]
    fn existing_file_needs_no_readable_directory_listing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("Yamaha_R1.pdf");
        touch(&path);
        // A sibling that would win the similarity pass if the directory were scanned.
        touch(&dir.path().join("Yamaha_R1_.pdf"));
        assert_eq!(locate(&path)?.found_path, path);
        Ok(())
    }

    #[test]
    fn sidecar_title_relocates_renamed_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let renamed = dir.path().join("Honda_CBR.pdf");
        touch(&renamed);
        write_sidecar(&dir.path().join("Honda_CBR.json"), &with_title("Honda CBR"))?;

        let located = locate(&dir.path().join("Honda_CBR_2005.pdf"))?;
        assert!(located.was_renamed);
        assert_eq!(located.found_path, renamed);
        assert_eq!(located.matched_by, Some(MatchKind::Sidecar));
        assert_eq!(located.original_name.as_deref(), Some("Honda_CBR_2005.pdf"));
        assert_eq!(located.new_name.as_deref(), Some("Honda_CBR.pdf"));
        assert_eq!(located.similarity, None);
        Ok(())
    }

    #[test]
    fn sidecar_title_containing_original_name_matches() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let renamed = dir.path().join("Workshop_Manual.pdf");
        touch(&renamed);
        write_sidecar(
            &dir.path().join("Workshop_Manual.json"),
            &with_title("Complete ktm_990 adventure"),
        )?;

        let located = locate(&dir.path().join("KTM_990.pdf"))?;
        assert_eq!(located.found_path, renamed);
        Ok(())
    }

    #[test]
    fn sidecar_pass_beats_earlier_similarity_hit() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        touch(&dir.path().join("Suzuki_GSX_R.pdf"));
        let by_title = dir.path().join("Completely_Different.pdf");
        touch(&by_title);
        write_sidecar(
            &dir.path().join("Completely_Different.json"),
            &with_title("suzuki_gsx"),
        )?;

        let located = locate(&dir.path().join("Suzuki_GSX.pdf"))?;
        assert_eq!(located.found_path, by_title);
        assert_eq!(located.matched_by, Some(MatchKind::Sidecar));
        Ok(())
    }

    #[test]
    fn similar_name_relocates_without_sidecar() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let renamed = dir.path().join("Yamahaa_R1.pdf");
        touch(&renamed);
        touch(&dir.path().join("Kawasaki_Z900.pdf"));

        let located = locate(&dir.path().join("Yamaha_R1.pdf"))?;
        assert_eq!(located.found_path, renamed);
        assert_eq!(located.matched_by, Some(MatchKind::Similarity));
        assert!(located.similarity.unwrap() > SIMILARITY_THRESHOLD);
        Ok(())
    }

    #[test]
    fn corrupt_sidecar_falls_through_to_similarity() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let renamed = dir.path().join("Yamahaa_R1.pdf");
        touch(&renamed);
        fs::write(dir.path().join("Yamahaa_R1.json"), "{ broken")?;

        let located = locate(&dir.path().join("Yamaha_R1.pdf"))?;
        assert_eq!(located.matched_by, Some(MatchKind::Similarity));
        Ok(())
    }

    #[test]
    fn unrelated_files_are_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        touch(&dir.path().join("Kawasaki_Z900.pdf"));
        write_sidecar(
            &dir.path().join("Kawasaki_Z900.json"),
            &with_title("Kawasaki Z900"),
        )?;

        let err = locate(&dir.path().join("Honda_CBR.pdf")).unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = locate(&dir.path().join("gone").join("x.pdf")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn empty_sidecar_title_does_not_match_everything() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        touch(&dir.path().join("Kawasaki_Z900.pdf"));
        write_sidecar(&dir.path().join("Kawasaki_Z900.json"), &with_title("  "))?;

        assert!(locate(&dir.path().join("Honda_CBR.pdf")).is_err());
        Ok(())
    }
}
