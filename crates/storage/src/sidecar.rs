//! Sidecar JSON store: `<name>.json` beside every catalogued PDF.

use std::fs;
use std::io::{ErrorKind, Write as _};
use std::path::Path;

use manuals_core::{Error, MetadataRecord, Result};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Read and decode a sidecar file.
///
/// A missing file is [`Error::NotFound`], undecodable content is [`Error::Parse`].
pub fn read_sidecar(path: &Path) -> Result<MetadataRecord> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        Err(err) => {
            return Err(Error::io(format!("read {}", path.display()), err));
        }
    };
    serde_json::from_str(&text).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Like [`read_sidecar`] but for callers that fall back to other metadata.
///
/// Absent sidecars are expected and stay quiet; anything else is logged.
pub fn load_sidecar(path: &Path) -> Option<MetadataRecord> {
    match read_sidecar(path) {
        Ok(record) => {
            debug!("loaded metadata from {}", path.display());
            Some(record)
        }
        Err(Error::NotFound(_)) => None,
        Err(err) => {
            warn!("failed to read metadata from {}: {err}", path.display());
            None
        }
    }
}

/// Pretty-print `record` to `path` via a temp file in the same directory.
pub fn write_sidecar(path: &Path, record: &MetadataRecord) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let json = serde_json::to_vec_pretty(record)
        .map_err(|err| Error::io(format!("encode {}", path.display()), err.into()))?;

    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|err| Error::io(format!("create temp file in {}", dir.display()), err))?;
    temp.write_all(&json)
        .and_then(|()| temp.write_all(b"\n"))
        .map_err(|err| Error::io(format!("write {}", path.display()), err))?;
    inherit_permissions(&temp, path)?;
    temp.persist(path)
        .map_err(|err| Error::io(format!("write {}", path.display()), err.error))?;
    Ok(())
}

/// Temp files are created owner-only; give the sidecar the mode of the file it
/// replaces, else the mode of its PDF.
fn inherit_permissions(temp: &NamedTempFile, path: &Path) -> Result<()> {
    let permissions = [path.to_path_buf(), path.with_extension("pdf")]
        .into_iter()
        .find_map(|candidate| fs::metadata(candidate).ok().filter(|meta| meta.is_file()))
        .map(|meta| meta.permissions())
        .or_else(default_permissions);
    let Some(permissions) = permissions else {
        return Ok(());
    };
    temp.as_file()
        .set_permissions(permissions)
        .map_err(|err| Error::io(format!("set permissions for {}", path.display()), err))
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt as _;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}
