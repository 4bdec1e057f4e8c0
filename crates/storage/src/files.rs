//! Directory scanning and file renaming.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use manuals_core::{Error, ManualRecord, Result, ScanScope, Settings, file_name_of, is_pdf};
use tracing::{debug, warn};

/// Attempts at `name_N.ext` before a suffixed rename gives up.
pub const MAX_SUFFIX_ATTEMPTS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Pick the first free `name_1.ext`, `name_2.ext`, ...
    Suffix,
    /// Refuse with [`Error::Collision`].
    Fail,
}

/// Enumerate PDFs under `root`.
///
/// Unreadable directories and entries are logged and skipped; a missing root yields nothing.
pub fn scan(root: &Path, scope: ScanScope) -> Vec<ManualRecord> {
    let mut found = BTreeMap::<PathBuf, ManualRecord>::new();
    scan_into(&mut found, root, scope);
    found.into_values().collect()
}

/// Scan every configured library root; relative roots resolve against `cwd`.
pub fn scan_roots(settings: &Settings, cwd: &Path) -> Vec<ManualRecord> {
    let mut found = BTreeMap::<PathBuf, ManualRecord>::new();
    for root in &settings.library_roots {
        let root_path = PathBuf::from(root);
        let root_path = if root_path.is_absolute() {
            root_path
        } else {
            cwd.join(root_path)
        };
        scan_into(&mut found, &root_path, settings.scan_scope);
    }
    found.into_values().collect()
}

fn scan_into(found: &mut BTreeMap<PathBuf, ManualRecord>, root: &Path, scope: ScanScope) {
    if root.is_file() {
        if is_pdf(root) {
            add_manual(found, root);
        }
        return;
    }
    if !root.is_dir() {
        debug!("scan root {} does not exist", root.display());
        return;
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("skipping unreadable directory {}: {err}", dir.display());
                continue;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping unreadable entry in {}: {err}", dir.display());
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                if scope == ScanScope::Recursive {
                    stack.push(path);
                }
            } else if path.is_file() && is_pdf(&path) {
                add_manual(found, &path);
            }
        }
    }
}

fn add_manual(out: &mut BTreeMap<PathBuf, ManualRecord>, path: &Path) {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) => {
            warn!("skipping {}: {err}", path.display());
            return;
        }
    };
    let normalized = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let last_modified = meta.modified().ok().map(DateTime::<Utc>::from);
    out.insert(
        normalized.clone(),
        ManualRecord::new(normalized, meta.len(), last_modified),
    );
}

/// PDFs directly inside `dir`, in directory listing order.
pub fn list_pdfs_in(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_pdf(&path) {
            out.push(path);
        }
    }
    Ok(out)
}

/// Rename `old` to `new`, returning where the file ended up.
///
/// An occupied `new` is resolved by `policy`. Renames across filesystems fall back to
/// copy, verify, then delete the source.
pub fn rename_file(old: &Path, new: &Path, policy: CollisionPolicy) -> Result<PathBuf> {
    if !old.exists() {
        return Err(Error::NotFound(old.to_path_buf()));
    }
    if old == new {
        return Ok(new.to_path_buf());
    }

    let target = if new.exists() {
        match policy {
            CollisionPolicy::Fail => {
                return Err(Error::Collision {
                    name: file_name_of(new),
                    path: new.to_path_buf(),
                });
            }
            CollisionPolicy::Suffix => free_suffixed_path(new).ok_or_else(|| Error::Collision {
                name: file_name_of(new),
                path: new.to_path_buf(),
            })?,
        }
    } else {
        new.to_path_buf()
    };

    match fs::rename(old, &target) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::CrossesDevices => {
            debug!(
                "rename {} crosses devices; copying instead",
                old.display()
            );
            move_by_copy(old, &target)?;
        }
        Err(err) => {
            return Err(Error::io(
                format!("rename {} to {}", old.display(), target.display()),
                err,
            ));
        }
    }
    Ok(target)
}

fn move_by_copy(old: &Path, target: &Path) -> Result<()> {
    fs::copy(old, target).map_err(|err| {
        Error::io(
            format!("copy {} to {}", old.display(), target.display()),
            err,
        )
    })?;
    if !target.exists() {
        return Err(Error::io(
            format!("copy {} to {}", old.display(), target.display()),
            io::Error::other("copied file is missing"),
        ));
    }
    fs::remove_file(old).map_err(|err| Error::io(format!("remove {}", old.display()), err))
}

fn free_suffixed_path(path: &Path) -> Option<PathBuf> {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|s| format!(".{}", s.to_string_lossy()))
        .unwrap_or_default();

    (1..=MAX_SUFFIX_ATTEMPTS)
        .map(|n| dir.join(format!("{stem}_{n}{ext}")))
        .find(|candidate| !candidate.exists())
}
