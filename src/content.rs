//! Content sources that may reference assets.
//!
//! Flat files are read as lossy UTF-8 text. Structured entries are JSON
//! documents re-serialized to a canonical compact form before matching.

use crate::errors::SweepError;

use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};

/// Flat content files under a root.
///
/// Listing is per item: an unreadable directory yields an error in place of
/// its files while every readable file is still listed.
pub trait ContentSource {
    fn list_all_files(&self) -> Vec<Result<PathBuf, SweepError>>;
    fn read_text(&self, file: &Path) -> Result<String, SweepError>;
}

/// A structured content entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: String,
    pub location: PathBuf,
}

/// Store of structured entries, present only when configured
pub trait EntryStore {
    fn list_all_entries(&self) -> Vec<Result<Entry, SweepError>>;
    fn serialize_data(&self, entry: &Entry) -> Result<String, SweepError>;
}

fn read_error(source: &Path, reason: impl ToString) -> SweepError {
    SweepError::ContentRead {
        source_name: source.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Recursively list regular files under `root` in file-name order
fn walk_files(root: &Path) -> Vec<Result<PathBuf, SweepError>> {
    if !root.is_dir() {
        return vec![Err(read_error(root, "content root is not a directory"))];
    }

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .ignore(false)
        .git_global(false)
        .git_exclude(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut files = Vec::new();
    for result in walker {
        match result {
            Ok(entry) if entry.file_type().is_some_and(|ft| ft.is_file()) => {
                files.push(Ok(entry.into_path()));
            }
            Ok(_) => {}
            Err(err) => files.push(Err(read_error(root, err))),
        }
    }
    files
}

/// Content files on disk
pub struct FsContentSource {
    root: PathBuf,
}

impl FsContentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ContentSource for FsContentSource {
    fn list_all_files(&self) -> Vec<Result<PathBuf, SweepError>> {
        walk_files(&self.root)
    }

    fn read_text(&self, file: &Path) -> Result<String, SweepError> {
        let bytes = fs::read(file).map_err(|e| read_error(file, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Entries stored as one `.json` document per file
pub struct JsonEntryStore {
    root: PathBuf,
}

impl JsonEntryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl EntryStore for JsonEntryStore {
    fn list_all_entries(&self) -> Vec<Result<Entry, SweepError>> {
        walk_files(&self.root)
            .into_iter()
            .filter(|item| match item {
                Ok(path) => path.extension().is_some_and(|ext| ext == "json"),
                Err(_) => true,
            })
            .map(|item| {
                item.map(|location| Entry {
                    id: location
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    location,
                })
            })
            .collect()
    }

    fn serialize_data(&self, entry: &Entry) -> Result<String, SweepError> {
        let raw = fs::read_to_string(&entry.location).map_err(|e| read_error(&entry.location, e))?;
        let data: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| read_error(&entry.location, e))?;
        serde_json::to_string(&data).map_err(|e| read_error(&entry.location, e))
    }
}
