//! Folder Listings and Cycle Cursors
//!
//! Listings are recursive and sorted, so a cycling cursor visits files in a
//! stable order regardless of directory iteration order.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use glob::MatchOptions;
use log::debug;
use regex::Regex;

use super::FunctionError;

/// Glob used by folder functions when none is given.
pub const DEFAULT_FILE_GLOB: &str = "*.safetensors";

/// Glob used by `from_file_in_folder` when none is given.
pub const DEFAULT_TEXT_GLOB: &str = "*.txt";

/// Which listing a folder function draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingKind {
    /// Paths relative to the folder (`in_folder`/`from_folder`)
    Relative,
    /// Absolute paths (`in_folder_absolute`/`from_folder_absolute`)
    Absolute,
    /// Paths relative to a folder of the models root
    Models,
}

/// Lists files under `folder` whose path matches `file_glob` at any depth.
///
/// Returned paths are relative to `folder`, sorted and free of duplicates.
/// Hidden entries and anything reached through a symlinked directory are
/// skipped.
pub fn list_folder(folder: &Path, file_glob: &str) -> Result<Vec<PathBuf>, FunctionError> {
    if !folder.is_dir() {
        return Err(FunctionError::FolderNotFound(folder.to_path_buf()));
    }

    let pattern = format!(
        "{}/**/{}",
        glob::Pattern::escape(&folder.to_string_lossy()),
        file_glob
    );
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let paths = glob::glob_with(&pattern, options).map_err(|e| FunctionError::InvalidGlob {
        pattern: file_glob.to_string(),
        message: e.msg.to_string(),
    })?;

    let mut files: Vec<PathBuf> = paths
        .filter_map(|result| result.ok())
        .filter(|path| path.is_file())
        .filter_map(|path| path.strip_prefix(folder).ok().map(Path::to_path_buf))
        .filter(|relative| !is_hidden(relative) && !through_symlink(folder, relative))
        .collect();
    files.sort();
    files.dedup();

    debug!(
        "Listed {} file(s) matching '{}' in {}",
        files.len(),
        file_glob,
        folder.display()
    );
    Ok(files)
}

fn is_hidden(relative: &Path) -> bool {
    relative
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

/// True when a directory between `root` and the file is a symlink.
fn through_symlink(root: &Path, relative: &Path) -> bool {
    let mut dir = root.to_path_buf();
    let Some(parent) = relative.parent() else {
        return false;
    };
    parent.components().any(|component| {
        dir.push(component);
        fs::symlink_metadata(&dir)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(true)
    })
}

/// Keeps items containing `pattern`, ignoring case.
pub fn match_substring(items: Vec<String>, pattern: &str) -> Vec<String> {
    let pattern = pattern.to_lowercase();
    items
        .into_iter()
        .filter(|item| item.to_lowercase().contains(&pattern))
        .collect()
}

/// Keeps items matching `pattern` at their start.
pub fn match_regex(items: Vec<String>, pattern: &str) -> Result<Vec<String>, FunctionError> {
    let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| FunctionError::InvalidRegex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    Ok(items.into_iter().filter(|item| regex.is_match(item)).collect())
}

/// Applies the optional substring and regex filters, in that order.
pub fn filter_collection(
    items: Vec<String>,
    match_pattern: Option<&str>,
    regex_pattern: Option<&str>,
) -> Result<Vec<String>, FunctionError> {
    let items = match match_pattern {
        Some(pattern) => match_substring(items, pattern),
        None => items,
    };
    match regex_pattern {
        Some(pattern) => match_regex(items, pattern),
        None => Ok(items),
    }
}

/// Identity of a cycling cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CycleKey {
    pub kind: ListingKind,
    pub folder: String,
    pub glob: String,
    pub match_pattern: Option<String>,
    pub regex_pattern: Option<String>,
}

#[derive(Debug)]
struct Cycle {
    items: Vec<String>,
    position: usize,
}

/// Round-robin cursors over filtered folder listings.
///
/// A cursor snapshots its list on first use and keeps visiting that
/// snapshot until the store is reset.
#[derive(Debug, Default)]
pub struct CycleStore {
    cycles: Mutex<HashMap<CycleKey, Cycle>>,
}

impl CycleStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next item for `key`, listing with `items` on first use.
    pub fn next<F>(&self, key: CycleKey, items: F) -> Result<String, FunctionError>
    where
        F: FnOnce() -> Result<Vec<String>, FunctionError>,
    {
        let mut cycles = self.cycles.lock().unwrap_or_else(|p| p.into_inner());

        if !cycles.contains_key(&key) {
            let snapshot = items()?;
            if snapshot.is_empty() {
                return Err(FunctionError::NoMatches {
                    folder: key.folder.clone(),
                    glob: key.glob.clone(),
                });
            }
            cycles.insert(
                key.clone(),
                Cycle {
                    items: snapshot,
                    position: 0,
                },
            );
        }

        let Some(cycle) = cycles.get_mut(&key) else {
            return Err(FunctionError::EmptyChoice);
        };
        let item = cycle.items[cycle.position % cycle.items.len()].clone();
        cycle.position += 1;

        debug!("Cycle {:?} -> {} (step {})", key.folder, item, cycle.position);
        Ok(item)
    }

    /// Number of live cursors.
    pub fn len(&self) -> usize {
        self.cycles.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cursor.
    pub fn reset(&self) {
        self.cycles.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}
