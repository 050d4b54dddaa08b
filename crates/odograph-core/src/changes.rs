//! Change-based selection of the modules worth re-parsing.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::FileFilter;
use crate::scanner::{ModuleInfo, ModuleScanner};
use crate::state::StateStore;

/// What the next run should do.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStrategy {
    /// Re-parse everything (and the caller may clear the graph).
    pub full_reload: bool,
    /// The modules to process.
    pub modules: Vec<ModuleInfo>,
    /// Human-readable reason, shown to the user.
    pub reason: String,
}

/// Every file whose content participates in a module's change state: the
/// manifest, non-test Python sources, and all XML. Sorted for stable
/// hashing order.
pub fn relevant_files(filter: &FileFilter, module_path: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if let Some(manifest) = ModuleScanner::find_manifest(module_path) {
        files.push(manifest);
    }

    for entry in WalkDir::new(module_path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let relevant = match path.extension().and_then(|e| e.to_str()) {
            Some("py") => !filter.excludes_source(path),
            Some("xml") => true,
            _ => false,
        };
        if relevant && !files.contains(&path.to_path_buf()) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files
}

/// Compares the current corpus against the state store.
pub struct ChangeDetector<'a> {
    state: &'a StateStore,
    filter: &'a FileFilter,
    /// Changed-module ratio above which a full reload wins.
    threshold: f64,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(state: &'a StateStore, filter: &'a FileFilter, threshold: f64) -> Self {
        Self {
            state,
            filter,
            threshold,
        }
    }

    /// A module changed when any of its relevant files did.
    pub fn module_changed(&self, module_path: &Path) -> bool {
        relevant_files(self.filter, module_path)
            .iter()
            .any(|file| self.state.has_changed(file))
    }

    /// Decide between a full reload and an incremental one.
    pub fn strategy(&self, modules: &[ModuleInfo]) -> UpdateStrategy {
        if self.state.last_update().is_none() {
            return UpdateStrategy {
                full_reload: true,
                modules: modules.to_vec(),
                reason: "first run - no previous state".to_string(),
            };
        }

        let changed: Vec<ModuleInfo> = modules
            .iter()
            .filter(|module| self.module_changed(&module.path))
            .cloned()
            .collect();

        let ratio = if modules.is_empty() {
            0.0
        } else {
            changed.len() as f64 / modules.len() as f64
        };

        if ratio > self.threshold {
            return UpdateStrategy {
                full_reload: true,
                modules: modules.to_vec(),
                reason: format!("many changes detected ({:.1}%)", ratio * 100.0),
            };
        }

        UpdateStrategy {
            full_reload: false,
            reason: format!("{} modified modules", changed.len()),
            modules: changed,
        }
    }
}
