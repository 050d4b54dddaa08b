//! Discovery of Odoo modules in a source tree.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{CoreError, CoreResult};
use crate::literal::{self, Literal};

/// Manifest file names, in recognition order.
pub const MANIFEST_FILES: [&str; 2] = ["__manifest__.py", "__openerp__.py"];

/// A discovered module and its manifest metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Directory name; the module identity across the corpus.
    pub name: String,
    /// Absolute path of the module directory.
    pub path: PathBuf,
    pub version: String,
    pub depends: Vec<String>,
    pub description: String,
    pub author: String,
    pub category: String,
    pub installable: bool,
    pub auto_install: bool,
}

/// Walks a root directory and emits a [`ModuleInfo`] for every directory
/// holding a recognized manifest.
pub struct ModuleScanner {
    root: PathBuf,
}

impl ModuleScanner {
    pub fn new(root: impl Into<PathBuf>) -> CoreResult<Self> {
        let root = root.into();
        if !root.exists() {
            return Err(CoreError::MissingRoot(root));
        }
        Ok(Self { root })
    }

    /// Scan the corpus. Unreadable or invalid manifests skip their module
    /// with a warning; the scan itself never fails. Results are sorted by
    /// module name so downstream work is deterministic.
    pub fn scan(&self) -> Vec<ModuleInfo> {
        let mut modules: Vec<ModuleInfo> = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| {
                let manifest = Self::find_manifest(entry.path())?;
                self.parse_module(entry.path(), &manifest)
            })
            .collect();

        modules.sort_by(|a, b| a.name.cmp(&b.name));
        modules
    }

    /// First recognized manifest file inside a directory, if any.
    pub fn find_manifest(dir: &Path) -> Option<PathBuf> {
        MANIFEST_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    fn parse_module(&self, dir: &Path, manifest: &Path) -> Option<ModuleInfo> {
        let content = match std::fs::read_to_string(manifest) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %manifest.display(), %err, "unreadable manifest; skipping module");
                return None;
            }
        };

        let data = match literal::eval_manifest(&content, manifest) {
            Ok(data) => data,
            Err(err) => {
                warn!(path = %manifest.display(), %err, "skipping module");
                return None;
            }
        };

        let name = dir.file_name()?.to_str()?.to_string();
        let path = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());

        let get_str = |key: &str| data.get(key).and_then(Literal::as_str).map(str::to_string);

        Some(ModuleInfo {
            name,
            path,
            version: get_str("version").unwrap_or_else(|| "1.0".to_string()),
            depends: data.get("depends").map(Literal::as_str_list).unwrap_or_default(),
            description: get_str("summary")
                .filter(|s| !s.is_empty())
                .or_else(|| get_str("description"))
                .unwrap_or_default(),
            author: get_str("author").unwrap_or_default(),
            category: get_str("category").unwrap_or_else(|| "Uncategorized".to_string()),
            installable: data.get("installable").map_or(true, Literal::is_truthy),
            auto_install: data.get("auto_install").is_some_and(Literal::is_truthy),
        })
    }
}
