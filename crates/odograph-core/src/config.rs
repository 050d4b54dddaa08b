use std::path::{Path, PathBuf};

/// Analyzer-side configuration, read from the environment with defaults.
///
/// The graph endpoint configuration lives with the graph crate; this type
/// only covers corpus selection, performance tuning and file filtering.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Root of the Odoo source corpus.
    pub source_path: PathBuf,
    /// Rows per loader transaction.
    pub batch_size: usize,
    /// Parser worker pool size.
    pub max_workers: usize,
    /// Directory holding the incremental state file.
    pub cache_dir: PathBuf,
    /// Changed-module ratio above which a full reload is cheaper than an
    /// incremental one.
    pub full_reload_threshold: f64,
    /// File selection shared by the parsers and the change detector.
    pub filter: FileFilter,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from("/path/to/odoo"),
            batch_size: 1000,
            max_workers: 4,
            cache_dir: PathBuf::from(".cache"),
            full_reload_threshold: 0.30,
            filter: FileFilter::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Build the configuration from `ODOO_SOURCE_PATH`, `BATCH_SIZE` and
    /// `MAX_WORKERS`, falling back to defaults for anything unset or
    /// unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("ODOO_SOURCE_PATH") {
            config.source_path = PathBuf::from(path);
        }
        config.batch_size = env_usize("BATCH_SIZE", config.batch_size);
        config.max_workers = env_usize("MAX_WORKERS", config.max_workers);
        config
    }

    /// Path of the incremental state file.
    pub fn state_file(&self) -> PathBuf {
        self.cache_dir.join("state.json")
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Which files inside a module are part of the analyzed surface.
///
/// The same predicate drives the entity parser and the relevant-file set of
/// the change detector, so "what we parse" and "what we hash" stay aligned.
#[derive(Debug, Clone)]
pub struct FileFilter {
    /// Python files whose name starts with this prefix are ignored.
    pub test_prefix: String,
    /// Path segments equal to this are ignored entirely.
    pub cache_segment: String,
}

impl Default for FileFilter {
    fn default() -> Self {
        Self {
            test_prefix: "test_".to_string(),
            cache_segment: "__pycache__".to_string(),
        }
    }
}

impl FileFilter {
    /// True when a Python file should be skipped by parsing and hashing.
    pub fn excludes_source(&self, path: &Path) -> bool {
        let in_cache = path
            .components()
            .any(|c| c.as_os_str() == self.cache_segment.as_str());
        let is_test = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&self.test_prefix));
        in_cache || is_test
    }
}
