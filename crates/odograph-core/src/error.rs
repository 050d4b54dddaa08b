use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the extract/transform stages.
///
/// Only a handful of conditions are fatal to a run (see the pipeline); most
/// parse problems are logged and skipped at the file or module level and
/// never reach this type.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("source root {0} does not exist")]
    MissingRoot(PathBuf),

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest expression in {0}")]
    ManifestParse(PathBuf),

    #[error("failed to write state file {path}")]
    StateWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build worker pool")]
    WorkerPool(String),
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_path() {
        let err = CoreError::MissingRoot(PathBuf::from("/no/such/corpus"));
        assert!(err.to_string().contains("/no/such/corpus"));

        let err = CoreError::ManifestParse(PathBuf::from("mod/__manifest__.py"));
        assert!(err.to_string().contains("__manifest__.py"));
    }
}
