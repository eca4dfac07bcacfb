//! Error types for the copy engine.

use thiserror::Error;

/// Error raised by a storage collaborator (source reader or target writer).
///
/// Kept separate from [`CopyError`] so the engine can attach the phase in
/// which a storage call failed (probe, fetch, write) when it propagates.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Query or protocol error from the backing PostgreSQL store.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Connection pool error with context about where it occurred.
    #[error("pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// The store could not service the request (used by fake stores in tests
    /// and for non-database backends).
    #[error("{0}")]
    Unavailable(String),
}

impl StorageError {
    /// Create a Pool error with context about where it occurred.
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        StorageError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }
}

/// Main error type for transfer operations.
#[derive(Error, Debug)]
pub enum CopyError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stats probe failed before any chunking work began. Never retried;
    /// the run aborts with no partial writes.
    #[error("Stats probe failed: {source}")]
    Probe {
        #[source]
        source: StorageError,
    },

    /// A page fetch failed; remaining pages are abandoned.
    #[error("Fetch failed for page {page}: {source}")]
    Fetch {
        page: i32,
        #[source]
        source: StorageError,
    },

    /// A bulk upsert failed. Duplicate-id conflicts are absorbed by the
    /// upsert itself, so this is a genuine constraint or connectivity
    /// failure. Prior pages' writes are not rolled back.
    #[error("Bulk write failed for page {page}: {source}")]
    Write {
        page: i32,
        #[source]
        source: StorageError,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CopyError {
    /// Wrap a storage error that occurred during the stats probe.
    pub fn probe(source: StorageError) -> Self {
        CopyError::Probe { source }
    }

    /// Wrap a storage error that occurred while fetching a page.
    pub fn fetch(page: i32, source: StorageError) -> Self {
        CopyError::Fetch { page, source }
    }

    /// Wrap a storage error that occurred while writing a page.
    pub fn write(page: i32, source: StorageError) -> Self {
        CopyError::Write { page, source }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            CopyError::Config(_) => 2,
            CopyError::Probe { .. } => 3,
            CopyError::Fetch { .. } => 4,
            CopyError::Write { .. } => 5,
            _ => 1,
        }
    }
}

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, CopyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_carry_page_index() {
        let err = CopyError::fetch(7, StorageError::Unavailable("connection reset".into()));
        assert!(err.to_string().contains("page 7"));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let err = CopyError::write(0, StorageError::Unavailable("disk full".into()));
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Bulk write failed for page 0"));
        assert!(detailed.contains("Caused by:"));
        assert!(detailed.contains("disk full"));
    }

    #[test]
    fn test_exit_codes_distinct_per_phase() {
        let probe = CopyError::probe(StorageError::Unavailable("x".into()));
        let config = CopyError::Config("bad".into());
        assert_ne!(probe.exit_code(), config.exit_code());
        assert_eq!(probe.exit_code(), 3);
        assert_eq!(config.exit_code(), 2);
    }
}
