use thiserror::Error;

/// Cache failures. `name` is the cache's on-disk path as displayed.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Persistent cache [{name}] not found.")]
    NotFound { name: String },

    #[error("[{name}] cache version [{found}] does not match [{requested}].")]
    VersionMismatch {
        name: String,
        found: String,
        requested: String,
    },

    #[error("[{name}] is not a persistent cache.")]
    Invalid { name: String },

    #[error("Cache name [{name}] is invalid. Names must be non-empty and contain no path separators.")]
    NameInvalid { name: String },

    #[error("[{name}] cache table [{table}] not found.")]
    TableNotFound { name: String, table: String },

    #[error("[{name}] {message}")]
    TableColumnsInvalid {
        name: String,
        table: String,
        message: String,
    },

    #[error("[{name}] {message}")]
    TableKeysInvalid {
        name: String,
        table: String,
        message: String,
    },

    #[error("Cache table [{table}] row size [{size}] is invalid. {expected}")]
    TableRowSizeInvalid {
        table: String,
        size: usize,
        expected: String,
    },

    #[error("[{name}] cache table [{table}] is restricted.")]
    TableRestricted { name: String, table: String },

    #[error("[{name}] cache table [{table}] has expired.")]
    TableExpired { name: String, table: String },

    #[error("[{name}] cache is closed.")]
    Closed { name: String },

    #[error("[{name}] cache I/O error: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    pub(crate) fn io(name: &str, source: std::io::Error) -> Self {
        CacheError::Io {
            name: name.to_string(),
            source,
        }
    }

    pub(crate) fn row_size(table: &str, size: usize, columns: usize, exact: bool) -> Self {
        let expected = if exact || columns == 1 {
            format!("Must be {columns}.")
        } else {
            format!("Must be >= 1 and <= {columns}.")
        };
        CacheError::TableRowSizeInvalid {
            table: table.to_string(),
            size,
            expected,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, CacheError::TableExpired { .. })
    }
}
