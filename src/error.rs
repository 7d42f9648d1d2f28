use thiserror::Error;

/// Errors raised by the headless_chrome session and DOM capture
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    #[error("Tab operation failed: {0}")]
    TabOperationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Failed to parse DOM: {0}")]
    DomParseFailed(String),
}

/// Result alias for browser session operations
pub type Result<T> = std::result::Result<T, BrowserError>;

/// A raw query the page engine could not parse
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("Invalid query '{query}': {reason}")]
    InvalidSyntax { query: String, reason: String },
}

impl QueryError {
    pub(crate) fn syntax(query: &str, reason: impl Into<String>) -> Self {
        QueryError::InvalidSyntax {
            query: query.to_string(),
            reason: reason.into(),
        }
    }
}

/// Caller-visible failures of a resolution
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    /// Malformed primary query. Never healed.
    #[error("Invalid query syntax '{query}': {reason}")]
    InvalidQuerySyntax { query: String, reason: String },

    /// Every strategy missed
    #[error("Element not found for locator '{locator_id}' (query '{query}')")]
    ElementNotFound { locator_id: String, query: String },

    /// Strict mode only: the primary query matched more than one element
    #[error("Query '{query}' matched {count} elements")]
    AmbiguousMatch { query: String, count: usize },
}

impl From<QueryError> for ResolveError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidSyntax { query, reason } => {
                ResolveError::InvalidQuerySyntax { query, reason }
            }
        }
    }
}

/// Persistence failures of the healing ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt ledger entry at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    #[error("Ledger lock poisoned")]
    Poisoned,
}

/// Failures reported by a suggestion provider
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SuggestError {
    #[error("Suggestion timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Suggestion backend error: {0}")]
    Backend(String),
}

/// Failures loading a resolver configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
