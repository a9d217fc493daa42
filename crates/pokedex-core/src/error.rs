//! Error types for the pokedex core.
//!
//! Only `Upstream` and `NotFound` are expected to cross the boundary during
//! normal operation; every enrichment failure is absorbed by the component
//! that hit it (see `service::Degradation`).

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the pokedex core.
#[derive(Debug, Error)]
pub enum PokedexError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Provider returned {status} for {url}: {message}")]
    Upstream {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for pokedex operations.
pub type Result<T> = std::result::Result<T, PokedexError>;

impl From<std::io::Error> for PokedexError {
    fn from(err: std::io::Error) -> Self {
        PokedexError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for PokedexError {
    fn from(err: serde_json::Error) -> Self {
        PokedexError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for PokedexError {
    fn from(err: rusqlite::Error) -> Self {
        PokedexError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl PokedexError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        PokedexError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// HTTP status the boundary layer should answer with.
    ///
    /// - 400: caller supplied invalid parameters
    /// - 404: the provider does not know the requested resource
    /// - 502: the provider failed or could not be reached
    /// - 500: local failure (database, IO, configuration)
    pub fn http_status(&self) -> u16 {
        match self {
            PokedexError::Validation { .. } => 400,
            PokedexError::NotFound { .. } => 404,
            PokedexError::Network { .. }
            | PokedexError::Timeout(_)
            | PokedexError::Upstream { .. }
            | PokedexError::Json { .. } => 502,
            _ => 500,
        }
    }

    /// Message for the `{detail: ...}` failure payload.
    pub fn detail(&self) -> String {
        match self {
            PokedexError::Upstream { .. }
            | PokedexError::Network { .. }
            | PokedexError::Timeout(_) => format!("Error querying PokeAPI: {}", self),
            _ => self.to_string(),
        }
    }

    /// Upstream status code, when the provider answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            PokedexError::Upstream { status, .. } => Some(*status),
            PokedexError::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PokedexError::NotFound {
            resource: "pokemon/99999".into(),
        };
        assert_eq!(err.to_string(), "Not found: pokemon/99999");
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            PokedexError::NotFound {
                resource: "generation/42".into()
            }
            .http_status(),
            404
        );
        assert_eq!(
            PokedexError::Upstream {
                status: 503,
                url: "https://pokeapi.co/api/v2/pokemon/1".into(),
                message: "Service Unavailable".into(),
            }
            .http_status(),
            502
        );
        assert_eq!(
            PokedexError::Validation {
                field: "generation".into(),
                message: "must be positive".into(),
            }
            .http_status(),
            400
        );
        assert_eq!(PokedexError::Other("boom".into()).http_status(), 500);
        assert_eq!(
            PokedexError::Config {
                message: "bad client".into()
            }
            .http_status(),
            500
        );
    }

    #[test]
    fn test_upstream_detail_message() {
        let err = PokedexError::Upstream {
            status: 500,
            url: "https://pokeapi.co/api/v2/type".into(),
            message: "Internal Server Error".into(),
        };
        assert!(err.detail().starts_with("Error querying PokeAPI"));
        assert_eq!(err.upstream_status(), Some(500));
    }
}
