//! Error type definitions for epg-relay

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Upstream source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Refresh run errors
    #[error("Refresh error: {0}")]
    Refresh(#[from] RefreshError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Persistence errors raised by channel stores and guide sinks
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// SQL query execution failures
    #[error("Query failed: {query} - {message}")]
    QueryFailed { query: String, message: String },

    /// Data serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Migration failures
    #[error("Migration failed: {version} - {message}")]
    MigrationFailed { version: String, message: String },

    /// Timestamp stored in an unexpected format
    #[error("Invalid timestamp in {table}.{field}: {value}")]
    InvalidTimestamp {
        table: String,
        field: String,
        value: String,
    },
}

/// Upstream collaborator errors (login endpoint and channel list)
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network connection timeouts
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// Authentication failures
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Missing credentials or other unusable configuration
    #[error("Invalid configuration: {field} - {message}")]
    InvalidConfig { field: String, message: String },

    /// Response body could not be understood
    #[error("Parse error: {source_type} - {message}")]
    ParseError { source_type: String, message: String },

    /// Non-success HTTP status from an upstream endpoint
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Every mirror was tried without success
    #[error("All {mirrors} mirrors failed: {last_error}")]
    AllMirrorsFailed { mirrors: usize, last_error: String },
}

/// Conditions that abort or reject a refresh run
#[derive(Error, Debug)]
pub enum RefreshError {
    /// The channel list was obtained but contained nothing to process
    #[error("No channels to refresh")]
    NoChannels,

    /// The channel list could not be obtained at all
    #[error("Channel list unavailable: {0}")]
    ChannelList(String),

    /// Another run holds the refresh slot
    #[error("A refresh run is already in progress")]
    AlreadyRunning,
}

impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error for a specific resource
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl RepositoryError {
    /// Create a query failed error
    pub fn query_failed<Q: Into<String>, M: Into<String>>(query: Q, message: M) -> Self {
        Self::QueryFailed {
            query: query.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        Self::query_failed("sqlx", err.to_string())
    }
}

impl SourceError {
    /// Create an authentication failed error
    pub fn auth_failed<M: Into<String>>(message: M) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse_error<S: Into<String>, M: Into<String>>(source_type: S, message: M) -> Self {
        Self::ParseError {
            source_type: source_type.into(),
            message: message.into(),
        }
    }
}
