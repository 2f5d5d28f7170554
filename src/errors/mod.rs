//! Centralized error handling for epg-relay
//!
//! Transport, protocol, empty and malformed upstream responses never show up
//! here: they are attempt outcomes recovered inside the resilient fetcher.
//! What remains are the failures a caller can actually observe.
//!
//! # Error Categories
//!
//! - **Repository Errors**: guide and channel persistence
//! - **Source Errors**: authentication and channel list retrieval
//! - **Refresh Errors**: conditions that abort a refresh run
//! - **Validation Errors**: bad configuration or request parameters

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;
