//! Centralized error handling for StreamTV
//!
//! Every layer has its own error enum; the binary folds them into
//! `anyhow::Error`. Most failure classes in this crate are deliberately
//! *not* errors: a malformed playlist block is skipped, an unusable DRM
//! license degrades to plain playback, and a failed playlist fetch yields an
//! empty channel list.
//! Only the terminal retry branch surfaces a [`PlaybackError`] to the user.

pub mod types;

pub use types::*;

/// Convenience type alias for library store Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for playlist source Results
pub type SourceResult<T> = Result<T, SourceError>;

/// Convenience type alias for playback session Results
pub type PlaybackResult<T> = Result<T, PlaybackError>;
