#![allow(non_shorthand_field_patterns)]
#![doc = "Error handling primitives shared across the harvester crate."]
// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! The derive emitted by [`masterror::Error`] expands pattern matches that
//! trigger the `non_shorthand_field_patterns` lint. The lint is disabled for
//! the module to keep the generated implementations warning-free.

use std::path::{Path, PathBuf};

/// Convenience alias used by every fallible harvester operation.
pub type Result<T,> = std::result::Result<T, Error,>;

/// Unified error type returned by the harvesting engine and CLI.
///
/// Variants follow the harvester's fault taxonomy: transient faults are
/// retried by the backoff layer and never escape it unless retries are
/// exhausted, `NotFound` is a terminal non-error that callers usually turn
/// into an absent value, and contract violations such as
/// [`Error::InvalidBatchSize`] are always fatal.
#[derive(Debug, masterror::Error)]
pub enum Error
{
    /// Wraps I/O errors raised while reading manifests or writing records.
    #[error("i/o failure at {path:?}: {source}")]
    Io {
        /// Location of the file being accessed.
        path:   PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Wraps YAML decoding errors from the configuration file.
    #[error("failed to parse configuration: {source}")]
    Parse {
        /// Source decoding error from serde_yaml.
        source: serde_yaml::Error,
    },
    /// Wraps JSON encoding or decoding errors.
    #[error("failed to (de)serialize JSON: {source}")]
    Serialize {
        /// Underlying serde_json error.
        source: serde_json::Error,
    },
    /// Returned when configuration or input violates invariants.
    #[error("invalid configuration: {message}")]
    Validation {
        /// Human readable message describing the validation problem.
        message: String,
    },
    /// A repository URL that does not yield a non-empty owner and name.
    #[error("invalid repository reference '{url}': {reason}")]
    InvalidReference {
        /// Raw manifest entry.
        url:    String,
        /// Why the entry was rejected.
        reason: String,
    },
    /// GraphQL batch size outside `1..=ceiling`.
    #[error("invalid GraphQL batch size {size}: must be between 1 and {ceiling}")]
    InvalidBatchSize {
        /// Requested batch size.
        size:    usize,
        /// Maximum number of aliases accepted per document.
        ceiling: usize,
    },
    /// Network failure or server-side fault that may succeed on retry.
    #[error("transient API failure: {message}")]
    TransientApi {
        /// Description of the failure.
        message: String,
    },
    /// Non-success status that survived every retry.
    #[error("request to {route} failed with status {status}")]
    Api {
        /// Route that was requested.
        route:  String,
        /// Last HTTP status received.
        status: u16,
    },
    /// The requested resource no longer exists.
    #[error("resource {route} not found")]
    NotFound {
        /// Route that returned 404.
        route: String,
    },
    /// Quota did not recover within the configured waiting ceiling.
    #[error("rate limit for {class} did not reset after waiting {waited_secs}s")]
    RateLimitUnrecoverable {
        /// Request class whose quota stayed exhausted.
        class:       String,
        /// Seconds already spent waiting.
        waited_secs: u64,
    },
}

impl Error
{
    /// Constructs a validation error from the provided message.
    pub fn validation<M,>(message: M,) -> Self
    where
        M: Into<String,>,
    {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Constructs a transient API error from the provided message.
    pub fn transient<M,>(message: M,) -> Self
    where
        M: Into<String,>,
    {
        Self::TransientApi {
            message: message.into(),
        }
    }

    /// Constructs an invalid reference error for a manifest entry.
    pub fn invalid_reference<U, R,>(url: U, reason: R,) -> Self
    where
        U: Into<String,>,
        R: Into<String,>,
    {
        Self::InvalidReference {
            url:    url.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for faults that a later attempt may resolve.
    ///
    /// Orchestration uses this to tell "try again next run" apart from
    /// permanently broken input.
    pub fn is_retryable(&self,) -> bool
    {
        matches!(
            self,
            Self::TransientApi { .. } | Self::Api { .. } | Self::RateLimitUnrecoverable { .. }
        )
    }

    /// Formats the error for diagnostics without the variant name.
    pub fn to_display_string(&self,) -> String
    {
        format!("{self}")
    }
}

impl From<serde_yaml::Error,> for Error
{
    fn from(source: serde_yaml::Error,) -> Self
    {
        Self::Parse {
            source,
        }
    }
}

impl From<serde_json::Error,> for Error
{
    fn from(source: serde_json::Error,) -> Self
    {
        Self::Serialize {
            source,
        }
    }
}

/// Creates an [`Error::Io`] variant capturing the failing path and source.
///
/// # Parameters
///
/// * `path` - Location of the file that triggered the error.
/// * `source` - I/O error reported by the operating system.
pub fn io_error(path: &Path, source: std::io::Error,) -> Error
{
    Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests
{
    use super::Error;

    #[test]
    fn validation_constructor_populates_message()
    {
        let error = Error::validation("something went wrong",);
        match error {
            Error::Validation {
                ref message,
            } => {
                assert_eq!(message, "something went wrong");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn to_display_string_matches_display()
    {
        let error = Error::transient("connection reset",);
        assert_eq!(error.to_string(), error.to_display_string());
        assert_eq!(error.to_string(), "transient API failure: connection reset");
    }

    #[test]
    fn io_error_helper_wraps_path_and_source()
    {
        let path = std::path::Path::new("/tmp/manifest.txt",);
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing",);
        let error = super::io_error(path, io_error,);

        match error {
            Error::Io {
                path: ref stored_path,
                ref source,
            } => {
                assert_eq!(stored_path, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn serde_yaml_conversion_maps_to_parse_variant()
    {
        let error = serde_yaml::from_str::<usize,>("not-a-number",).unwrap_err();
        let mapped: Error = error.into();
        assert!(matches!(mapped, Error::Parse { .. }));
    }

    #[test]
    fn serde_json_conversion_maps_to_serialize_variant()
    {
        let invalid = serde_json::from_str::<serde_json::Value,>("not-json",).unwrap_err();
        let mapped: Error = invalid.into();
        assert!(matches!(mapped, Error::Serialize { .. }));
    }

    #[test]
    fn retryable_classification_follows_taxonomy()
    {
        assert!(Error::transient("503").is_retryable());
        assert!(
            Error::Api {
                route:  "/repos/a/b".to_owned(),
                status: 502,
            }
            .is_retryable()
        );
        assert!(
            !Error::NotFound {
                route: "/repos/a/b".to_owned(),
            }
            .is_retryable()
        );
        assert!(
            !Error::InvalidBatchSize {
                size:    2001,
                ceiling: 2000,
            }
            .is_retryable()
        );
        assert!(!Error::invalid_reference("https://github.com/", "missing owner").is_retryable());
    }

    #[test]
    fn invalid_batch_size_message_names_ceiling()
    {
        let error = Error::InvalidBatchSize {
            size:    0,
            ceiling: 2000,
        };
        assert_eq!(
            error.to_string(),
            "invalid GraphQL batch size 0: must be between 1 and 2000"
        );
    }
}
