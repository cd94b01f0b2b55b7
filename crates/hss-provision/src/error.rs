//! Error types for subscriber provisioning.
//!
//! This module defines the central [`Error`] enum shared by the range
//! expander, the batch reconciler, the store backends and the subscriber
//! service. Transport layers map each variant onto their own status codes.
//!
//! ## Error Cases
//! - `Validation`: malformed or out-of-bound input. Carries the offending
//!   field and, for payload validation, a per-field detail map.
//! - `Conflict`: an IMSI already exists on a strict single-create path.
//! - `NotFound`: no subscriber matches the given id or IMSI.
//! - `Persistence`: the store is unreachable or rejected an operation outright.
//! - `Timeout`: a store round-trip exceeded its deadline.

use crate::identity::Imsi;
use core::time::Duration;
use std::collections::BTreeMap;

pub type Result<T> = core::result::Result<T, Error>;

/// Field path to human-readable message.
pub type FieldErrors = BTreeMap<String, String>;

/// Unified error type for subscriber provisioning.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// Input failed validation. `field` names the first offending field.
    #[error("Invalid {field}: {message}")]
    Validation {
        field: String,
        message: String,
        details: FieldErrors,
    },

    /// Strict create hit an existing IMSI.
    #[error("Subscriber with IMSI {imsi} already exists")]
    Conflict { imsi: Imsi },

    /// No subscriber matched the id or IMSI.
    #[error("Subscriber {key} not found")]
    NotFound { key: String },

    /// The store failed or refused the operation.
    #[error("Persistence error: {context}")]
    Persistence { context: String },

    /// A store call did not complete in time.
    #[error("Store operation timed out after {after:?}")]
    Timeout { after: Duration },
}

impl Error {
    /// Builds a single-field validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        let mut details = FieldErrors::new();
        details.insert(field.clone(), message.clone());
        Self::Validation {
            field,
            message,
            details,
        }
    }

    /// Builds a validation error from a non-empty detail map. The first entry
    /// (in field order) becomes the headline.
    pub fn from_field_errors(details: FieldErrors) -> Self {
        let (field, message) = details
            .iter()
            .next()
            .map(|(f, m)| (f.clone(), m.clone()))
            .unwrap_or_else(|| ("request".to_string(), "invalid request".to_string()));
        Self::Validation {
            field,
            message,
            details,
        }
    }

    pub fn persistence(context: impl Into<String>) -> Self {
        Self::Persistence {
            context: context.into(),
        }
    }

    /// The offending field when this is a validation error.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::persistence(format!("encoding error: {err}"))
    }
}
