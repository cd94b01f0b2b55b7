//! Payload validation with per-field details.
//!
//! The rules live on the model types as `#[derive(Validate)]` attributes.
//! This module runs them and flattens the nested [`ValidationErrors`] into
//! field paths such as `slice[0].session[1].qos.index`; the collected map is
//! returned as a single [`Error::Validation`]. The range expander and the
//! reconciler assume their inputs already passed these checks.

use crate::error::{Error, FieldErrors, Result};
use crate::model::{SubscriberPatch, SubscriberTemplate};
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Validates every field of a subscriber template.
pub fn template(template: &SubscriberTemplate) -> Result<()> {
    check(template)
}

/// Validates the fields present in a patch.
pub fn patch(patch: &SubscriberPatch) -> Result<()> {
    check(patch)
}

fn check(payload: &impl Validate) -> Result<()> {
    payload.validate().map_err(|errors| {
        let mut details = FieldErrors::new();
        flatten("", &errors, &mut details);
        Error::from_field_errors(details)
    })
}

fn flatten(prefix: &str, errors: &ValidationErrors, out: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(first) = list.first() {
                    out.entry(path).or_insert_with(|| describe(first));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

fn describe(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => format!("failed the {} check", error.code),
    }
}

/// Rejects anything but ASCII hex digits.
pub(crate) fn hex(value: &str) -> core::result::Result<(), ValidationError> {
    if value.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ValidationError::new("hex").with_message(Cow::Borrowed("must be hexadecimal")))
    }
}

pub(crate) fn not_blank(value: &str) -> core::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("not_blank").with_message(Cow::Borrowed("must not be empty")))
    } else {
        Ok(())
    }
}
