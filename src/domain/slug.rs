//! Utilities for deriving and validating group slugs.
//!
//! Group slugs are URL path segments, so they are restricted to lowercase
//! ASCII alphanumerics and hyphens. Titles that cannot produce a slug
//! (for example, punctuation only) are rejected rather than silently mangled.

use slug::slugify;
use thiserror::Error;

const MAX_SLUG_LEN: usize = 64;

/// Errors that can occur while deriving or validating a slug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug exceeds {MAX_SLUG_LEN} characters")]
    TooLong,
    #[error("slug contains characters outside [a-z0-9-]")]
    InvalidCharacters,
}

/// Derive a slug from a human-readable group title.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let mut candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    if candidate.len() > MAX_SLUG_LEN {
        candidate.truncate(MAX_SLUG_LEN);
        while candidate.ends_with('-') {
            candidate.pop();
        }
    }

    Ok(candidate)
}

/// Validate a caller-supplied slug without rewriting it.
pub fn validate_slug(candidate: &str) -> Result<(), SlugError> {
    if candidate.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    if candidate.len() > MAX_SLUG_LEN {
        return Err(SlugError::TooLong);
    }
    let well_formed = candidate
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
        && !candidate.starts_with('-')
        && !candidate.ends_with('-');
    if !well_formed {
        return Err(SlugError::InvalidCharacters);
    }
    Ok(())
}
