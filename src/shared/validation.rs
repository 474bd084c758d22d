//! Custom field validators for `validator` derives

use std::borrow::Cow;
use std::collections::HashSet;

use validator::{ValidateUrl, ValidationError};

use crate::features::reports::models::{Coordinates, ReportTag};

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Rejects strings that are empty after trimming
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error("blank", "must not be blank"));
    }
    Ok(())
}

/// Every media reference must be an absolute URL
pub fn media_urls(refs: &[String]) -> Result<(), ValidationError> {
    if refs.iter().any(|r| !r.validate_url()) {
        return Err(error("url", "every image reference must be a valid URL"));
    }
    Ok(())
}

pub fn unique_tags(tags: &[ReportTag]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    if !tags.iter().all(|t| seen.insert(*t)) {
        return Err(error("duplicate", "tags must not repeat"));
    }
    Ok(())
}

pub fn coordinates(value: &Coordinates) -> Result<(), ValidationError> {
    if !(-90.0..=90.0).contains(&value.lat) || !(-180.0..=180.0).contains(&value.lng) {
        return Err(error("range", "coordinates are out of range"));
    }
    Ok(())
}
