//! Validation functions for configuration values.

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use sanitize_filename::{is_sanitized, sanitize};
use validator::ValidationError;

use std::path::Path;

pub fn validate_valid_archive_prefix<S: AsRef<str>>(name: S) -> Result<(), ValidationError> {
    let name = name.as_ref();
    if name.is_empty() {
        return Err(ValidationError::new("InvalidArchivePrefix")
            .with_message("archive_prefix must not be empty".into()));
    }
    if !is_sanitized(name) {
        return Err(ValidationError::new("InvalidArchivePrefix").with_message(
            format!(
                "Invalid file name prefix, try sanitizing like {:?}",
                sanitize(name)
            )
            .into(),
        ));
    }

    Ok(())
}

pub fn validate_dir_exist_or_created<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return std::fs::create_dir_all(dir).map_err(|e| {
            ValidationError::new("InvalidDirectory").with_message(
                format!("cannot create or access out_dir path {:?}: {}", dir, e).into(),
            )
        });
    }

    Ok(())
}

/// A retention date format must be valid strftime and must round-trip a date.
pub fn validate_date_format<S: AsRef<str>>(format: S) -> Result<(), ValidationError> {
    let format = format.as_ref();
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ValidationError::new("InvalidDateFormat")
            .with_message(format!("Invalid date format: {format:?}").into()));
    }

    let sample = NaiveDate::from_ymd_opt(2001, 2, 3).unwrap_or_default();
    let rendered = sample.format(format).to_string();
    match NaiveDate::parse_from_str(&rendered, format) {
        Ok(parsed) if parsed == sample => Ok(()),
        _ => Err(ValidationError::new("InvalidDateFormat").with_message(
            format!("Date format {format:?} does not identify a calendar date").into(),
        )),
    }
}
