//! Validation utilities for configuration values

use std::time::Duration;

/// Validate a millisecond setting that must be strictly positive
pub fn validate_positive_millis(field: &str, value: u64) -> Result<Duration, String> {
    match value {
        0 => Err(format!("{} must be greater than 0", field)),
        n => Ok(Duration::from_millis(n)),
    }
}

/// Validate a count setting that must be strictly positive
pub fn validate_positive_count(field: &str, value: usize) -> Result<usize, String> {
    match value {
        0 => Err(format!("{} must be greater than 0", field)),
        n => Ok(n),
    }
}

/// Validate that `shorter` does not exceed `longer`
pub fn validate_not_longer(
    shorter_field: &str,
    shorter: Duration,
    longer_field: &str,
    longer: Duration,
) -> Result<(), String> {
    if shorter > longer {
        return Err(format!(
            "{} ({:?}) must not exceed {} ({:?})",
            shorter_field, shorter, longer_field, longer
        ));
    }
    Ok(())
}

/// Validate an identifier (site id, content id) supplied by a producer
pub fn validate_identifier(field: &str, value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{} cannot be empty", field));
    }
    if trimmed.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(format!(
            "{} '{}' contains whitespace or control characters",
            field,
            trimmed.escape_debug()
        ));
    }
    Ok(trimmed.to_string())
}
