use super::error::DomainError;

/// Trim a title and reject it when nothing is left.
pub fn normalize_title(value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("title must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Blank descriptions are stored as absent.
pub fn normalize_description(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
