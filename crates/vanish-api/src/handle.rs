use crate::error::ApiError;

pub const MIN_HANDLE_LEN: usize = 3;
pub const MAX_HANDLE_LEN: usize = 30;

/// Normalize a user handle: trimmed, lowercased, and restricted to
/// `[a-z0-9_]{3,30}`. Handles are the only identity key the core compares,
/// so normalization happens once at every boundary that accepts one.
pub fn normalize_handle(raw: &str, field: &'static str) -> Result<String, ApiError> {
    let handle = raw.trim().to_lowercase();

    if handle.len() < MIN_HANDLE_LEN || handle.len() > MAX_HANDLE_LEN {
        return Err(ApiError::validation(
            field,
            format!("must be {MIN_HANDLE_LEN}-{MAX_HANDLE_LEN} characters"),
        ));
    }

    if !handle
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ApiError::validation(
            field,
            "may only contain lowercase letters, digits and underscores",
        ));
    }

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_handle("  Sara_99 ", "username").unwrap(), "sara_99");
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(normalize_handle("ab", "username").is_err());
        assert!(normalize_handle(&"a".repeat(31), "username").is_err());
        assert!(normalize_handle(&"a".repeat(30), "username").is_ok());
    }

    #[test]
    fn rejects_bad_charset() {
        assert!(normalize_handle("sara!", "username").is_err());
        assert!(normalize_handle("sa ra", "username").is_err());
        assert!(normalize_handle("sära", "username").is_err());
    }
}
