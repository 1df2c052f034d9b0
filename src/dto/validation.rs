//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted player name or user identifier.
pub const MAX_TEXT_LEN: usize = 64;

/// Validates that a user ID is non-blank, at most [`MAX_TEXT_LEN`] characters,
/// and free of whitespace.
///
/// # Examples
///
/// ```ignore
/// validate_user_id("3f1c2a")   // Ok
/// validate_user_id("")         // Err - empty
/// validate_user_id("a b")      // Err - whitespace
/// ```
pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.chars().count() > MAX_TEXT_LEN {
        let mut err = ValidationError::new("user_id_length");
        err.message = Some(
            format!(
                "User ID must be between 1 and {MAX_TEXT_LEN} characters (got {})",
                id.chars().count()
            )
            .into(),
        );
        return Err(err);
    }

    if id.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("user_id_format");
        err.message = Some("User ID must not contain whitespace".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a display name has visible content and is at most [`MAX_TEXT_LEN`] characters.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("name_blank");
        err.message = Some("Name must not be blank".into());
        return Err(err);
    }

    if name.chars().count() > MAX_TEXT_LEN {
        let mut err = ValidationError::new("name_length");
        err.message = Some(format!("Name must be at most {MAX_TEXT_LEN} characters").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_user_id_valid() {
        assert!(validate_user_id("a").is_ok());
        assert!(validate_user_id("6f0e1d2c-7b3a-4d55-9c1e-0a2b3c4d5e6f").is_ok());
    }

    #[test]
    fn test_validate_user_id_invalid() {
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("a b").is_err());
        assert!(validate_user_id(&"x".repeat(MAX_TEXT_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("Alice").is_ok());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"n".repeat(MAX_TEXT_LEN + 1)).is_err());
    }
}
