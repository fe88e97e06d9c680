//! Input validation for signup and login

use crate::error::AppError;

/// Maximum email length accepted (matches the column width)
pub const MAX_EMAIL_LENGTH: usize = 255;

/// Maximum name length accepted (matches the column width)
pub const MAX_NAME_LENGTH: usize = 100;

/// bcrypt only looks at the first 72 bytes of a password
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Normalize and validate an email address
///
/// # Returns
/// * `Ok(String)` - Trimmed, lower-cased address
/// * `Err(AppError::Validation)` - Address is malformed
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let invalid = || AppError::Validation("Invalid email address".to_string());

    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH {
        return Err(invalid());
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }

    Ok(email)
}

/// Validate a new password
pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::Validation("Password cannot be empty".to_string()));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::Validation(format!(
            "Password exceeds maximum length of {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }
    Ok(())
}

/// Validate and trim a first or last name
pub fn normalize_name(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} cannot be empty", field)));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "{} exceeds maximum length of {} characters",
            field, MAX_NAME_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}
