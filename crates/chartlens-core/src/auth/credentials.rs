//! Form validation for the sign-in and sign-up screens.
//!
//! This runs in the UI layer before anything is sent to the session manager,
//! which never re-validates.

use thiserror::Error;

/// Shortest password the provider accepts
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Email is required")]
    MissingEmail,

    #[error("Please enter a valid email")]
    InvalidEmail,

    #[error("Password is required")]
    MissingPassword,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Validate a credential pair. Pass `confirm` when registering.
pub fn validate_credentials(
    email: &str,
    password: &str,
    confirm: Option<&str>,
) -> Result<(), CredentialError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(CredentialError::MissingEmail);
    }
    if !email.contains('@') {
        return Err(CredentialError::InvalidEmail);
    }
    if password.is_empty() {
        return Err(CredentialError::MissingPassword);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CredentialError::PasswordTooShort);
    }
    if let Some(confirm) = confirm {
        if confirm != password {
            return Err(CredentialError::PasswordMismatch);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_credentials() {
        assert_eq!(validate_credentials("ada@example.com", "secret1", None), Ok(()));
        assert_eq!(
            validate_credentials("ada@example.com", "secret1", Some("secret1")),
            Ok(())
        );

        assert_eq!(validate_credentials("  ", "secret1", None), Err(CredentialError::MissingEmail));
        assert_eq!(validate_credentials("ada", "secret1", None), Err(CredentialError::InvalidEmail));
        assert_eq!(
            validate_credentials("ada@example.com", "", None),
            Err(CredentialError::MissingPassword)
        );
        assert_eq!(
            validate_credentials("ada@example.com", "12345", None),
            Err(CredentialError::PasswordTooShort)
        );
        assert_eq!(
            validate_credentials("ada@example.com", "secret1", Some("secret2")),
            Err(CredentialError::PasswordMismatch)
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CredentialError::PasswordTooShort.to_string(),
            "Password must be at least 6 characters"
        );
    }
}
