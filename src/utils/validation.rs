use crate::errors::{AppError, Result};

pub fn validate_email(email: &str) -> Result<()> {
    let mut parts = email.split('@');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    };

    if !valid {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }
    Ok(())
}

pub fn validate_full_name(full_name: &str) -> Result<()> {
    let length = full_name.trim().chars().count();
    if !(2..=50).contains(&length) {
        return Err(AppError::Validation(
            "Full name must be between 2 and 50 characters".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_file_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains('/') || name.contains('\\') {
        return Err(AppError::Validation("Invalid file name".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(validate_email("a@x.com").is_ok());
        assert!(validate_email("first.last@sub.example.org").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@x.com").is_err());
        assert!(validate_email("a@b@x.com").is_err());
        assert!(validate_email("a@localhost").is_err());
        assert!(validate_email("a b@x.com").is_err());
    }

    #[test]
    fn test_full_name_validation() {
        assert!(validate_full_name("Ada Lovelace").is_ok());
        assert!(validate_full_name("A").is_err());
        assert!(validate_full_name(&"x".repeat(51)).is_err());
    }

    #[test]
    fn test_file_name_validation() {
        assert!(validate_file_name("report.pdf").is_ok());
        assert!(validate_file_name("  ").is_err());
        assert!(validate_file_name("../etc/passwd").is_err());
    }
}
