//! Validation of the value objects shared by library entities. Each helper returns the
//! normalized value.

use crate::error::ProcessingError;

const ISBN_DIGITS: usize = 13;

/// Trimmed `value`, rejecting blank strings.
pub fn non_blank(
    entity: &'static str,
    field: &str,
    value: &str,
) -> Result<String, ProcessingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ProcessingError::validation(
            entity,
            format!("{field} cannot be empty"),
        ));
    }
    Ok(trimmed.to_owned())
}

/// Digits of `value`, which must contain exactly 13 of them. Separators are dropped.
pub fn isbn(entity: &'static str, value: &str) -> Result<String, ProcessingError> {
    non_blank(entity, "ISBN", value)?;

    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != ISBN_DIGITS {
        return Err(ProcessingError::validation(
            entity,
            format!("ISBN must be exactly {ISBN_DIGITS} digits"),
        ));
    }
    Ok(digits)
}

pub fn email(entity: &'static str, value: &str) -> Result<String, ProcessingError> {
    let email = non_blank(entity, "Email", value)?;
    if !email.contains('@') {
        return Err(ProcessingError::validation(entity, "Email must be valid"));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isbn_keeps_only_digits() {
        assert_eq!(isbn("Book", "978-0-13-468599-1").unwrap(), "9780134685991");
        assert_eq!(isbn("Book", " 9780134685991 ").unwrap(), "9780134685991");
    }

    #[test]
    fn isbn_needs_thirteen_digits() {
        assert!(isbn("Book", "0-13-468599-1").is_err());
        assert!(isbn("Book", "97801346859911").is_err());
        assert!(isbn("Book", "   ").is_err());
    }

    #[test]
    fn blank_values_are_rejected() {
        let error = non_blank("Book", "Title", " \t").unwrap_err();
        assert_eq!(error.to_string(), "Book failed validation: Title cannot be empty");
        assert_eq!(non_blank("Book", "Title", "  Dune ").unwrap(), "Dune");
    }

    #[test]
    fn email_needs_an_at_sign() {
        assert_eq!(
            email("Member", " ada@example.com ").unwrap(),
            "ada@example.com"
        );
        assert!(email("Member", "ada.example.com").is_err());
        assert!(email("Member", "").is_err());
    }
}
