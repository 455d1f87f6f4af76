//! Field validation shared by the contact and blog controllers.
//!
//! Everything here runs before any external API is touched, so malformed
//! input never costs a paid third-party call.

use validator::ValidationError;

/// Accepts North-American 10-digit numbers. Formatting characters and an
/// optional leading `1` / `+1` country code are tolerated; area code and
/// exchange must not start with 0 or 1. Phone is an optional field, so a
/// blank value passes.
pub fn validate_nanp_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.trim().is_empty() {
        return Ok(());
    }
    let mut digits: Vec<u8> = Vec::with_capacity(11);
    for c in phone.chars() {
        match c {
            '0'..='9' => digits.push(c as u8 - b'0'),
            ' ' | '-' | '.' | '(' | ')' | '+' => {}
            _ => return Err(ValidationError::new("phone")),
        }
    }

    // Strip a leading country code.
    if digits.len() == 11 && digits[0] == 1 {
        digits.remove(0);
    }
    if digits.len() != 10 {
        return Err(ValidationError::new("phone"));
    }
    // NXX rule for area code and exchange.
    if digits[0] < 2 || digits[3] < 2 {
        return Err(ValidationError::new("phone"));
    }
    Ok(())
}

/// Blog post slugs: lowercase letters, digits and hyphens only, and never
/// anything that smells like a pasted URL.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug.is_empty() {
        return Err(ValidationError::new("slug"));
    }
    if slug.contains("http://") || slug.contains("https://") || slug.contains(".com") {
        return Err(ValidationError::new("slug"));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError::new("slug"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_nanp_formats_pass() {
        for phone in [
            "5551234567",
            "555-123-4567",
            "(555) 123-4567",
            "555.123.4567",
            "1-555-123-4567",
            "+1 (555) 123-4567",
        ] {
            assert!(validate_nanp_phone(phone).is_ok(), "{phone}");
        }
    }

    #[test]
    fn short_foreign_and_garbled_numbers_fail() {
        for phone in ["123", "055-123-4567", "555-023-4567", "55512345678", "call me"] {
            assert!(validate_nanp_phone(phone).is_err(), "{phone}");
        }
    }

    #[test]
    fn blank_phone_is_treated_as_absent() {
        assert!(validate_nanp_phone("").is_ok());
        assert!(validate_nanp_phone("   ").is_ok());
    }

    #[test]
    fn plain_slugs_pass() {
        assert!(validate_slug("my-first-post").is_ok());
        assert!(validate_slug("2025-gear-roundup").is_ok());
    }

    #[test]
    fn url_fragments_and_odd_characters_fail() {
        for slug in [
            "http://evil",
            "https://evil",
            "visit-site.com",
            "My Post",
            "post_one",
            "",
        ] {
            assert!(validate_slug(slug).is_err(), "{slug:?}");
        }
    }
}
