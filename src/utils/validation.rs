use crate::utils::error::{BookingError, FieldError, Result};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 \-]*[0-9]$").expect("valid phone regex"));

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(BookingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(BookingError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(BookingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(BookingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(BookingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| BookingError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(BookingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

// 以下為表單欄位檢查，回傳 FieldError 以便一次收集全部錯誤

pub fn check_non_empty(field_name: &str, value: &str) -> std::result::Result<(), FieldError> {
    if value.trim().is_empty() {
        return Err(FieldError::new(field_name, "This field is required"));
    }
    Ok(())
}

pub fn check_max_len(
    field_name: &str,
    value: &str,
    max: usize,
) -> std::result::Result<(), FieldError> {
    if value.chars().count() > max {
        return Err(FieldError::new(
            field_name,
            format!("Must be at most {} characters", max),
        ));
    }
    Ok(())
}

pub fn check_email(field_name: &str, value: &str) -> std::result::Result<(), FieldError> {
    check_non_empty(field_name, value)?;
    if !EMAIL_RE.is_match(value.trim()) {
        return Err(FieldError::new(field_name, "Enter a valid email address"));
    }
    Ok(())
}

pub fn check_phone(field_name: &str, value: &str) -> std::result::Result<(), FieldError> {
    check_non_empty(field_name, value)?;
    let trimmed = value.trim();
    let digits = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
    if !PHONE_RE.is_match(trimmed) || !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
        return Err(FieldError::new(field_name, "Enter a valid phone number"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("api.base_url", "https://example.com").is_ok());
        assert!(validate_url("api.base_url", "http://localhost:8000").is_ok());
        assert!(validate_url("api.base_url", "").is_err());
        assert!(validate_url("api.base_url", "invalid-url").is_err());
        assert!(validate_url("api.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("booking.horizon_days", 30, 1, 365).is_ok());
        assert!(validate_range("booking.horizon_days", 0, 1, 365).is_err());
    }

    #[test]
    fn test_check_email() {
        assert!(check_email("email", "jane@example.org").is_ok());
        assert!(check_email("email", " jane@example.org ").is_ok());
        assert!(check_email("email", "jane@").is_err());
        assert!(check_email("email", "").is_err());
    }

    #[test]
    fn test_check_phone() {
        assert!(check_phone("phone", "+233 24 123 4567").is_ok());
        assert!(check_phone("phone", "0241234567").is_ok());
        assert!(check_phone("phone", "12345").is_err());
        assert!(check_phone("phone", "call-me").is_err());
        assert!(check_phone("phone", "+1234567890123456").is_err());
    }

    #[test]
    fn test_check_max_len() {
        assert!(check_max_len("purpose", "renewal", 10).is_ok());
        let err = check_max_len("purpose", "passport renewal", 10).unwrap_err();
        assert_eq!(err.field, "purpose");
    }
}
