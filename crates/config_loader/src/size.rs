//! Byte size parsing
//!
//! Accepts bare digits (`1024`), a `B` suffix (`1024B`) or a `KB` suffix
//! (`256KB` = 262144). Suffixes are case-insensitive.

use contracts::ContractError;

const KILOBYTE: usize = 1024;

/// Parse a human-readable byte size into a positive number of bytes
pub fn parse_byte_size(value: &str) -> Result<usize, ContractError> {
    let trimmed = value.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (digits, multiplier) = if let Some(digits) = upper.strip_suffix("KB") {
        (digits, KILOBYTE)
    } else if let Some(digits) = upper.strip_suffix('B') {
        (digits, 1)
    } else {
        (upper.as_str(), 1)
    };

    let digits = digits.trim_end();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ContractError::config_validation(
            "size",
            format!("'{value}' is not a size, expected digits with an optional B or KB suffix"),
        ));
    }

    let number: usize = digits.parse().map_err(|_| {
        ContractError::config_validation("size", format!("'{value}' is out of range"))
    })?;
    let bytes = number.checked_mul(multiplier).ok_or_else(|| {
        ContractError::config_validation("size", format!("'{value}' is out of range"))
    })?;

    if bytes == 0 {
        return Err(ContractError::config_validation(
            "size",
            format!("'{value}' must be greater than 0"),
        ));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(parse_byte_size("256KB").unwrap(), 262_144);
        assert_eq!(parse_byte_size("256kb").unwrap(), 262_144);
        assert_eq!(parse_byte_size("100B").unwrap(), 100);
        assert_eq!(parse_byte_size("4096").unwrap(), 4096);
        assert_eq!(parse_byte_size(" 1 KB ").unwrap(), 1024);
    }

    #[test]
    fn test_reject_zero_and_garbage() {
        assert!(parse_byte_size("0").is_err());
        assert!(parse_byte_size("0KB").is_err());
        assert!(parse_byte_size("KB").is_err());
        assert!(parse_byte_size("12MB").is_err());
        assert!(parse_byte_size("-5").is_err());
        assert!(parse_byte_size("").is_err());
    }

    #[test]
    fn test_overflow_is_error() {
        let huge = format!("{}KB", usize::MAX);
        let err = parse_byte_size(&huge).unwrap_err().to_string();
        assert!(err.contains("out of range"), "got: {err}");
    }
}
