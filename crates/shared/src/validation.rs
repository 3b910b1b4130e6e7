//! Common validation and masking utilities.

use validator::ValidationError;

/// Prefix of object keys served without a signature.
pub const PUBLIC_PREFIX: &str = "public/";

/// Prefix of object keys served only through signed URLs.
pub const PRIVATE_PREFIX: &str = "private/";

/// Validates an object-store key.
///
/// Keys must live under `public/` or `private/`, must not start with `/`
/// and must not contain `..` segments.
pub fn validate_object_key(key: &str) -> Result<(), ValidationError> {
    let fail = |msg: &'static str| {
        let mut err = ValidationError::new("object_key");
        err.message = Some(msg.into());
        Err(err)
    };

    if key.starts_with('/') {
        return fail("Object key must not start with '/'");
    }
    if key.contains("..") {
        return fail("Object key must not contain '..'");
    }
    if !(key.starts_with(PUBLIC_PREFIX) || key.starts_with(PRIVATE_PREFIX)) {
        return fail("Object key must start with 'public/' or 'private/'");
    }
    if key == PUBLIC_PREFIX || key == PRIVATE_PREFIX {
        return fail("Object key must name an object");
    }
    Ok(())
}

/// Returns true if the key is served without a signature.
pub fn is_public_key(key: &str) -> bool {
    key.starts_with(PUBLIC_PREFIX)
}

/// Validates a plan code: 2-32 chars of `A-Z`, `a-z`, `0-9`, `_`, `-`.
pub fn validate_code(code: &str) -> Result<(), ValidationError> {
    let ok = (2..=32).contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        let mut err = ValidationError::new("code_format");
        err.message =
            Some("Code must be 2-32 characters of letters, digits, '_' or '-'".into());
        Err(err)
    }
}

/// Masks a payout account number for display.
///
/// - longer than 8 characters: first two and last two visible
/// - 5 to 8 characters: first and last visible
/// - 4 or fewer: fully masked
pub fn mask_account_no(account_no: &str) -> String {
    let chars: Vec<char> = account_no.chars().collect();
    let len = chars.len();
    let keep = match len {
        0..=4 => 0,
        5..=8 => 1,
        _ => 2,
    };

    let mut masked = String::with_capacity(len);
    for (i, c) in chars.iter().enumerate() {
        if i < keep || i >= len - keep {
            masked.push(*c);
        } else {
            masked.push('*');
        }
    }
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_object_keys() {
        assert!(validate_object_key("public/icons/a.png").is_ok());
        assert!(validate_object_key("private/package/app-1.0.apk").is_ok());
    }

    #[test]
    fn test_invalid_object_keys() {
        assert!(validate_object_key("/private/package/a.apk").is_err());
        assert!(validate_object_key("private/../etc/passwd").is_err());
        assert!(validate_object_key("package/a.apk").is_err());
        assert!(validate_object_key("private/").is_err());
        assert!(validate_object_key("").is_err());
    }

    #[test]
    fn test_is_public_key() {
        assert!(is_public_key("public/a.apk"));
        assert!(!is_public_key("private/a.apk"));
    }

    #[test]
    fn test_validate_code() {
        assert!(validate_code("VIP_MONTH").is_ok());
        assert!(validate_code("a").is_err());
        assert!(validate_code("bad code").is_err());
    }

    #[test]
    fn test_mask_long_account() {
        assert_eq!(mask_account_no("6222021234567890"), "62************90");
        assert_eq!(mask_account_no("abcdefghi"), "ab*****hi");
    }

    #[test]
    fn test_mask_medium_account() {
        assert_eq!(mask_account_no("abcdefgh"), "a******h");
        assert_eq!(mask_account_no("abcde"), "a***e");
    }

    #[test]
    fn test_mask_short_account() {
        assert_eq!(mask_account_no("abcd"), "****");
        assert_eq!(mask_account_no(""), "");
    }

    #[test]
    fn test_mask_multibyte() {
        assert_eq!(mask_account_no("张三丰先生的银行账户"), "张三******账户");
    }
}
