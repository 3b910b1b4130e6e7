//! Operator TOTP verification.
//!
//! Sensitive operations (refund application, manual payment confirmation)
//! require a 6-digit code from the operator's authenticator app.

use totp_rs::{Algorithm, Secret, TOTP};
use thiserror::Error;

const TOTP_DIGITS: usize = 6;
const TOTP_STEP: u64 = 30;
const TOTP_SKEW: u8 = 1;
const TOTP_ISSUER: &str = "AppShop";

/// Error type for TOTP operations.
#[derive(Debug, Error)]
pub enum TotpError {
    #[error("Invalid TOTP secret: {0}")]
    InvalidSecret(String),

    #[error("TOTP code must be 6 digits")]
    MalformedCode,
}

fn build(secret_base32: &str, account: &str) -> Result<TOTP, TotpError> {
    let bytes = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|e| TotpError::InvalidSecret(format!("{:?}", e)))?;

    TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        TOTP_SKEW,
        TOTP_STEP,
        bytes,
        Some(TOTP_ISSUER.to_string()),
        account.to_string(),
    )
    .map_err(|e| TotpError::InvalidSecret(e.to_string()))
}

/// Checks a code against the operator's base32 secret.
///
/// Returns `Ok(false)` for a well-formed but wrong code.
pub fn verify_code(secret_base32: &str, account: &str, code: &str) -> Result<bool, TotpError> {
    let code = code.trim();
    if code.len() != TOTP_DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(TotpError::MalformedCode);
    }
    let totp = build(secret_base32, account)?;
    Ok(totp.check_current(code).unwrap_or(false))
}

/// Produces the current code for a secret.
pub fn current_code(secret_base32: &str, account: &str) -> Result<String, TotpError> {
    build(secret_base32, account)?
        .generate_current()
        .map_err(|e| TotpError::InvalidSecret(e.to_string()))
}

/// Encodes raw secret bytes as base32 for storage.
pub fn encode_secret(raw: &[u8]) -> String {
    Secret::Raw(raw.to_vec()).to_encoded().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> String {
        encode_secret(b"12345678901234567890")
    }

    #[test]
    fn test_current_code_verifies() {
        let s = secret();
        let code = current_code(&s, "ops@example.com").unwrap();
        assert_eq!(code.len(), 6);
        assert!(verify_code(&s, "ops@example.com", &code).unwrap());
    }

    #[test]
    fn test_malformed_code_rejected() {
        let s = secret();
        assert!(matches!(
            verify_code(&s, "ops", "12ab56"),
            Err(TotpError::MalformedCode)
        ));
        assert!(matches!(
            verify_code(&s, "ops", "1234"),
            Err(TotpError::MalformedCode)
        ));
    }

    #[test]
    fn test_short_secret_rejected() {
        let short = encode_secret(b"short");
        assert!(matches!(
            verify_code(&short, "ops", "123456"),
            Err(TotpError::InvalidSecret(_))
        ));
    }
}
