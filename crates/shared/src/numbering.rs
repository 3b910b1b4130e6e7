//! Human-readable business numbers (order, withdrawal, account, flow).

use chrono::{DateTime, Utc};
use rand::Rng;

/// Returns `n` random decimal digits.
pub fn random_digits(n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// `ORD<yyyymmddHHMMSS><6 digits>`
pub fn order_no(now: DateTime<Utc>) -> String {
    format!("ORD{}{}", now.format("%Y%m%d%H%M%S"), random_digits(6))
}

/// `WD<yyyymmddHHMMSS><6 digits>`
pub fn withdraw_no(now: DateTime<Utc>) -> String {
    format!("WD{}{}", now.format("%Y%m%d%H%M%S"), random_digits(6))
}

/// `ACC<yyyymmdd><6 digits>`
pub fn account_no(now: DateTime<Utc>) -> String {
    format!("ACC{}{}", now.format("%Y%m%d"), random_digits(6))
}

/// `FL<yyyymmddHHMMSS><8 digits>`, the idempotency key of a ledger row.
pub fn flow_no(now: DateTime<Utc>) -> String {
    format!("FL{}{}", now.format("%Y%m%d%H%M%S"), random_digits(8))
}

/// Eight characters from an alphabet without look-alikes (no 0/O, 1/I/L).
pub fn referral_code() -> String {
    const ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

/// `RF<yyyymmddHHMMSS><6 digits>`
pub fn refund_no(now: DateTime<Utc>) -> String {
    format!("RF{}{}", now.format("%Y%m%d%H%M%S"), random_digits(6))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 8, 5, 1).unwrap()
    }

    #[test]
    fn test_random_digits() {
        let d = random_digits(6);
        assert_eq!(d.len(), 6);
        assert!(d.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_account_no_format() {
        let no = account_no(ts());
        assert!(no.starts_with("ACC20240309"));
        assert_eq!(no.len(), 3 + 8 + 6);
    }

    #[test]
    fn test_order_and_withdraw_no_format() {
        assert!(order_no(ts()).starts_with("ORD20240309080501"));
        assert_eq!(order_no(ts()).len(), 3 + 14 + 6);
        assert!(withdraw_no(ts()).starts_with("WD20240309080501"));
        assert!(refund_no(ts()).starts_with("RF20240309080501"));
        assert_eq!(flow_no(ts()).len(), 2 + 14 + 8);
    }

    #[test]
    fn test_referral_code_alphabet() {
        for _ in 0..50 {
            let code = referral_code();
            assert_eq!(code.len(), 8);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
            assert!(!code.contains(['0', 'O', '1', 'I', 'L']));
        }
    }
}
