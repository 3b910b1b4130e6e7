//! Withdrawal request validation and fees.

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};
use crate::models::sys_config::CommissionSettings;
use crate::models::withdraw::{WithdrawQuote, WithdrawRequest};
use crate::money::{percent_of, round_money};

/// Shown when the user already hit today's withdrawal count.
pub const DAILY_WITHDRAW_LIMIT_MESSAGE: &str = "今日提现次数已达上限";

/// Validates a withdrawal against the current settings and prices its fee.
///
/// `today_count` is the user's withdrawals today that are pending, approved
/// or completed.
pub fn quote_withdrawal(
    request: &WithdrawRequest,
    settings: &CommissionSettings,
    today_count: i64,
) -> DomainResult<WithdrawQuote> {
    let amount = request.amount;
    if amount <= Decimal::ZERO {
        return Err(DomainError::invalid("Withdrawal amount must be positive"));
    }
    if round_money(amount) != amount {
        return Err(DomainError::invalid("Withdrawal amount must have at most 2 decimals"));
    }
    if amount < settings.min_withdraw || amount > settings.max_withdraw {
        return Err(DomainError::invalid(format!(
            "Withdrawal amount must be between {} and {}",
            settings.min_withdraw, settings.max_withdraw
        )));
    }
    if !settings.withdraw_methods.contains(&request.withdraw_type) {
        return Err(DomainError::invalid(format!(
            "Withdrawal method {} is not available",
            request.withdraw_type
        )));
    }
    if today_count >= settings.daily_withdraw_count {
        return Err(DomainError::QuotaExceeded(DAILY_WITHDRAW_LIMIT_MESSAGE.to_string()));
    }

    let fee = percent_of(amount, settings.withdraw_fee);
    let actual_amount = amount - fee;
    if actual_amount.is_sign_negative() {
        return Err(DomainError::invalid("Withdrawal fee exceeds the amount"));
    }

    Ok(WithdrawQuote {
        amount,
        fee,
        actual_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::commission::CommissionAccount;
    use crate::models::withdraw::WithdrawType;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn request(amount: &str, withdraw_type: WithdrawType) -> WithdrawRequest {
        WithdrawRequest {
            amount: dec(amount),
            withdraw_type,
            account_name: "Zhang San".into(),
            account_no: "zhangsan@example.com".into(),
        }
    }

    fn settings() -> CommissionSettings {
        CommissionSettings {
            withdraw_fee: dec("2"),
            withdraw_methods: vec![WithdrawType::Alipay, WithdrawType::Bank],
            ..CommissionSettings::default()
        }
    }

    #[test]
    fn test_fee_and_freeze() {
        let quote = quote_withdrawal(&request("30.00", WithdrawType::Alipay), &settings(), 0).unwrap();
        assert_eq!(quote.fee, dec("0.60"));
        assert_eq!(quote.actual_amount, dec("29.40"));

        let mut account = CommissionAccount {
            id: 1,
            user_id: 1,
            available: dec("100"),
            frozen: Decimal::ZERO,
            total_earnings: dec("100"),
            withdrawn: Decimal::ZERO,
        };
        let flow = account.freeze(quote.amount).unwrap();
        assert_eq!((account.available, account.frozen), (dec("70"), dec("30")));
        assert_eq!((flow.balance_before, flow.balance_after), (dec("100"), dec("70")));

        account.unfreeze(quote.amount).unwrap();
        assert_eq!((account.available, account.frozen), (dec("100"), Decimal::ZERO));
    }

    #[test]
    fn test_method_must_be_allowed() {
        let err = quote_withdrawal(&request("30", WithdrawType::Wechat), &settings(), 0).unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[test]
    fn test_amount_bounds() {
        assert!(quote_withdrawal(&request("9.99", WithdrawType::Alipay), &settings(), 0).is_err());
        assert!(quote_withdrawal(&request("50000.01", WithdrawType::Alipay), &settings(), 0).is_err());
        assert!(quote_withdrawal(&request("10.001", WithdrawType::Alipay), &settings(), 0).is_err());
    }

    #[test]
    fn test_daily_count_cap() {
        let err = quote_withdrawal(&request("30", WithdrawType::Alipay), &settings(), 3).unwrap_err();
        assert_eq!(err, DomainError::QuotaExceeded(DAILY_WITHDRAW_LIMIT_MESSAGE.into()));
        assert!(quote_withdrawal(&request("30", WithdrawType::Alipay), &settings(), 2).is_ok());
    }
}
