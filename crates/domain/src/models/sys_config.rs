//! Runtime configuration read from the `sys_configs` table.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use super::withdraw::WithdrawType;
use crate::error::{DomainError, DomainResult};

/// Scope holding site-level settings.
pub const SCOPE_WEBSITE: &str = "website";

/// Scope holding commission and withdrawal settings.
pub const SCOPE_COMMISSION: &str = "commission";

/// Key of the shared free-iOS credential list.
pub const KEY_IOS_ACCOUNT: &str = "ios_account";

lazy_static::lazy_static! {
    /// `hold`, `hold-7-days` or `hold_7_days`.
    static ref HOLD_POLICY_REGEX: regex::Regex =
        regex::Regex::new(r"^hold(?:[-_](\d{1,3})[-_]days?)?$").unwrap();
}

/// A single `(scope, key, value)` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SysConfigEntry {
    #[validate(length(min = 1, max = 64, message = "Scope must be 1-64 characters"))]
    pub scope: String,

    #[validate(length(min = 1, max = 128, message = "Key must be 1-128 characters"))]
    pub key: String,

    pub value: String,
}

/// Parses the free-iOS credential list: one `account:password` per line.
///
/// Blank lines and lines without both parts are skipped.
pub fn parse_ios_accounts(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| match line.split_once(':') {
            Some((account, password)) => !account.trim().is_empty() && !password.trim().is_empty(),
            None => false,
        })
        .map(String::from)
        .collect()
}

/// When a new commission becomes spendable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementPolicy {
    Immediate,
    Hold,
}

/// Commission and withdrawal tunables, resolved per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionSettings {
    pub settlement_policy: SettlementPolicy,
    pub hold_days: i64,
    pub min_withdraw: Decimal,
    pub max_withdraw: Decimal,
    pub daily_withdraw_count: i64,
    /// Percent of the requested amount.
    pub withdraw_fee: Decimal,
    pub withdraw_methods: Vec<WithdrawType>,
    pub settlement_cycle: String,
    pub withdraw_process_days: i64,
}

impl Default for CommissionSettings {
    fn default() -> Self {
        Self {
            settlement_policy: SettlementPolicy::Immediate,
            hold_days: 7,
            min_withdraw: Decimal::from(10),
            max_withdraw: Decimal::from(50_000),
            daily_withdraw_count: 3,
            withdraw_fee: Decimal::ZERO,
            withdraw_methods: WithdrawType::ALL.to_vec(),
            settlement_cycle: "monthly".to_string(),
            withdraw_process_days: 3,
        }
    }
}

impl CommissionSettings {
    /// Builds settings from the `commission` scope. Missing keys keep defaults;
    /// malformed values are rejected.
    pub fn from_entries(entries: &HashMap<String, String>) -> DomainResult<Self> {
        let mut settings = Self::default();

        if let Some(raw) = non_empty(entries, "settlement_policy") {
            let policy = raw.to_ascii_lowercase();
            if policy == "immediate" {
                settings.settlement_policy = SettlementPolicy::Immediate;
            } else if let Some(caps) = HOLD_POLICY_REGEX.captures(&policy) {
                settings.settlement_policy = SettlementPolicy::Hold;
                if let Some(days) = caps.get(1) {
                    settings.hold_days = parse_int(days.as_str(), "settlement_policy")?;
                }
            } else {
                return Err(DomainError::invalid(format!(
                    "Unknown settlement policy: {}",
                    raw
                )));
            }
        }
        if let Some(raw) = non_empty(entries, "hold_days") {
            settings.hold_days = parse_int(raw, "hold_days")?;
        }
        if let Some(raw) = non_empty(entries, "min_withdraw") {
            settings.min_withdraw = parse_decimal(raw, "min_withdraw")?;
        }
        if let Some(raw) = non_empty(entries, "max_withdraw") {
            settings.max_withdraw = parse_decimal(raw, "max_withdraw")?;
        }
        if let Some(raw) = non_empty(entries, "daily_withdraw_count") {
            settings.daily_withdraw_count = parse_int(raw, "daily_withdraw_count")?;
        }
        if let Some(raw) = non_empty(entries, "withdraw_fee") {
            settings.withdraw_fee = parse_decimal(raw, "withdraw_fee")?;
        }
        if let Some(raw) = non_empty(entries, "withdraw_methods") {
            settings.withdraw_methods = parse_methods(raw)?;
        }
        if let Some(raw) = non_empty(entries, "settlement_cycle") {
            settings.settlement_cycle = raw.to_string();
        }
        if let Some(raw) = non_empty(entries, "withdraw_process_days") {
            settings.withdraw_process_days = parse_int(raw, "withdraw_process_days")?;
        }

        if settings.hold_days < 0 || settings.daily_withdraw_count < 0 {
            return Err(DomainError::invalid("Commission day and count settings must be non-negative"));
        }
        if settings.withdraw_fee.is_sign_negative() || settings.withdraw_fee > Decimal::ONE_HUNDRED {
            return Err(DomainError::invalid("withdraw_fee must be within 0-100"));
        }
        if settings.min_withdraw > settings.max_withdraw {
            return Err(DomainError::invalid("min_withdraw must not exceed max_withdraw"));
        }
        Ok(settings)
    }
}

fn non_empty<'a>(entries: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    entries
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_int(raw: &str, key: &str) -> DomainResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| DomainError::invalid(format!("commission.{} must be an integer", key)))
}

fn parse_decimal(raw: &str, key: &str) -> DomainResult<Decimal> {
    crate::money::parse_amount(raw)
        .ok_or_else(|| DomainError::invalid(format!("commission.{} must be a number", key)))
}

/// Accepts a JSON array (`["alipay","bank"]`) or a comma-separated list.
fn parse_methods(raw: &str) -> DomainResult<Vec<WithdrawType>> {
    let names: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(raw)
            .map_err(|e| DomainError::invalid(format!("commission.withdraw_methods: {}", e)))?
    } else {
        raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
    };
    names
        .iter()
        .map(|n| n.parse::<WithdrawType>().map_err(DomainError::InvalidInput))
        .collect()
}
