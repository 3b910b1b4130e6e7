//! Payment provider accounts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{DomainError, DomainResult};

/// Provider-specific configuration, selected by `provider_code`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderConfig {
    Wechat {
        app_id: String,
        mch_id: String,
        api_key: String,
    },
    Alipay {
        app_id: String,
        private_key: String,
        alipay_public_key: String,
    },
    Stripe {
        secret_key: String,
        webhook_secret: String,
    },
    Paypal {
        client_id: String,
        client_secret: String,
        #[serde(default)]
        sandbox: bool,
    },
}

impl ProviderConfig {
    /// Parses the stored JSON blob for the given provider code.
    pub fn parse(provider_code: &str, config: &serde_json::Value) -> DomainResult<Self> {
        let mut object = match config {
            serde_json::Value::Object(map) => map.clone(),
            serde_json::Value::Null => serde_json::Map::new(),
            _ => return Err(DomainError::invalid("Provider config must be a JSON object")),
        };
        object.insert(
            "provider".to_string(),
            serde_json::Value::String(provider_code.to_ascii_lowercase()),
        );

        let parsed: ProviderConfig = serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| DomainError::invalid(format!("Invalid {} config: {}", provider_code, e)))?;
        parsed.ensure_complete()?;
        Ok(parsed)
    }

    pub fn provider_code(&self) -> &'static str {
        match self {
            ProviderConfig::Wechat { .. } => "wechat",
            ProviderConfig::Alipay { .. } => "alipay",
            ProviderConfig::Stripe { .. } => "stripe",
            ProviderConfig::Paypal { .. } => "paypal",
        }
    }

    fn ensure_complete(&self) -> DomainResult<()> {
        let fields: Vec<&str> = match self {
            ProviderConfig::Wechat {
                app_id,
                mch_id,
                api_key,
            } => vec![app_id.as_str(), mch_id.as_str(), api_key.as_str()],
            ProviderConfig::Alipay {
                app_id,
                private_key,
                alipay_public_key,
            } => vec![app_id.as_str(), private_key.as_str(), alipay_public_key.as_str()],
            ProviderConfig::Stripe {
                secret_key,
                webhook_secret,
            } => vec![secret_key.as_str(), webhook_secret.as_str()],
            ProviderConfig::Paypal {
                client_id,
                client_secret,
                ..
            } => vec![client_id.as_str(), client_secret.as_str()],
        };
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(DomainError::invalid(format!(
                "{} config has empty fields",
                self.provider_code()
            )));
        }
        Ok(())
    }
}

/// A merchant account at a payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAccount {
    pub id: i64,
    pub provider_code: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub config: serde_json::Value,
    #[serde(skip_serializing)]
    pub callback_secret: String,
    pub daily_limit: Option<Decimal>,
    pub daily_amount: Decimal,
    pub total_amount: Decimal,
    pub total_orders: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub enabled: bool,
}

impl PaymentAccount {
    /// Adds a settled payment to the statistics.
    ///
    /// Returns true when the payment pushed `daily_amount` past `daily_limit`.
    pub fn record_payment(&mut self, amount: Decimal, now: DateTime<Utc>) -> bool {
        self.daily_amount += amount;
        self.total_amount += amount;
        self.total_orders += 1;
        self.last_used_at = Some(now);
        self.daily_limit.is_some_and(|limit| self.daily_amount > limit)
    }
}

/// Request payload for creating a payment account.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentAccountRequest {
    #[validate(length(min = 1, max = 32, message = "Provider code is required"))]
    pub provider_code: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    pub config: serde_json::Value,

    #[validate(length(min = 16, max = 256, message = "Callback secret must be 16-256 characters"))]
    pub callback_secret: String,

    pub daily_limit: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_each_provider() {
        let wechat = ProviderConfig::parse(
            "wechat",
            &json!({"app_id": "wx1", "mch_id": "m1", "api_key": "k"}),
        )
        .unwrap();
        assert_eq!(wechat.provider_code(), "wechat");

        let paypal =
            ProviderConfig::parse("PayPal", &json!({"client_id": "c", "client_secret": "s"})).unwrap();
        assert_eq!(
            paypal,
            ProviderConfig::Paypal {
                client_id: "c".into(),
                client_secret: "s".into(),
                sandbox: false
            }
        );
    }

    #[test]
    fn test_parse_rejects_missing_or_empty_fields() {
        assert!(ProviderConfig::parse("stripe", &json!({"secret_key": "sk"})).is_err());
        assert!(ProviderConfig::parse(
            "stripe",
            &json!({"secret_key": "sk", "webhook_secret": "  "})
        )
        .is_err());
        assert!(ProviderConfig::parse("bitcoin", &json!({})).is_err());
        assert!(ProviderConfig::parse("alipay", &json!("x")).is_err());
    }

    #[test]
    fn test_record_payment_flags_daily_limit() {
        let mut account = PaymentAccount {
            id: 1,
            provider_code: "alipay".into(),
            name: "main".into(),
            config: json!({}),
            callback_secret: "0123456789abcdef".into(),
            daily_limit: Some(Decimal::new(5000, 2)),
            daily_amount: Decimal::new(3000, 2),
            total_amount: Decimal::new(3000, 2),
            total_orders: 1,
            last_used_at: None,
            enabled: true,
        };
        let now = Utc::now();
        assert!(!account.record_payment(Decimal::new(2000, 2), now));
        assert!(account.record_payment(Decimal::new(1, 2), now));
        assert_eq!(account.total_orders, 3);
        assert_eq!(account.last_used_at, Some(now));
    }
}
