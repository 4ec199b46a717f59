//! SMS delivery stub.
//!
//! No SMS gateway is wired yet; the adapter validates configuration and
//! logs what would be sent so delivery rows and severity routing can be
//! exercised end to end. Swapping in a real gateway only touches this file.

use serde_json::Value;

/// Error type for SMS delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    /// The channel config has no `provider` entry.
    #[error("SMS provider not configured")]
    NotConfigured,

    /// The recipient is not a plausible phone number.
    #[error("Invalid phone number: {0}")]
    InvalidRecipient(String),
}

/// Stub SMS delivery adapter.
pub struct SmsDelivery;

impl SmsDelivery {
    /// "Send" an SMS: validate config and recipient, then log.
    pub async fn deliver(
        channel_config: &Value,
        phone: &str,
        subject: &str,
    ) -> Result<(), SmsError> {
        let provider = channel_config
            .get("provider")
            .and_then(Value::as_str)
            .ok_or(SmsError::NotConfigured)?;

        if !is_plausible_phone(phone) {
            return Err(SmsError::InvalidRecipient(phone.to_string()));
        }

        tracing::info!(provider, to = phone, subject, "SMS delivery (stub)");
        Ok(())
    }
}

fn is_plausible_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    digits >= 7 && phone.chars().all(|c| c.is_ascii_digit() || "+-() ".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unconfigured_provider_fails() {
        let err = SmsDelivery::deliver(&json!({}), "+1 555 123 4567", "s").await;
        assert!(matches!(err, Err(SmsError::NotConfigured)));
    }

    #[tokio::test]
    async fn configured_stub_succeeds() {
        let config = json!({"provider": "stub"});
        assert!(SmsDelivery::deliver(&config, "+1 555 123 4567", "s").await.is_ok());
    }

    #[tokio::test]
    async fn bad_phone_rejected() {
        let config = json!({"provider": "stub"});
        let err = SmsDelivery::deliver(&config, "not-a-phone", "s").await;
        assert!(matches!(err, Err(SmsError::InvalidRecipient(_))));
    }
}
