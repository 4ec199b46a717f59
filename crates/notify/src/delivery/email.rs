//! Email notification delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport to send
//! plain-text alert emails. Configuration comes from the channel's stored
//! config payload, with environment variables as a bootstrap fallback; if
//! no SMTP host is configured, [`EmailConfig::resolve`] returns `None` and
//! the channel reports failure without attempting a connection.

use serde_json::Value;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// No SMTP host is configured for the channel.
    #[error("SMTP host not configured")]
    NotConfigured,
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when none is configured.
const DEFAULT_FROM_ADDRESS: &str = "noreply@parcelsync.local";

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Resolve configuration from the stored channel config, falling back
    /// to environment variables.
    ///
    /// Returns `None` if no SMTP host is present in either source.
    ///
    /// | Config key / env var          | Required | Default                     |
    /// |-------------------------------|----------|-----------------------------|
    /// | `smtp_host` / `SMTP_HOST`     | yes      | —                           |
    /// | `smtp_port` / `SMTP_PORT`     | no       | `587`                       |
    /// | `from_address` / `SMTP_FROM`  | no       | `noreply@parcelsync.local`  |
    /// | `smtp_user` / `SMTP_USER`     | no       | —                           |
    /// | `smtp_password` / `SMTP_PASSWORD` | no   | —                           |
    pub fn resolve(channel_config: &Value) -> Option<Self> {
        let get = |key: &str| {
            channel_config
                .get(key)
                .and_then(Value::as_str)
                .map(String::from)
        };
        let smtp_host = get("smtp_host").or_else(|| std::env::var("SMTP_HOST").ok())?;
        Some(Self {
            smtp_host,
            smtp_port: channel_config
                .get("smtp_port")
                .and_then(Value::as_u64)
                .map(|p| p as u16)
                .or_else(|| {
                    std::env::var("SMTP_PORT").ok().and_then(|p| p.parse().ok())
                })
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: get("from_address")
                .or_else(|| std::env::var("SMTP_FROM").ok())
                .unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: get("smtp_user").or_else(|| std::env::var("SMTP_USER").ok()),
            smtp_password: get("smtp_password").or_else(|| std::env::var("SMTP_PASSWORD").ok()),
        })
    }
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends alert emails via SMTP.
pub struct EmailDelivery;

impl EmailDelivery {
    /// Send a plain-text email using the channel's stored configuration.
    pub async fn deliver(
        channel_config: &Value,
        to_email: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), EmailError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let config = EmailConfig::resolve(channel_config).ok_or(EmailError::NotConfigured)?;

        let email = Message::builder()
            .from(config.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| EmailError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(email).await?;

        tracing::info!(to = to_email, subject, "Alert email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_returns_none_without_host() {
        std::env::remove_var("SMTP_HOST");
        assert!(EmailConfig::resolve(&json!({})).is_none());
    }

    #[test]
    fn resolve_prefers_channel_config() {
        let config = json!({
            "smtp_host": "mail.assessor.example",
            "smtp_port": 2525,
            "from_address": "sync@assessor.example"
        });
        let resolved = EmailConfig::resolve(&config).unwrap();
        assert_eq!(resolved.smtp_host, "mail.assessor.example");
        assert_eq!(resolved.smtp_port, 2525);
        assert_eq!(resolved.from_address, "sync@assessor.example");
    }

    #[test]
    fn resolve_defaults_port_and_from() {
        let resolved = EmailConfig::resolve(&json!({"smtp_host": "mail.local"})).unwrap();
        assert_eq!(resolved.smtp_port, DEFAULT_SMTP_PORT);
        assert_eq!(resolved.from_address, DEFAULT_FROM_ADDRESS);
    }

    #[test]
    fn email_error_display_build() {
        let err = EmailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }

    #[test]
    fn email_error_display_address() {
        let addr_err: Result<lettre::Address, _> = "not-an-email".parse();
        let err = EmailError::Address(addr_err.unwrap_err());
        assert!(err.to_string().contains("Email address parse error"));
    }
}
