//! Notification routing infrastructure.
//!
//! - [`router`] — severity-based fan-out across channels with per-delivery
//!   logging; one channel's failure never suppresses the others.
//! - [`delivery`] — channel adapters (SMTP email, chat webhook, SMS stub).
//!   Adapters are opaque to the router; it only sees success/failure and
//!   an error string.

pub mod delivery;
pub mod router;

pub use delivery::email::{EmailConfig, EmailDelivery};
pub use delivery::sms::SmsDelivery;
pub use delivery::webhook::WebhookDelivery;
pub use router::{Notification, NotificationRouter};
