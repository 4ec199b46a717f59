//! Request handlers, one module per resource.

pub mod health;
pub mod jobs;
pub mod notifications;
pub mod quality;
pub mod sanitization;
pub mod schedules;
