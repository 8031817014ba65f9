//! readscale-notify — delivery of scale events.
//!
//! [`LogNotifier`] writes events to the tracing subscriber.
//! [`WebhookNotifier`] POSTs them as JSON to an HTTP endpoint.
//! Both implement [`readscale_core::Notifier`]; callers log delivery
//! failures and carry on.

pub mod log;
pub mod webhook;

pub use log::LogNotifier;
pub use webhook::{NOTIFICATION_SUBJECT, WebhookNotifier};
