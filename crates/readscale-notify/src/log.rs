//! Notifier that only logs.

use tracing::info;

use readscale_core::{BoxFuture, Notifier, NotifyError, ScaleEvent};

/// Writes each event as an `info` record. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify<'a>(&'a self, event: &'a ScaleEvent) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            info!(cluster = %event.cluster_id(), message = %event.message(), "scale event");
            Ok(())
        })
    }
}
