//! Webhook notifier — HTTP/1 POST of scale events.
//!
//! The body is a JSON object:
//!
//! ```text
//! {"subject": "...", "message": "Scaled out cluster orders by adding 2 replicas.",
//!  "event": {"type": "scaled_out", "cluster_id": "orders", "added": 2}}
//! ```
//!
//! Only plain `http://` endpoints are supported. Any 2xx response counts
//! as delivered.

use std::time::Duration;

use bytes::Bytes;
use http::Uri;
use http_body_util::Full;
use serde::Serialize;
use tracing::debug;

use readscale_core::{BoxFuture, Notifier, NotifyError, ScaleEvent};

/// Subject line carried by every notification.
pub const NOTIFICATION_SUBJECT: &str = "Read Replica Autoscaler Notification";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct Payload<'a> {
    subject: &'a str,
    message: String,
    event: &'a ScaleEvent,
}

/// Delivers events to a single HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    uri: Uri,
    /// `host:port` to connect to.
    address: String,
    timeout: Duration,
}

impl WebhookNotifier {
    /// Parse `url`. Fails for anything but an absolute `http://` URL.
    pub fn new(url: &str) -> Result<Self, NotifyError> {
        let uri: Uri = url
            .parse()
            .map_err(|e| NotifyError::Delivery(format!("invalid webhook url {url:?}: {e}")))?;

        if uri.scheme_str() != Some("http") {
            return Err(NotifyError::Delivery(format!(
                "unsupported webhook url {url:?}: only http:// is supported"
            )));
        }
        let authority = uri
            .authority()
            .ok_or_else(|| NotifyError::Delivery(format!("webhook url {url:?} has no host")))?;
        let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));

        Ok(Self {
            uri,
            address,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post(&self, event: &ScaleEvent) -> Result<(), NotifyError> {
        let body = serde_json::to_vec(&Payload {
            subject: NOTIFICATION_SUBJECT,
            message: event.message(),
            event,
        })
        .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| NotifyError::Delivery(format!("connect {}: {e}", self.address)))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| NotifyError::Delivery(format!("handshake: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let host = self
            .uri
            .authority()
            .map(|a| a.as_str())
            .unwrap_or(self.address.as_str());
        let path = self
            .uri
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/");
        let req = http::Request::builder()
            .method(http::Method::POST)
            .uri(path)
            .header(http::header::HOST, host)
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::USER_AGENT, "readscale/0.1")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| NotifyError::Delivery(format!("request: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            debug!(%status, uri = %self.uri, "notification delivered");
            Ok(())
        } else {
            Err(NotifyError::Rejected(status.as_u16()))
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify<'a>(&'a self, event: &'a ScaleEvent) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, self.post(event)).await {
                Ok(result) => result,
                Err(_) => Err(NotifyError::Timeout),
            }
        })
    }
}
