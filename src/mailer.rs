// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Delivery of accepted submissions.
//!
//! The relay owns the mail transport. This service only hands it a composed
//! message, either over HTTP or, in development, by logging it.

use crate::config::{MailBackend, MailConfig};
use crate::email::OutboundEmail;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Delivery failure. Details are logged, never returned to the submitter.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Mail relay rejected message: {status} {body}")]
    Rejected { status: u16, body: String },

    #[error("Mail relay not configured: {0}")]
    NotConfigured(&'static str),
}

/// Delivery collaborator.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError>;
}

/// Build the mailer selected by `config`.
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, DeliveryError> {
    match config.backend {
        MailBackend::Log => Ok(Arc::new(LogMailer)),
        MailBackend::Http => {
            let endpoint = config
                .endpoint
                .clone()
                .ok_or(DeliveryError::NotConfigured("mail.endpoint"))?;
            Ok(Arc::new(HttpMailer::new(
                endpoint,
                config.api_token.clone(),
                config.timeout(),
            )?))
        }
    }
}

/// Mailer that records the message in the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        info!(
            to = %email.to,
            from = %email.from_display,
            subject = %email.subject,
            body_len = email.html_body.len(),
            "Mail delivery disabled, message logged"
        );
        Ok(())
    }
}

/// Mail relay client.
///
/// Posts the message as JSON to the relay endpoint:
/// `{"to", "from", "reply_to", "subject", "html"}`.
pub struct HttpMailer {
    endpoint: String,
    api_token: Option<String>,
    client: reqwest::Client,
}

impl HttpMailer {
    /// Create new relay client
    pub fn new(
        endpoint: String,
        api_token: Option<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint,
            api_token,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        let mut request = self.client.post(&self.endpoint).json(&serde_json::json!({
            "to": email.to,
            "from": email.from_display,
            "reply_to": email.reply_to,
            "subject": email.subject,
            "html": email.html_body,
        }));
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                debug!(error = %err, status = status.as_u16(), "Failed to read mail relay response body");
                format!("<unreadable body: {err}>")
            }
        };
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(512).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::time::Duration;

    /// Serve one canned HTTP response on loopback and return the endpoint.
    fn canned_relay(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            read_request(&mut socket);
            socket.write_all(response.as_bytes()).unwrap();
        });
        format!("http://{addr}/send")
    }

    fn read_request(socket: &mut impl Read) {
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&request);
            let Some(header_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let content_length = text[..header_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= header_end + 4 + content_length {
                return;
            }
        }
    }

    fn email() -> OutboundEmail {
        OutboundEmail {
            to: "inbox@example.org".to_string(),
            from_display: "Ada <ada@example.com>".to_string(),
            reply_to: "ada@example.com".to_string(),
            subject: "Hello".to_string(),
            html_body: "<p>Hi</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        tokio_test::assert_ok!(LogMailer.send(&email()).await);
    }

    #[test]
    fn test_from_config_log_backend() {
        assert!(from_config(&MailConfig::default()).is_ok());
    }

    #[test]
    fn test_from_config_http_without_endpoint() {
        let config = MailConfig {
            backend: MailBackend::Http,
            ..Default::default()
        };
        assert!(matches!(
            from_config(&config),
            Err(DeliveryError::NotConfigured("mail.endpoint"))
        ));
    }

    #[test]
    fn test_http_mailer_creation() {
        let mailer = HttpMailer::new(
            "http://localhost:8025/send".to_string(),
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(mailer.endpoint(), "http://localhost:8025/send");
    }

    #[tokio::test]
    async fn test_http_mailer_unreachable_relay() {
        // Port 9 (discard) on loopback is not expected to accept HTTP.
        let mailer = HttpMailer::new(
            "http://127.0.0.1:9/send".to_string(),
            Some("token".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(matches!(
            mailer.send(&email()).await,
            Err(DeliveryError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_http_mailer_reports_relay_rejection() {
        let endpoint = canned_relay(
            "HTTP/1.1 502 Bad Gateway\r\nContent-Length: 13\r\nConnection: close\r\n\r\nrelay is down",
        );
        let mailer = HttpMailer::new(endpoint, None, Duration::from_secs(5)).unwrap();

        match mailer.send(&email()).await {
            Err(DeliveryError::Rejected { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "relay is down");
            }
            other => panic!("Expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_mailer_keeps_unreadable_body_error() {
        // Promises more body than it sends, then hangs up.
        let endpoint = canned_relay(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 100\r\nConnection: close\r\n\r\npartial",
        );
        let mailer = HttpMailer::new(endpoint, None, Duration::from_secs(5)).unwrap();

        match mailer.send(&email()).await {
            Err(DeliveryError::Rejected { status, body }) => {
                assert_eq!(status, 503);
                assert!(body.starts_with("<unreadable body:"), "got {body:?}");
            }
            other => panic!("Expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    #[ignore] // Requires a mail relay running
    async fn test_http_mailer_delivers() {
        let mailer = HttpMailer::new(
            "http://localhost:8025/send".to_string(),
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(mailer.send(&email()).await.is_ok());
    }
}
