use async_smtp::{Envelope, SendableEmail, SmtpClient, SmtpTransport};
use tokio::{io::BufStream, net::TcpStream};

use crate::configuration::DispatchSettings;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to connect to smtp relay: {0}")]
    Connect(#[from] std::io::Error),
    #[error("smtp rejected the message: {0}")]
    Smtp(String),
    #[error("invalid address: {0}")]
    Address(String),
}

/// Transmits a rendered outbound message. Failures are reported, never
/// allowed to block contact persistence.
#[allow(async_fn_in_trait)]
pub trait MessageDispatcher {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), DispatchError>;
}

/// Plain-text `{{token}}` substitution, matching what the templates use.
pub fn render_template(template: &str, recipient_name: &str) -> String {
    template.replace("{{recipient_name}}", recipient_name)
}

pub struct SmtpDispatcher {
    host: String,
    port: u16,
    from_email: String,
}

impl SmtpDispatcher {
    pub fn new(settings: &DispatchSettings) -> Self {
        SmtpDispatcher {
            host: settings.smtp_host.clone(),
            port: settings.smtp_port,
            from_email: settings.from_email.clone(),
        }
    }
}

impl MessageDispatcher for SmtpDispatcher {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), DispatchError> {
        let from = self
            .from_email
            .parse()
            .map_err(|e| DispatchError::Address(format!("{:?}", e)))?;
        let recipient = to
            .parse()
            .map_err(|e| DispatchError::Address(format!("{:?}", e)))?;
        let envelope = Envelope::new(Some(from), vec![recipient])
            .map_err(|e| DispatchError::Smtp(format!("{:?}", e)))?;

        let message = format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\n\r\n{}",
            self.from_email, to, subject, body
        );

        let stream = BufStream::new(TcpStream::connect((self.host.as_str(), self.port)).await?);
        let client = SmtpClient::new();
        let mut transport = SmtpTransport::new(client, stream)
            .await
            .map_err(|e| DispatchError::Smtp(format!("{:?}", e)))?;

        transport
            .send(SendableEmail::new(envelope, message))
            .await
            .map_err(|e| DispatchError::Smtp(format!("{:?}", e)))?;
        transport
            .quit()
            .await
            .map_err(|e| DispatchError::Smtp(format!("{:?}", e)))?;

        Ok(())
    }
}
