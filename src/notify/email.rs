// src/notify/email.rs

//! SMTP mail delivery.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{AppError, Result};
use crate::models::EmailConfig;
use crate::notify::Notifier;

/// Sends notifications over STARTTLS SMTP. A no-op when disabled.
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn mailbox(address: &str) -> Result<Mailbox> {
        address
            .trim()
            .parse()
            .map_err(|e| AppError::notification(format!("invalid address '{address}': {e}")))
    }

    /// Assemble the multipart message.
    fn build_message(
        &self,
        subject: &str,
        body: &str,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<Message> {
        let mut builder = Message::builder()
            .from(Self::mailbox(&self.config.sender_email)?)
            .subject(subject);
        for recipient in &self.config.recipients {
            builder = builder.to(Self::mailbox(recipient)?);
        }

        let csv = ContentType::parse("text/csv").map_err(AppError::notification)?;
        let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(body.to_string()));
        for (name, bytes) in files {
            multipart = multipart.singlepart(Attachment::new(name).body(bytes, csv.clone()));
        }

        builder.multipart(multipart).map_err(AppError::notification)
    }

    /// Read attachment files, skipping the ones that are gone.
    async fn read_attachments(attachments: &[PathBuf]) -> Vec<(String, Vec<u8>)> {
        let mut files = Vec::new();
        for path in attachments {
            match tokio::fs::read(path).await {
                Ok(bytes) => files.push((file_name(path), bytes)),
                Err(e) => log::warn!("Skipping attachment {}: {}", path.display(), e),
            }
        }
        files
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, subject: &str, body: &str, attachments: &[PathBuf]) -> Result<()> {
        if !self.config.enabled {
            log::info!("Email notifications are disabled");
            return Ok(());
        }

        let files = Self::read_attachments(attachments).await;
        let message = self.build_message(subject, body, files)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_server)
            .map_err(AppError::notification)?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.sender_email.clone(),
                self.config.sender_password.clone(),
            ))
            .build();

        mailer.send(message).await.map_err(AppError::notification)?;
        log::info!(
            "Email notification sent to {}",
            self.config.recipients.join(", ")
        );
        Ok(())
    }
}
