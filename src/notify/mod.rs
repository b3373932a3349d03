//! Notification delivery.

mod email;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

pub use email::EmailNotifier;

/// Delivers a subject, a plain-text body and file attachments.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str, attachments: &[PathBuf]) -> Result<()>;
}
