pub mod mailgun;

use async_trait::async_trait;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Stand-in when no mail provider is configured: logs the email and reports
/// success, so booking flows behave the same in development.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        tracing::info!("mail provider not configured, dropping email to {to}: {subject}");
        Ok(())
    }
}
