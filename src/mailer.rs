use axum::async_trait;

/// Outbound-mail collaborator. Delivery semantics (transport, retries) live
/// behind this boundary; the application only hands over a rendered message.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Writes outbound mail to the log instead of delivering it. Used in
/// development and tests; a real transport implements the same trait.
#[derive(Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to = %to, subject = %subject, body_len = body.len(), "outbound mail");
        tracing::debug!(body = %body, "outbound mail body");
        Ok(())
    }
}
