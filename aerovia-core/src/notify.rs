use async_trait::async_trait;

use crate::CoreResult;

/// Outbound email collaborator. Delivery is best-effort everywhere it is
/// used: callers log failures and never roll back the triggering
/// operation.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> CoreResult<()>;
}

/// Default mailer for environments without an SMTP relay: the message is
/// traced and dropped.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> CoreResult<()> {
        tracing::info!(
            to,
            subject,
            body_len = html_body.len(),
            "correo saliente (solo log)"
        );
        Ok(())
    }
}

/// Everything the ticket collaborator needs, carried explicitly instead
/// of being read off arbitrary objects at runtime.
#[derive(Debug, Clone)]
pub struct TicketData {
    pub code: String,
    pub buyer_name: String,
    pub buyer_email: String,
    pub lines: Vec<String>,
    pub total_cents: i64,
}

/// PDF ticket rendering collaborator.
pub trait TicketRenderer: Send + Sync {
    fn render(&self, ticket: &TicketData) -> CoreResult<Vec<u8>>;
}

/// Placeholder renderer: emits a syntactically recognizable PDF stream
/// carrying the reservation code. Not a layout engine; it exists so the
/// download plumbing works end to end.
pub struct StubTicketRenderer;

impl TicketRenderer for StubTicketRenderer {
    fn render(&self, ticket: &TicketData) -> CoreResult<Vec<u8>> {
        let text = format!(
            "Boleto {} / {} <{}> / total {} centavos / {} segmentos",
            ticket.code,
            ticket.buyer_name,
            ticket.buyer_email,
            ticket.total_cents,
            ticket.lines.len()
        );
        let mut out = b"%PDF-1.4\n".to_vec();
        out.extend_from_slice(
            format!(
                "1 0 obj << /Type /Catalog >> endobj\n% {}\n",
                text.replace('\n', " ")
            )
            .as_bytes(),
        );
        out.extend_from_slice(b"%%EOF\n");
        Ok(out)
    }
}
