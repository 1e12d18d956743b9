//! Ticket mailer adapter.
//!
//! Template rendering and SMTP delivery are owned by the mail subsystem
//! outside this service; this adapter hands the payload over and records the
//! attempt. The shipped implementation logs the dispatch, which keeps the
//! fire-and-forget contract honest in environments without a mail relay.

use async_trait::async_trait;
use tracing::info;

use crate::domain::ports::{TicketEmail, TicketMailer, TicketMailerError};

/// Mailer that records ticket dispatches in the log stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTicketMailer;

#[async_trait]
impl TicketMailer for LogTicketMailer {
    async fn send_ticket(&self, email: TicketEmail) -> Result<(), TicketMailerError> {
        info!(
            to = %email.to,
            booking_id = %email.booking_id,
            ticket_id = %email.ticket_id,
            slots = email.lines.len(),
            "ticket email dispatched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use uuid::Uuid;

    use crate::domain::ticket::TicketId;

    #[rstest]
    #[tokio::test]
    async fn log_mailer_accepts_dispatches() {
        let mailer = LogTicketMailer;
        let email = TicketEmail {
            to: "team@example.test".to_owned(),
            booking_id: Uuid::new_v4(),
            ticket_id: TicketId::from_stored("SCZ123456"),
            lines: vec![],
        };
        mailer.send_ticket(email).await.expect("dispatch succeeds");
    }
}
