use messaging::{ErrorCategory, Message};
use std::fmt::Display;
use tracing::{Span, error};

/// Resolve a message whose handler gave up.
///
/// Transient errors nack with status `Retry` so the broker redelivers.
/// Permanent errors set `Failed` and ack, dropping the message.
/// The error is logged and recorded on the current `event` span.
pub async fn handle_error<E: Display>(msg: &mut Message, err: &E, category: ErrorCategory) {
    Span::current().record("error", tracing::field::display(err));

    msg.set_status(category.status());
    if category.should_retry() {
        msg.nack().await;
    } else {
        msg.ack().await;
    }

    error!(
        message_id = %msg.id(),
        attempt = msg.delivery_attempt(),
        category = %category,
        error = %err,
        "Event error"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::RecordingAcker;
    use messaging::Status;

    #[tokio::test]
    async fn test_permanent_error_fails_and_acks() {
        let acker = RecordingAcker::default();
        let mut msg = Message::new("1", b"{}".to_vec(), acker.clone());

        handle_error(&mut msg, &"bad payload", ErrorCategory::Permanent).await;

        assert_eq!(msg.status(), Status::Failed);
        assert_eq!(acker.calls(), vec!["ack"]);
    }

    #[tokio::test]
    async fn test_transient_error_retries_and_nacks() {
        let acker = RecordingAcker::default();
        let mut msg = Message::new("1", b"{}".to_vec(), acker.clone());

        handle_error(&mut msg, &"db down", ErrorCategory::Transient).await;

        assert_eq!(msg.status(), Status::Retry);
        assert_eq!(acker.calls(), vec!["nack"]);
    }

    #[tokio::test]
    async fn test_status_survives_later_ack() {
        let acker = RecordingAcker::default();
        let mut msg = Message::new("1", b"{}".to_vec(), acker.clone());

        handle_error(&mut msg, &"bad payload", ErrorCategory::Permanent).await;
        msg.ack().await;

        assert_eq!(msg.status(), Status::Failed);
        assert_eq!(acker.calls(), vec!["ack", "ack"]);
    }
}
