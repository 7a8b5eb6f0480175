//! Error types for brokers and the event processor.

use crate::status::Status;
use std::fmt;
use thiserror::Error;

/// Error categories decide what happens to the message that caused them.
///
/// - **Transient**: downstream hiccup, nack so the broker redelivers
/// - **Permanent**: bad input or broken business rule, ack and give up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Temporary failure (database unavailable, timeout)
    Transient,

    /// Unrecoverable failure (malformed payload, validation)
    Permanent,
}

impl ErrorCategory {
    /// Final message status for this category.
    pub fn status(&self) -> Status {
        match self {
            ErrorCategory::Transient => Status::Retry,
            ErrorCategory::Permanent => Status::Failed,
        }
    }

    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorCategory::Transient)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Transient => write!(f, "transient"),
            ErrorCategory::Permanent => write!(f, "permanent"),
        }
    }
}

/// Errors raised by a broker backend.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Could not reach the broker
    #[error("broker connection error: {0}")]
    Connection(String),

    /// No subscription with this id exists
    #[error("subscription '{id}' not found: {details}")]
    SubscriptionNotFound { id: String, details: String },

    /// Subscription went away while listening (deleted, closed)
    #[error("subscription '{0}' closed")]
    SubscriptionClosed(String),

    /// Receiving from a subscription failed
    #[error("receive error on '{id}': {details}")]
    Receive { id: String, details: String },

    /// Ack or nack could not be delivered
    #[error("acknowledgement error: {0}")]
    Ack(String),

    /// Publishing failed
    #[error("publish error: {0}")]
    Publish(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BrokerError {
    pub fn not_found(id: impl Into<String>, details: impl Into<String>) -> Self {
        Self::SubscriptionNotFound {
            id: id.into(),
            details: details.into(),
        }
    }

    /// Whether a listener must stop and report upwards.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BrokerError::SubscriptionNotFound { .. } | BrokerError::SubscriptionClosed(_)
        )
    }
}

/// Errors surfaced by the event processor to its supervisor.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Subscription id could not be resolved while building
    #[error("event '{event}': unknown subscription '{subscription_id}'")]
    UnknownSubscription {
        event: String,
        subscription_id: String,
        #[source]
        source: BrokerError,
    },

    /// Throttle must allow at least one outstanding message
    #[error("event '{event}': throttle must be at least 1, got {throttle}")]
    InvalidThrottle { event: String, throttle: usize },

    /// A listener stopped because its subscription failed
    #[error("event '{event}': subscription failed: {source}")]
    Subscription {
        event: String,
        #[source]
        source: BrokerError,
    },

    /// A listener task died without returning (panic or abort)
    #[error("event '{event}': listener task failed: {details}")]
    Listener { event: String, details: String },
}

impl ProcessorError {
    /// Name of the event the error belongs to.
    pub fn event(&self) -> &str {
        match self {
            ProcessorError::UnknownSubscription { event, .. }
            | ProcessorError::InvalidThrottle { event, .. }
            | ProcessorError::Subscription { event, .. }
            | ProcessorError::Listener { event, .. } => event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_status() {
        assert_eq!(ErrorCategory::Transient.status(), Status::Retry);
        assert_eq!(ErrorCategory::Permanent.status(), Status::Failed);
        assert!(ErrorCategory::Transient.should_retry());
        assert!(!ErrorCategory::Permanent.should_retry());
    }

    #[test]
    fn test_broker_error_fatality() {
        assert!(BrokerError::not_found("sub", "missing").is_fatal());
        assert!(BrokerError::SubscriptionClosed("sub".into()).is_fatal());
        assert!(!BrokerError::Ack("timeout".into()).is_fatal());
        assert!(!BrokerError::Receive {
            id: "sub".into(),
            details: "heartbeat".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_unknown_subscription_message() {
        let err = ProcessorError::UnknownSubscription {
            event: "AddArticle".into(),
            subscription_id: "add-article-sub".into(),
            source: BrokerError::not_found("add-article-sub", "no such consumer"),
        };
        assert_eq!(err.event(), "AddArticle");
        assert!(err.to_string().contains("add-article-sub"));
        assert!(err.to_string().contains("AddArticle"));
    }
}
