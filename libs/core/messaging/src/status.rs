//! Processing status carried by every delivered message.

use std::fmt;

/// Outcome of handling a message.
///
/// `Failed` and `Retry` are both failures, but only `Retry` leads to
/// redelivery: `Failed` messages are acked and dropped from the backlog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Nothing decided yet
    #[default]
    Unset,
    /// Handled successfully and acked
    Ok,
    /// Given up on; acked so the broker does not redeliver
    Failed,
    /// Nacked; the broker redelivers per its own policy
    Retry,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unset => "unset",
            Status::Ok => "ok",
            Status::Failed => "failed",
            Status::Retry => "retry",
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Status::Unset)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
