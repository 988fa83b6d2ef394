pub mod imap;
pub mod link;
pub mod message;
pub mod poller;
pub mod store;

#[cfg(test)]
pub mod testing;

use thiserror::Error;

/// Scopes a mailbox search to the messages produced by one triggering action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    pub sender: String,
    pub unseen_only: bool,
}

impl SearchFilter {
    pub fn unseen_from(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            unseen_only: true,
        }
    }

    /// IMAP SEARCH criteria, e.g. `FROM "no-reply@example.com" UNSEEN`
    pub fn to_query(&self) -> String {
        let sender = self.sender.replace('\\', "\\\\").replace('"', "\\\"");
        let mut query = format!("FROM \"{}\"", sender);
        if self.unseen_only {
            query.push_str(" UNSEEN");
        }
        query
    }
}

/// Failures of a single mailbox poll. All are terminal for the caller.
#[derive(Debug, Error)]
pub enum PollError {
    /// Mail store unreachable, authentication refused or protocol failure.
    #[error("mail store connection failed: {0}")]
    Connection(String),
    #[error("no message with a reset link after {attempts} attempts")]
    NotFound { attempts: u32 },
    #[error("malformed message: {0}")]
    MalformedMessage(String),
}
