use async_trait::async_trait;

use super::{PollError, SearchFilter};
use crate::config::Credential;

/// A mail store that hands out one authenticated session per call.
/// Implemented over IMAP in production and in memory for tests.
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Connect, authenticate and select the configured folder.
    async fn open(&self, credential: &Credential) -> Result<Box<dyn MailSession>, PollError>;
}

/// An open session. The caller must call `logout` exactly once when done.
#[async_trait]
pub trait MailSession: Send {
    /// Identifiers of matching messages, oldest first.
    async fn search(&mut self, filter: &SearchFilter) -> Result<Vec<u32>, PollError>;

    /// Raw RFC 822 bytes of one message.
    async fn fetch(&mut self, id: u32) -> Result<Vec<u8>, PollError>;

    async fn logout(&mut self) -> Result<(), PollError>;
}
