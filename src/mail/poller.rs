use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::link::{LinkPattern, ResetLink};
use super::message::Message;
use super::store::{MailSession, MailStore};
use super::{PollError, SearchFilter};
use crate::config::Credential;

/// One turn of the retry loop.
#[derive(Debug, Clone, Copy)]
pub struct PollAttempt {
    pub attempt_number: u32,
    pub elapsed: Duration,
}

/// Waits for a reset mail and pulls the link out of it.
pub struct MailboxPoller {
    store: Arc<dyn MailStore>,
    pattern: LinkPattern,
}

impl MailboxPoller {
    pub fn new(store: Arc<dyn MailStore>, pattern: LinkPattern) -> Self {
        Self { store, pattern }
    }

    /// Poll the mailbox at a fixed interval until a message matching
    /// `filter` carries a reset link.
    ///
    /// Opens exactly one session and logs it out on every path once it is
    /// open. Gives up with `NotFound` after `max_attempts` searches, i.e.
    /// after `max_attempts * delay`. A malformed message ends the poll
    /// immediately.
    pub async fn poll_for_link(
        &self,
        credential: &Credential,
        filter: &SearchFilter,
        max_attempts: u32,
        delay: Duration,
    ) -> Result<ResetLink, PollError> {
        tracing::info!("Polling mailbox of {} for a reset link", credential.address);
        let mut session = self.store.open(credential).await.map_err(|e| {
            tracing::error!("Failed to open mailbox: {}", e);
            e
        })?;

        let result = self
            .poll_session(session.as_mut(), filter, max_attempts, delay)
            .await;

        if let Err(e) = session.logout().await {
            tracing::warn!("Mailbox logout failed: {}", e);
        }

        match &result {
            Ok(link) => tracing::info!("Extracted reset link: {}", link),
            Err(e) => tracing::error!("Failed to retrieve reset link: {}", e),
        }
        result
    }

    async fn poll_session(
        &self,
        session: &mut dyn MailSession,
        filter: &SearchFilter,
        max_attempts: u32,
        delay: Duration,
    ) -> Result<ResetLink, PollError> {
        let started = Instant::now();

        for attempt_number in 1..=max_attempts {
            let attempt = PollAttempt {
                attempt_number,
                elapsed: started.elapsed(),
            };
            tracing::debug!(
                "Search {}/{} after {:.1}s",
                attempt.attempt_number,
                max_attempts,
                attempt.elapsed.as_secs_f64()
            );

            let ids = session.search(filter).await?;

            // Older unread mail may be left over from earlier runs; only the
            // newest match can carry the live link.
            if let Some(&latest) = ids.last() {
                let raw = session.fetch(latest).await?;
                let message = Message::parse(&raw)?;
                tracing::info!(
                    "Found email with subject: {}",
                    message.subject.as_deref().unwrap_or("<undecoded>")
                );

                if let Some(link) = self.pattern.extract(&message.body) {
                    return Ok(link);
                }
                tracing::info!(
                    "Message {} has no reset link yet ({} body)",
                    latest,
                    if message.multipart { "multipart" } else { "single-part" }
                );
            }

            tracing::info!("No email found, retrying...");
            tokio::time::sleep(delay).await;
        }

        Err(PollError::NotFound {
            attempts: max_attempts,
        })
    }
}
