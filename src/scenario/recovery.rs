use std::fmt;

use super::steps::AppFlow;
use super::{AtStep, ScenarioError};
use crate::browser::Page;
use crate::config::{Credential, MailConfig, TimeoutConfig, WebAppConfig};
use crate::mail::poller::MailboxPoller;
use crate::mail::SearchFilter;

/// Where a recovery run currently is. Strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    OnLoginPage,
    RecoveryRequested,
    AwaitingExternalLink,
    OnResetPage,
    PasswordSet,
    /// Back on the login page, signing in with the new secret.
    Reauthenticating,
    Verified,
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryState::OnLoginPage => "OnLoginPage",
            RecoveryState::RecoveryRequested => "RecoveryRequested",
            RecoveryState::AwaitingExternalLink => "AwaitingExternalLink",
            RecoveryState::OnResetPage => "OnResetPage",
            RecoveryState::PasswordSet => "PasswordSet",
            RecoveryState::Reauthenticating => "OnLoginPage(new credential)",
            RecoveryState::Verified => "Verified",
        };
        f.write_str(name)
    }
}

/// Drives one password recovery end to end: request a reset in the UI, pull
/// the link from the mailbox, set the new secret, and sign in with it.
///
/// Nothing is retried here. Every bounded wait that runs out fails the run
/// at the current state, and the poller has already done its own retrying.
pub struct RecoveryFlow<'a> {
    app: &'a WebAppConfig,
    mail: &'a MailConfig,
    mailbox: &'a Credential,
    poller: &'a MailboxPoller,
    timeouts: TimeoutConfig,
    state: RecoveryState,
}

impl<'a> RecoveryFlow<'a> {
    pub fn new(
        app: &'a WebAppConfig,
        mail: &'a MailConfig,
        mailbox: &'a Credential,
        poller: &'a MailboxPoller,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            app,
            mail,
            mailbox,
            poller,
            timeouts,
            state: RecoveryState::OnLoginPage,
        }
    }

    fn advance(&mut self, next: RecoveryState) {
        tracing::debug!("Recovery: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Reset the account's secret to `new_secret` and verify it by logging
    /// in. Returns the credential that is now valid.
    pub async fn run(
        &mut self,
        page: &mut dyn Page,
        new_secret: &str,
    ) -> Result<Credential, ScenarioError> {
        let address = self.app.login.address.clone();
        let mut flow = AppFlow::new(page, self.app, self.timeouts);

        flow.open_login_page().await.at_step(self.state)?;
        flow.request_recovery(&address).await.at_step(self.state)?;
        self.advance(RecoveryState::RecoveryRequested);

        // Resubmitting would send a second mail and leave the poller with
        // two candidate links, so a missing confirmation is final.
        flow.wait_recovery_sent().await.at_step(self.state)?;
        self.advance(RecoveryState::AwaitingExternalLink);

        tracing::info!("Fetching reset link from email");
        let filter = SearchFilter::unseen_from(self.mail.sender.clone());
        let link = self
            .poller
            .poll_for_link(self.mailbox, &filter, self.mail.max_attempts, self.mail.delay)
            .await
            .at_step(self.state)?;
        flow.open_reset_link(&link).await.at_step(self.state)?;
        self.advance(RecoveryState::OnResetPage);

        flow.submit_new_password(new_secret)
            .await
            .at_step(self.state)?;
        flow.wait_password_changed().await.at_step(self.state)?;
        self.advance(RecoveryState::PasswordSet);

        tracing::info!("Verifying login with new password");
        let credential = self.app.login.with_secret(new_secret);
        flow.open_login_page().await.at_step(self.state)?;
        self.advance(RecoveryState::Reauthenticating);
        flow.submit_login(&credential).await.at_step(self.state)?;
        flow.wait_dashboard().await.at_step(self.state)?;
        self.advance(RecoveryState::Verified);

        Ok(credential)
    }
}
