use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::checks;
use super::diagnostics::{CapturedDiagnostics, DiagnosticCapture};
use super::recovery::RecoveryFlow;
use super::{AtStep, ScenarioError, ScenarioErrorKind, ScenarioKind};
use crate::browser::{BrowserLauncher, Page};
use crate::config::AppConfig;
use crate::mail::poller::MailboxPoller;

/// Verdict for one scenario.
#[derive(Debug)]
pub struct ScenarioReport {
    pub kind: ScenarioKind,
    pub outcome: Result<(), ScenarioError>,
    pub duration: Duration,
    /// Set only for failures that got far enough to have a page.
    pub diagnostics: Option<CapturedDiagnostics>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }

    /// One line per scenario, as printed at the end of a run.
    pub fn verdict(&self) -> String {
        match &self.outcome {
            Ok(()) => format!("PASS {} ({:.1}s)", self.kind, self.duration.as_secs_f64()),
            Err(e) => format!(
                "FAIL {} ({:.1}s): {}",
                self.kind,
                self.duration.as_secs_f64(),
                e
            ),
        }
    }

    /// Screenshot and page dump written for a failure, if any.
    pub fn artifacts(&self) -> Vec<&Path> {
        self.diagnostics
            .iter()
            .flat_map(|d| [d.screenshot.as_deref(), d.html.as_deref()])
            .flatten()
            .collect()
    }
}

/// Runs scenarios one after another, each in a fresh browser session.
pub struct SuiteRunner {
    config: AppConfig,
    launcher: Arc<dyn BrowserLauncher>,
    poller: MailboxPoller,
    diagnostics: DiagnosticCapture,
}

impl SuiteRunner {
    pub fn new(
        config: AppConfig,
        launcher: Arc<dyn BrowserLauncher>,
        poller: MailboxPoller,
        diagnostics: DiagnosticCapture,
    ) -> Self {
        Self {
            config,
            launcher,
            poller,
            diagnostics,
        }
    }

    pub async fn run_all(&self) -> Vec<ScenarioReport> {
        let mut reports = Vec::with_capacity(self.config.scenarios.len());
        for kind in self.config.scenarios.iter().copied() {
            reports.push(self.run(kind).await);
        }
        reports
    }

    pub async fn run(&self, kind: ScenarioKind) -> ScenarioReport {
        tracing::info!("=== Scenario: {} ===", kind);
        let started = Instant::now();

        let mut page = match self.launcher.launch().await.at_step("LaunchBrowser") {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("Scenario {} could not start: {}", kind, e);
                return ScenarioReport {
                    kind,
                    outcome: Err(e),
                    duration: started.elapsed(),
                    diagnostics: None,
                };
            }
        };

        let outcome = self.execute(kind, page.as_mut()).await;

        let diagnostics = match &outcome {
            Ok(()) => {
                tracing::info!("Scenario {} passed", kind);
                None
            }
            Err(e) => {
                tracing::error!("Scenario {} failed: {}", kind, e);
                Some(self.diagnostics.capture(kind.name(), page.as_mut()).await)
            }
        };

        if let Err(e) = page.close().await {
            tracing::warn!("Failed to close browser session: {}", e);
        }

        ScenarioReport {
            kind,
            outcome,
            duration: started.elapsed(),
            diagnostics,
        }
    }

    async fn execute(&self, kind: ScenarioKind, page: &mut dyn Page) -> Result<(), ScenarioError> {
        let app = &self.config.app;
        let timeouts = self.config.browser.timeouts;
        match kind {
            ScenarioKind::Title => checks::check_title(page, app, timeouts).await,
            ScenarioKind::Login => checks::check_login(page, app, timeouts).await,
            ScenarioKind::NegativeLogin => checks::check_negative_login(page, app, timeouts).await,
            ScenarioKind::PasswordRecovery => self.recover(page).await,
        }
    }

    /// Recover to the temporary secret, then optionally recover back so the
    /// account ends up with the secret it started with.
    async fn recover(&self, page: &mut dyn Page) -> Result<(), ScenarioError> {
        let app = &self.config.app;
        let mail = &self.config.mail;
        let timeouts = self.config.browser.timeouts;
        let mailbox = mail.credential.as_ref().ok_or_else(|| ScenarioError {
            step: "Configuration".to_string(),
            kind: ScenarioErrorKind::Configuration("EMAIL_PASSWORD not set".to_string()),
        })?;

        let mut flow = RecoveryFlow::new(app, mail, mailbox, &self.poller, timeouts);
        flow.run(page, &app.new_password).await?;
        tracing::info!("Login with new password verified");

        if !app.restore_original {
            return Ok(());
        }

        tracing::info!("Restoring original password");
        page.reset_session().await.at_step("ResetSession")?;
        let mut restore = RecoveryFlow::new(app, mail, mailbox, &self.poller, timeouts);
        restore
            .run(page, &app.login.secret)
            .await
            .map_err(|e| ScenarioError {
                step: format!("Restore/{}", e.step),
                kind: e.kind,
            })?;
        tracing::info!("Original password restored");
        Ok(())
    }
}
