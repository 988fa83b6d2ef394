use crate::browser::{Page, Selector, UiError};
use crate::config::{Credential, TimeoutConfig, WebAppConfig};
use crate::mail::link::ResetLink;

/// The application's pages as a set of reusable steps. Login, recovery and
/// verification all go through here, with selectors and timeouts taken from
/// configuration.
pub struct AppFlow<'a> {
    page: &'a mut dyn Page,
    app: &'a WebAppConfig,
    timeouts: TimeoutConfig,
}

impl<'a> AppFlow<'a> {
    pub fn new(page: &'a mut dyn Page, app: &'a WebAppConfig, timeouts: TimeoutConfig) -> Self {
        Self {
            page,
            app,
            timeouts,
        }
    }

    pub fn page(&mut self) -> &mut dyn Page {
        &mut *self.page
    }

    fn selector(raw: &str) -> Selector {
        Selector::parse(raw)
    }

    pub async fn open_login_page(&mut self) -> Result<(), UiError> {
        tracing::info!("Navigating to login page: {}", self.app.base_url);
        self.page.goto(self.app.base_url.as_str()).await?;
        self.page.wait_loaded(self.timeouts.ui).await
    }

    /// Fill the login form and submit it. Does not wait for the outcome.
    pub async fn submit_login(&mut self, credential: &Credential) -> Result<(), UiError> {
        let s = &self.app.selectors;
        tracing::info!("Filling email: {}", credential.address);
        self.page
            .fill(&Self::selector(&s.email_input), &credential.address)
            .await?;
        self.page
            .fill(&Self::selector(&s.password_input), &credential.secret)
            .await?;

        let submit = Self::selector(&s.submit_button);
        self.page.wait_visible(&submit, self.timeouts.ui).await?;
        tracing::info!("Clicking submit button");
        self.page.click(&submit).await
    }

    pub async fn wait_dashboard(&mut self) -> Result<(), UiError> {
        let landmark = Self::selector(&self.app.selectors.dashboard_landmark);
        tracing::info!("Waiting for dashboard element: {}", landmark);
        self.page
            .wait_visible(&landmark, self.timeouts.dashboard)
            .await
    }

    /// From the login page, open the recovery form and submit `address`.
    pub async fn request_recovery(&mut self, address: &str) -> Result<(), UiError> {
        let s = &self.app.selectors;
        let ui = self.timeouts.ui;

        self.page
            .wait_visible(&Self::selector(&s.password_input), ui)
            .await?;

        let forgot = Self::selector(&s.forgot_password_link);
        tracing::info!("Looking for forgot password link: {}", forgot);
        self.page.wait_visible(&forgot, ui).await?;
        self.page.click(&forgot).await?;

        let recovery_url = self
            .app
            .recovery_url()
            .map_err(|e| UiError::Assertion(e.to_string()))?;
        tracing::info!("Waiting for password recovery page: {}", recovery_url);
        self.page.wait_url(recovery_url.as_str(), ui).await?;
        self.page
            .wait_visible(&Self::selector(&s.recovery_hint), ui)
            .await?;

        tracing::info!("Requesting password reset for email: {}", address);
        let email = Self::selector(&s.recovery_email_input);
        self.page.wait_visible(&email, ui).await?;
        self.page.fill(&email, address).await?;

        let submit = Self::selector(&s.submit_button);
        self.page.wait_visible(&submit, ui).await?;
        self.page.click(&submit).await
    }

    pub async fn wait_recovery_sent(&mut self) -> Result<(), UiError> {
        let sent = Self::selector(&self.app.selectors.recovery_sent);
        tracing::info!("Waiting for success message: {}", sent);
        self.page
            .wait_visible(&sent, self.timeouts.confirmation)
            .await
    }

    pub async fn open_reset_link(&mut self, link: &ResetLink) -> Result<(), UiError> {
        tracing::info!("Navigating to reset link: {}", link);
        self.page.goto(link.as_str()).await?;
        self.page.wait_loaded(self.timeouts.ui).await?;
        self.page
            .wait_visible(
                &Self::selector(&self.app.selectors.new_password_heading),
                self.timeouts.ui,
            )
            .await
    }

    /// Type the new secret twice and submit.
    pub async fn submit_new_password(&mut self, secret: &str) -> Result<(), UiError> {
        let s = &self.app.selectors;
        tracing::info!("Setting new password");
        self.page
            .fill(&Self::selector(&s.new_password_input), secret)
            .await?;
        self.page
            .fill(&Self::selector(&s.confirm_password_input), secret)
            .await?;

        let submit = Self::selector(&s.submit_button);
        self.page.wait_visible(&submit, self.timeouts.ui).await?;
        self.page.click(&submit).await
    }

    pub async fn wait_password_changed(&mut self) -> Result<(), UiError> {
        let changed = Self::selector(&self.app.selectors.password_changed);
        tracing::info!("Waiting for confirmation: {}", changed);
        self.page
            .wait_visible(&changed, self.timeouts.password_set)
            .await
    }
}
