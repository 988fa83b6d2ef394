use super::steps::AppFlow;
use super::{AtStep, ScenarioError};
use crate::browser::{Page, Selector, UiError};
use crate::config::{TimeoutConfig, WebAppConfig};

/// The login page loads and carries the expected title.
pub async fn check_title(
    page: &mut dyn Page,
    app: &WebAppConfig,
    timeouts: TimeoutConfig,
) -> Result<(), ScenarioError> {
    let mut flow = AppFlow::new(page, app, timeouts);
    flow.open_login_page().await.at_step("OpenLoginPage")?;

    tracing::info!("Checking page title");
    flow.page()
        .wait_title(&app.expected_title, timeouts.ui)
        .await
        .at_step("CheckTitle")?;
    Ok(())
}

/// Signing in with the configured credential reaches the dashboard.
pub async fn check_login(
    page: &mut dyn Page,
    app: &WebAppConfig,
    timeouts: TimeoutConfig,
) -> Result<(), ScenarioError> {
    let mut flow = AppFlow::new(page, app, timeouts);
    flow.open_login_page().await.at_step("OpenLoginPage")?;
    flow.submit_login(&app.login).await.at_step("SubmitLogin")?;
    flow.wait_dashboard().await.at_step("Dashboard")?;

    tracing::info!("Checking account button for {}", app.login.address);
    flow.page()
        .wait_visible(&Selector::button_with_text(&app.login.address), timeouts.ui)
        .await
        .at_step("AccountButton")?;

    if let Some(expected) = &app.post_login_url {
        flow.page()
            .wait_url(expected, timeouts.ui)
            .await
            .at_step("PostLoginRedirect")?;
    }

    let url = flow.page().current_url().await.at_step("PostLoginRedirect")?;
    tracing::info!("Current URL after login: {}", url);
    Ok(())
}

/// Submitting without a password keeps the user on the login page, shows
/// the "password required" hint and leaves submit disabled.
pub async fn check_negative_login(
    page: &mut dyn Page,
    app: &WebAppConfig,
    timeouts: TimeoutConfig,
) -> Result<(), ScenarioError> {
    let s = &app.selectors;
    let mut flow = AppFlow::new(page, app, timeouts);
    flow.open_login_page().await.at_step("OpenLoginPage")?;

    let empty = app.login.with_secret("");
    flow.submit_login(&empty).await.at_step("SubmitLogin")?;

    tracing::info!("Verifying no redirect occurred");
    flow.page()
        .wait_url(app.base_url.as_str(), timeouts.ui)
        .await
        .at_step("StayOnLoginPage")?;

    let required = Selector::parse(&s.password_required);
    tracing::info!("Checking for '{}' error message", required);
    flow.page()
        .wait_visible(&required, timeouts.ui)
        .await
        .at_step("PasswordRequiredHint")?;

    tracing::info!("Checking if submit button is disabled");
    flow.page()
        .wait_disabled(&Selector::parse(&s.submit_button), timeouts.ui)
        .await
        .map_err(|e| match e {
            UiError::Timeout { .. } => UiError::Assertion(format!(
                "submit button still enabled with an empty password ({})",
                e
            )),
            other => other,
        })
        .at_step("SubmitDisabled")?;
    Ok(())
}
