use anyhow::{bail, Context};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::scenario::ScenarioKind;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: WebAppConfig,
    pub mail: MailConfig,
    pub browser: BrowserConfig,
    pub diagnostics: DiagnosticsConfig,
    pub scenarios: Vec<ScenarioKind>,
}

/// An address/secret pair. Immutable for the whole run.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub address: String,
    pub secret: String,
}

impl Credential {
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret: secret.into(),
        }
    }

    /// Same address, different secret.
    pub fn with_secret(&self, secret: impl Into<String>) -> Self {
        Self::new(self.address.clone(), secret)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct WebAppConfig {
    /// Always ends with a slash so relative paths join under it.
    pub base_url: Url,
    pub expected_title: String,
    /// Asserted after login only when set.
    pub post_login_url: Option<String>,
    pub login: Credential,
    pub new_password: String,
    pub restore_original: bool,
    pub selectors: UiSelectors,
}

impl WebAppConfig {
    pub fn recovery_url(&self) -> anyhow::Result<Url> {
        self.base_url
            .join(&self.selectors.recovery_path)
            .context("Invalid recovery path")
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub folder: String,
    pub sender: String,
    /// Mailbox access credential; `None` when recovery is not run.
    pub credential: Option<Credential>,
    pub max_attempts: u32,
    pub delay: Duration,
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub timeouts: TimeoutConfig,
}

/// Upper bounds for every UI wait.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    pub ui: Duration,
    pub confirmation: Duration,
    pub password_set: Duration,
    pub dashboard: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            ui: Duration::from_secs(10),
            confirmation: Duration::from_secs(15),
            password_set: Duration::from_secs(20),
            dashboard: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    pub dir: PathBuf,
}

/// Lookup keys for the application's pages.
///
/// `text=...` matches an element containing the text, `text="..."` matches
/// the exact text, `xpath=...` is passed through, anything else is CSS.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UiSelectors {
    pub email_input: String,
    pub password_input: String,
    pub submit_button: String,
    pub forgot_password_link: String,
    pub recovery_path: String,
    pub recovery_hint: String,
    pub recovery_email_input: String,
    pub recovery_sent: String,
    pub new_password_heading: String,
    pub new_password_input: String,
    pub confirm_password_input: String,
    pub password_changed: String,
    pub dashboard_landmark: String,
    pub password_required: String,
}

impl Default for UiSelectors {
    fn default() -> Self {
        Self {
            email_input: r#"input[placeholder="Введите e-mail"]"#.to_string(),
            password_input: r#"input[placeholder="Введите пароль"]"#.to_string(),
            submit_button: r#"button[type="submit"]"#.to_string(),
            forgot_password_link: r#"a[href="/password-recovery"]"#.to_string(),
            recovery_path: "password-recovery".to_string(),
            recovery_hint: "text=Если вы забыли пароль, введите e-mail".to_string(),
            recovery_email_input: r#"input[placeholder="E-mail"]"#.to_string(),
            recovery_sent: "text=Инструкция по восстановлению отправлена на указанную почту"
                .to_string(),
            new_password_heading: "text=Новый пароль".to_string(),
            new_password_input: r#"input[placeholder="Введите пароль"]"#.to_string(),
            confirm_password_input: r#"input[placeholder="Повторите пароль"]"#.to_string(),
            password_changed: "text=Пароль успешно изменен".to_string(),
            dashboard_landmark: "text=Моя организация".to_string(),
            password_required: r#"text="Введите пароль""#.to_string(),
        }
    }
}

/// Optional TOML file pointed to by `SUITE_CONFIG`.
#[derive(Debug, Default, Deserialize)]
struct FileOverlay {
    selectors: Option<UiSelectors>,
}

impl AppConfig {
    /// Read the environment (and `.env`) without validating. Callers apply
    /// their overrides and then call `validate`.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::read(|key| std::env::var(key).ok())
    }

    /// Build and validate the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::read(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse every variable, applying defaults. Cross-field checks are left
    /// to `validate`.
    pub fn read<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let secs = |key: &str, default: u64| -> anyhow::Result<Duration> {
            match lookup(key) {
                Some(v) => Ok(Duration::from_secs(
                    v.trim()
                        .parse()
                        .with_context(|| format!("{key} must be a number of seconds"))?,
                )),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let address = lookup("TEST_EMAIL").context("TEST_EMAIL not set")?;
        let password = lookup("TEST_PASSWORD").context("TEST_PASSWORD not set")?;

        let selectors = match lookup("SUITE_CONFIG") {
            Some(path) => load_selectors(Path::new(&path))?,
            None => UiSelectors::default(),
        };

        let scenarios = parse_scenarios(&var(
            "SUITE_SCENARIOS",
            "title,login,negative-login,password-recovery",
        ))?;

        let mailbox_address = lookup("EMAIL_ADDRESS").unwrap_or_else(|| address.clone());
        let credential =
            lookup("EMAIL_PASSWORD").map(|secret| Credential::new(mailbox_address, secret));

        Ok(Self {
            app: WebAppConfig {
                base_url: parse_base_url(&var("APP_BASE_URL", "https://cicada.develop.apt.lan/"))?,
                expected_title: var("EXPECTED_TITLE", "CICADA8"),
                post_login_url: lookup("POST_LOGIN_URL").filter(|v| !v.trim().is_empty()),
                login: Credential::new(address, password),
                new_password: var("RECOVERY_NEW_PASSWORD", "new_temp_password_123"),
                restore_original: parse_bool(
                    "RECOVERY_RESTORE_ORIGINAL",
                    &var("RECOVERY_RESTORE_ORIGINAL", "true"),
                )?,
                selectors,
            },
            mail: MailConfig {
                imap_host: var("EMAIL_IMAP_HOST", "mail.cicada8.ru"),
                imap_port: var("EMAIL_IMAP_PORT", "993")
                    .parse()
                    .context("EMAIL_IMAP_PORT must be a port number")?,
                folder: var("EMAIL_FOLDER", "INBOX"),
                sender: var("RESET_MAIL_SENDER", "no-reply-dev@cicada8.ru"),
                credential,
                max_attempts: var("POLL_MAX_ATTEMPTS", "10")
                    .parse()
                    .context("POLL_MAX_ATTEMPTS must be a number")?,
                delay: secs("POLL_DELAY_SECS", 5)?,
            },
            browser: BrowserConfig {
                webdriver_url: var("WEBDRIVER_URL", "http://localhost:4444"),
                headless: parse_bool("BROWSER_HEADLESS", &var("BROWSER_HEADLESS", "true"))?,
                timeouts: TimeoutConfig {
                    ui: secs("UI_TIMEOUT_SECS", 10)?,
                    confirmation: secs("CONFIRMATION_TIMEOUT_SECS", 15)?,
                    password_set: secs("PASSWORD_SET_TIMEOUT_SECS", 20)?,
                    dashboard: secs("DASHBOARD_TIMEOUT_SECS", 60)?,
                },
            },
            diagnostics: DiagnosticsConfig {
                dir: PathBuf::from(var("DIAGNOSTICS_DIR", "screenshot")),
            },
            scenarios,
        })
    }

    /// Replace the scenario selection and re-check the configuration
    /// against it.
    pub fn select_scenarios(&mut self, kinds: Vec<ScenarioKind>) -> anyhow::Result<()> {
        self.scenarios = dedup_scenarios(kinds)?;
        self.validate()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mail.max_attempts == 0 {
            bail!("POLL_MAX_ATTEMPTS must be at least 1");
        }
        if self.scenarios.contains(&ScenarioKind::PasswordRecovery) && self.mail.credential.is_none()
        {
            bail!("EMAIL_PASSWORD not set but password-recovery is selected");
        }
        if self.app.new_password == self.app.login.secret {
            bail!("RECOVERY_NEW_PASSWORD must differ from TEST_PASSWORD");
        }
        Ok(())
    }
}

fn parse_base_url(raw: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(raw).with_context(|| format!("Invalid APP_BASE_URL: {raw}"))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_bool(key: &str, raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{key} must be a boolean, got '{other}'"),
    }
}

fn parse_scenarios(raw: &str) -> anyhow::Result<Vec<ScenarioKind>> {
    let kinds = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<anyhow::Result<Vec<ScenarioKind>>>()?;
    dedup_scenarios(kinds)
}

/// First occurrence wins; an empty selection is an error.
fn dedup_scenarios(selected: Vec<ScenarioKind>) -> anyhow::Result<Vec<ScenarioKind>> {
    let mut kinds = Vec::new();
    for kind in selected {
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        bail!("No scenarios selected");
    }
    Ok(kinds)
}

fn load_selectors(path: &Path) -> anyhow::Result<UiSelectors> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let overlay: FileOverlay =
        toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(overlay.selectors.unwrap_or_default())
}
