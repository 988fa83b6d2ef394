pub mod checks;
pub mod diagnostics;
pub mod recovery;
pub mod runner;
pub mod steps;

use anyhow::bail;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::browser::UiError;
use crate::mail::PollError;

/// The scenarios the suite knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioKind {
    Title,
    Login,
    NegativeLogin,
    PasswordRecovery,
}

impl ScenarioKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::Title => "title",
            ScenarioKind::Login => "login",
            ScenarioKind::NegativeLogin => "negative-login",
            ScenarioKind::PasswordRecovery => "password-recovery",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "title" => Ok(ScenarioKind::Title),
            "login" => Ok(ScenarioKind::Login),
            "negative-login" => Ok(ScenarioKind::NegativeLogin),
            "password-recovery" | "recovery" => Ok(ScenarioKind::PasswordRecovery),
            other => bail!("Unknown scenario '{}'", other),
        }
    }
}

/// Why a scenario failed.
#[derive(Debug, Error)]
pub enum ScenarioErrorKind {
    #[error("mail store connection error: {0}")]
    Connection(String),
    #[error("reset mail not found: {0}")]
    NotFound(String),
    #[error("malformed reset mail: {0}")]
    MalformedMessage(String),
    #[error("UI timeout: {0}")]
    UiTimeout(String),
    #[error("browser error: {0}")]
    Browser(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<PollError> for ScenarioErrorKind {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Connection(_) => ScenarioErrorKind::Connection(err.to_string()),
            PollError::NotFound { .. } => ScenarioErrorKind::NotFound(err.to_string()),
            PollError::MalformedMessage(_) => ScenarioErrorKind::MalformedMessage(err.to_string()),
        }
    }
}

impl From<UiError> for ScenarioErrorKind {
    fn from(err: UiError) -> Self {
        match err {
            UiError::Timeout { .. } => ScenarioErrorKind::UiTimeout(err.to_string()),
            UiError::Command(_) => ScenarioErrorKind::Browser(err.to_string()),
            UiError::Assertion(msg) => ScenarioErrorKind::Assertion(msg),
        }
    }
}

/// A terminal scenario failure: what went wrong and at which step.
#[derive(Debug, Error)]
#[error("{kind} (step: {step})")]
pub struct ScenarioError {
    pub step: String,
    pub kind: ScenarioErrorKind,
}

pub trait AtStep<T> {
    /// Tag a failure with the step it happened in.
    fn at_step(self, step: impl fmt::Display) -> Result<T, ScenarioError>;
}

impl<T, E> AtStep<T> for Result<T, E>
where
    E: Into<ScenarioErrorKind>,
{
    fn at_step(self, step: impl fmt::Display) -> Result<T, ScenarioError> {
        self.map_err(|e| ScenarioError {
            step: step.to_string(),
            kind: e.into(),
        })
    }
}
