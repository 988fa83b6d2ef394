pub mod webdriver;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Opaque lookup key for an element on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Css(String),
    /// Innermost element whose whole text contains `text` ignoring case,
    /// or equals it when `exact`.
    Text { text: String, exact: bool },
    XPath(String),
}

impl Selector {
    /// `text=...`, `text="..."`, `xpath=...` or a CSS selector.
    pub fn parse(raw: &str) -> Self {
        if let Some(text) = raw.strip_prefix("text=") {
            let quoted = text.len() >= 2 && text.starts_with('"') && text.ends_with('"');
            if quoted {
                return Selector::Text {
                    text: text[1..text.len() - 1].to_string(),
                    exact: true,
                };
            }
            return Selector::Text {
                text: text.to_string(),
                exact: false,
            };
        }
        if let Some(xpath) = raw.strip_prefix("xpath=") {
            return Selector::XPath(xpath.to_string());
        }
        Selector::Css(raw.to_string())
    }

    pub fn button_with_text(text: &str) -> Self {
        Selector::XPath(format!(
            "//button[contains(normalize-space(.), {})]",
            xpath_literal(text)
        ))
    }

    /// XPath form of the non-CSS variants.
    pub fn to_xpath(&self) -> Option<String> {
        match self {
            Selector::Css(_) => None,
            Selector::Text { text, exact: false } => {
                let folded = format!(
                    "translate(normalize-space(string(.)), '{}', '{}')",
                    UPPERCASE,
                    UPPERCASE.to_lowercase()
                );
                let test = format!(
                    "contains({}, {})",
                    folded,
                    xpath_literal(&text.to_lowercase())
                );
                Some(innermost(&test))
            }
            Selector::Text { text, exact: true } => Some(innermost(&format!(
                "normalize-space(string(.)) = {}",
                xpath_literal(text)
            ))),
            Selector::XPath(xpath) => Some(xpath.clone()),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(css) => f.write_str(css),
            Selector::Text { text, exact: false } => write!(f, "text={}", text),
            Selector::Text { text, exact: true } => write!(f, "text=\"{}\"", text),
            Selector::XPath(xpath) => write!(f, "xpath={}", xpath),
        }
    }
}

/// XPath 1.0 has no lower-case(); translate() folds these instead.
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZАБВГДЕЁЖЗИЙКЛМНОПРСТУФХЦЧШЩЪЫЬЭЮЯ";

/// Elements matching `test` none of whose descendants also match, so text
/// split across inline children still resolves to the element holding it.
fn innermost(test: &str) -> String {
    format!("//*[{test}][not(.//*[{test}])]")
}

/// XPath 1.0 has no escape syntax, so mixed quotes need concat().
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value
            .split('\'')
            .map(|part| format!("'{}'", part))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

#[derive(Debug, Error)]
pub enum UiError {
    #[error("timed out after {:.1}s waiting for {}", .after.as_secs_f64(), .what)]
    Timeout { what: String, after: Duration },
    #[error("browser command failed: {0}")]
    Command(String),
    #[error("{0}")]
    Assertion(String),
}

/// One browser tab driven by a scenario. Every `wait_*` call is bounded and
/// fails with `UiError::Timeout` once its bound passes.
#[async_trait]
pub trait Page: Send {
    async fn goto(&mut self, url: &str) -> Result<(), UiError>;

    async fn current_url(&mut self) -> Result<String, UiError>;

    /// Replace the value of an input.
    async fn fill(&mut self, selector: &Selector, value: &str) -> Result<(), UiError>;

    async fn click(&mut self, selector: &Selector) -> Result<(), UiError>;

    /// Wait until the document finished loading.
    async fn wait_loaded(&mut self, timeout: Duration) -> Result<(), UiError>;

    async fn wait_visible(&mut self, selector: &Selector, timeout: Duration)
        -> Result<(), UiError>;

    async fn wait_disabled(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<(), UiError>;

    async fn wait_url(&mut self, url: &str, timeout: Duration) -> Result<(), UiError>;

    async fn wait_title(&mut self, title: &str, timeout: Duration) -> Result<(), UiError>;

    /// Current HTML of the page.
    async fn source(&mut self) -> Result<String, UiError>;

    /// PNG bytes.
    async fn screenshot(&mut self) -> Result<Vec<u8>, UiError>;

    /// Drop cookies and storage so the next navigation starts logged out.
    async fn reset_session(&mut self) -> Result<(), UiError>;

    async fn close(&mut self) -> Result<(), UiError>;
}

/// Opens a fresh `Page` per scenario.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Page>, UiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selectors() {
        assert_eq!(
            Selector::parse(r#"button[type="submit"]"#),
            Selector::Css(r#"button[type="submit"]"#.to_string())
        );
        assert_eq!(
            Selector::parse("text=Новый пароль"),
            Selector::Text {
                text: "Новый пароль".to_string(),
                exact: false
            }
        );
        assert_eq!(
            Selector::parse(r#"text="Введите пароль""#),
            Selector::Text {
                text: "Введите пароль".to_string(),
                exact: true
            }
        );
        assert_eq!(
            Selector::parse("xpath=//h1"),
            Selector::XPath("//h1".to_string())
        );
    }

    #[test]
    fn test_display_round_trips_config_value() {
        for raw in [
            r#"input[placeholder="E-mail"]"#,
            "text=Моя организация",
            r#"text="Введите пароль""#,
            "xpath=//main",
        ] {
            assert_eq!(Selector::parse(raw).to_string(), raw);
        }
    }

    #[test]
    fn test_text_xpath_folds_case_over_full_text() {
        let contains = Selector::parse("text=Пароль успешно ИЗМЕНЕН")
            .to_xpath()
            .unwrap();
        let folded = format!(
            "translate(normalize-space(string(.)), '{}', '{}')",
            UPPERCASE,
            UPPERCASE.to_lowercase()
        );
        let test = format!("contains({}, 'пароль успешно изменен')", folded);
        assert_eq!(contains, format!("//*[{test}][not(.//*[{test}])]"));
        // Own text nodes only would miss "Пароль <b>успешно</b> изменен".
        assert!(!contains.contains("text()"));
    }

    #[test]
    fn test_exact_text_xpath() {
        let exact = Selector::parse(r#"text="Введите пароль""#)
            .to_xpath()
            .unwrap();
        assert_eq!(
            exact,
            "//*[normalize-space(string(.)) = 'Введите пароль']\
             [not(.//*[normalize-space(string(.)) = 'Введите пароль'])]"
        );
        assert!(Selector::parse("div.main").to_xpath().is_none());
    }

    #[test]
    fn test_case_folding_table_is_aligned() {
        let upper: Vec<char> = UPPERCASE.chars().collect();
        let lower: Vec<char> = UPPERCASE.to_lowercase().chars().collect();
        assert_eq!(upper.len(), lower.len());
        assert!(upper.iter().zip(&lower).all(|(u, l)| u.to_lowercase().eq([*l])));
    }

    #[test]
    fn test_xpath_literal_quotes() {
        assert_eq!(xpath_literal("plain"), "'plain'");
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(
            xpath_literal(r#"it's "quoted""#),
            r#"concat('it', "'", 's "quoted"')"#
        );
    }

    #[test]
    fn test_button_with_text() {
        let selector = Selector::button_with_text("user@example.com");
        assert_eq!(
            selector.to_xpath().unwrap(),
            "//button[contains(normalize-space(.), 'user@example.com')]"
        );
    }
}
