use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use super::{BrowserLauncher, Page, Selector, UiError};
use crate::config::BrowserConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Owned form of a fantoccini `Locator`, so checks can be re-run.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OwnedLocator {
    Css(String),
    XPath(String),
}

impl OwnedLocator {
    fn from_selector(selector: &Selector) -> Self {
        match selector {
            Selector::Css(css) => OwnedLocator::Css(css.clone()),
            other => OwnedLocator::XPath(other.to_xpath().unwrap_or_default()),
        }
    }

    fn as_locator(&self) -> Locator<'_> {
        match self {
            OwnedLocator::Css(css) => Locator::Css(css),
            OwnedLocator::XPath(xpath) => Locator::XPath(xpath),
        }
    }
}

fn command(err: CmdError) -> UiError {
    UiError::Command(err.to_string())
}

fn capabilities(headless: bool) -> Map<String, Value> {
    let mut chrome_args = vec!["--no-sandbox", "--disable-dev-shm-usage", "--window-size=1280,1024"];
    let mut firefox_args = Vec::new();
    if headless {
        chrome_args.push("--headless=new");
        firefox_args.push("-headless");
    }

    let mut caps = Map::new();
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": chrome_args }));
    caps.insert("moz:firefoxOptions".to_string(), json!({ "args": firefox_args }));
    caps
}

/// A WebDriver session with a single window.
pub struct WebDriverPage {
    client: Client,
}

impl WebDriverPage {
    pub async fn connect(config: &BrowserConfig) -> Result<Self, UiError> {
        tracing::info!(
            "Starting WebDriver session at {} (headless: {})",
            config.webdriver_url,
            config.headless
        );
        let client = ClientBuilder::native()
            .capabilities(capabilities(config.headless))
            .connect(&config.webdriver_url)
            .await
            .map_err(|e| UiError::Command(format!("failed to start WebDriver session: {e}")))?;
        Ok(Self { client })
    }

    /// Re-run `check` until it reports true or `timeout` passes. Check
    /// errors count as "not yet": elements come and go while pages render.
    async fn poll_until<F, Fut>(
        &self,
        what: String,
        timeout: Duration,
        mut check: F,
    ) -> Result<(), UiError>
    where
        F: FnMut(Client) -> Fut + Send,
        Fut: Future<Output = Result<bool, CmdError>> + Send,
    {
        let deadline = Instant::now() + timeout;
        loop {
            match check(self.client.clone()).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => tracing::trace!("Waiting for {}: {}", what, e),
            }
            if Instant::now() >= deadline {
                return Err(UiError::Timeout {
                    what,
                    after: timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl Page for WebDriverPage {
    async fn goto(&mut self, url: &str) -> Result<(), UiError> {
        tracing::debug!("goto {}", url);
        self.client.goto(url).await.map_err(command)
    }

    async fn current_url(&mut self) -> Result<String, UiError> {
        let url = self.client.current_url().await.map_err(command)?;
        Ok(url.to_string())
    }

    async fn fill(&mut self, selector: &Selector, value: &str) -> Result<(), UiError> {
        let locator = OwnedLocator::from_selector(selector);
        let element = self
            .client
            .find(locator.as_locator())
            .await
            .map_err(command)?;
        element.clear().await.map_err(command)?;
        if !value.is_empty() {
            element.send_keys(value).await.map_err(command)?;
        }
        Ok(())
    }

    async fn click(&mut self, selector: &Selector) -> Result<(), UiError> {
        let locator = OwnedLocator::from_selector(selector);
        let element = self
            .client
            .find(locator.as_locator())
            .await
            .map_err(command)?;
        element.click().await.map_err(command)
    }

    async fn wait_loaded(&mut self, timeout: Duration) -> Result<(), UiError> {
        self.poll_until("page load".to_string(), timeout, |client| async move {
            let state = client
                .execute("return document.readyState", Vec::new())
                .await?;
            Ok(state.as_str() == Some("complete"))
        })
        .await
    }

    async fn wait_visible(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<(), UiError> {
        let locator = OwnedLocator::from_selector(selector);
        self.poll_until(format!("{} to be visible", selector), timeout, move |client| {
            let locator = locator.clone();
            async move {
                for element in client.find_all(locator.as_locator()).await? {
                    if element.is_displayed().await? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        })
        .await
    }

    async fn wait_disabled(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<(), UiError> {
        let locator = OwnedLocator::from_selector(selector);
        self.poll_until(format!("{} to be disabled", selector), timeout, move |client| {
            let locator = locator.clone();
            async move {
                let element = client.find(locator.as_locator()).await?;
                Ok(!element.is_enabled().await?)
            }
        })
        .await
    }

    async fn wait_url(&mut self, url: &str, timeout: Duration) -> Result<(), UiError> {
        let expected = url.to_string();
        self.poll_until(format!("URL {}", url), timeout, move |client| {
            let expected = expected.clone();
            async move { Ok(client.current_url().await?.as_str() == expected) }
        })
        .await
    }

    async fn wait_title(&mut self, title: &str, timeout: Duration) -> Result<(), UiError> {
        let expected = title.to_string();
        self.poll_until(format!("title '{}'", title), timeout, move |client| {
            let expected = expected.clone();
            async move { Ok(client.title().await? == expected) }
        })
        .await
    }

    async fn source(&mut self) -> Result<String, UiError> {
        self.client.source().await.map_err(command)
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, UiError> {
        self.client.screenshot().await.map_err(command)
    }

    async fn reset_session(&mut self) -> Result<(), UiError> {
        self.client.delete_all_cookies().await.map_err(command)?;
        // Storage is per origin and only reachable from a loaded page.
        if let Err(e) = self
            .client
            .execute(
                "window.localStorage.clear(); window.sessionStorage.clear();",
                Vec::new(),
            )
            .await
        {
            tracing::debug!("Could not clear web storage: {}", e);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), UiError> {
        self.client.clone().close().await.map_err(command)
    }
}

/// Starts one WebDriver session per scenario.
pub struct WebDriverLauncher {
    config: BrowserConfig,
}

impl WebDriverLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn Page>, UiError> {
        let page = WebDriverPage::connect(&self.config).await?;
        Ok(Box::new(page))
    }
}
