//! Scripted page for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BrowserLauncher, Page, Selector, UiError};

#[derive(Debug, Default)]
struct FakeState {
    url: String,
    title: String,
    actions: Vec<String>,
    /// Selectors that never become visible.
    hidden: HashSet<String>,
    /// Selectors that stay enabled.
    enabled: HashSet<String>,
    /// Clicking the key navigates to the value.
    navigations: HashMap<String, String>,
    closed: bool,
}

/// A page where everything is visible unless hidden, and every click on a
/// configured selector moves to a configured URL. Clones share state, so a
/// test keeps one handle while the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(self, title: &str) -> Self {
        self.state.lock().unwrap().title = title.to_string();
        self
    }

    pub fn hide(&self, selector: &str) {
        self.state.lock().unwrap().hidden.insert(selector.to_string());
    }

    pub fn keep_enabled(&self, selector: &str) {
        self.state
            .lock()
            .unwrap()
            .enabled
            .insert(selector.to_string());
    }

    pub fn navigate_on_click(&self, selector: &str, url: &str) {
        self.state
            .lock()
            .unwrap()
            .navigations
            .insert(selector.to_string(), url.to_string());
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn count(&self, action: &str) -> usize {
        self.actions().iter().filter(|a| a.as_str() == action).count()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    fn record(&self, action: String) {
        self.state.lock().unwrap().actions.push(action);
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&mut self, url: &str) -> Result<(), UiError> {
        self.record(format!("goto {}", url));
        self.state.lock().unwrap().url = url.to_string();
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, UiError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn fill(&mut self, selector: &Selector, value: &str) -> Result<(), UiError> {
        self.record(format!("fill {} = {}", selector, value));
        Ok(())
    }

    async fn click(&mut self, selector: &Selector) -> Result<(), UiError> {
        let key = selector.to_string();
        self.record(format!("click {}", key));
        let mut state = self.state.lock().unwrap();
        if let Some(url) = state.navigations.get(&key).cloned() {
            state.url = url;
        }
        Ok(())
    }

    async fn wait_loaded(&mut self, _timeout: Duration) -> Result<(), UiError> {
        Ok(())
    }

    async fn wait_visible(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<(), UiError> {
        let key = selector.to_string();
        self.record(format!("wait {}", key));
        if self.state.lock().unwrap().hidden.contains(&key) {
            return Err(UiError::Timeout {
                what: format!("{} to be visible", key),
                after: timeout,
            });
        }
        Ok(())
    }

    async fn wait_disabled(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<(), UiError> {
        let key = selector.to_string();
        if self.state.lock().unwrap().enabled.contains(&key) {
            return Err(UiError::Timeout {
                what: format!("{} to be disabled", key),
                after: timeout,
            });
        }
        Ok(())
    }

    async fn wait_url(&mut self, url: &str, timeout: Duration) -> Result<(), UiError> {
        if self.state.lock().unwrap().url != url {
            return Err(UiError::Timeout {
                what: format!("URL {}", url),
                after: timeout,
            });
        }
        Ok(())
    }

    async fn wait_title(&mut self, title: &str, timeout: Duration) -> Result<(), UiError> {
        if self.state.lock().unwrap().title != title {
            return Err(UiError::Timeout {
                what: format!("title '{}'", title),
                after: timeout,
            });
        }
        Ok(())
    }

    async fn source(&mut self) -> Result<String, UiError> {
        self.record("source".to_string());
        Ok("<html><body>fake</body></html>".to_string())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, UiError> {
        self.record("screenshot".to_string());
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn reset_session(&mut self) -> Result<(), UiError> {
        self.record("reset".to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), UiError> {
        self.record("close".to_string());
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Hands out clones of one `FakePage`, or fails when told to.
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    page: FakePage,
    unavailable: bool,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self {
            page,
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            page: FakePage::new(),
            unavailable: true,
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn Page>, UiError> {
        if self.unavailable {
            return Err(UiError::Command("connection refused".to_string()));
        }
        Ok(Box::new(self.page.clone()))
    }
}
