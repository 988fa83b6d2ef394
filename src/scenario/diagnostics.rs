use std::path::{Path, PathBuf};

use crate::browser::Page;

/// Files written for one failed scenario. Either may be missing if the
/// browser could not produce it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedDiagnostics {
    pub screenshot: Option<PathBuf>,
    pub html: Option<PathBuf>,
}

/// Saves a screenshot and the page source when a scenario fails.
#[derive(Debug, Clone)]
pub struct DiagnosticCapture {
    dir: PathBuf,
}

impl DiagnosticCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Never fails: a diagnostics problem must not hide the scenario's own
    /// error, so every failure here is logged and skipped.
    pub async fn capture(&self, scenario: &str, page: &mut dyn Page) -> CapturedDiagnostics {
        let mut captured = CapturedDiagnostics::default();

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            tracing::warn!(
                "Failed to create diagnostics dir {}: {}",
                self.dir.display(),
                e
            );
            return captured;
        }

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let stem = scenario.replace(|c: char| !c.is_ascii_alphanumeric() && c != '-', "_");

        match page.screenshot().await {
            Ok(png) => {
                let path = self.dir.join(format!("error_{}_{}.png", stem, timestamp));
                captured.screenshot = self.write(path, &png).await;
            }
            Err(e) => tracing::warn!("Could not take screenshot: {}", e),
        }

        match page.source().await {
            Ok(html) => {
                let path = self
                    .dir
                    .join(format!("error_{}_page_{}.html", stem, timestamp));
                captured.html = self.write(path, html.as_bytes()).await;
            }
            Err(e) => tracing::warn!("Could not read page source: {}", e),
        }

        captured
    }

    async fn write(&self, path: PathBuf, contents: &[u8]) -> Option<PathBuf> {
        match tokio::fs::write(&path, contents).await {
            Ok(()) => {
                tracing::info!("Saved {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!("Failed to write {}: {}", path.display(), e);
                None
            }
        }
    }
}
