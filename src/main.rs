mod browser;
mod cli;
mod config;
mod mail;
mod scenario;

use clap::Parser;
use std::sync::Arc;

use browser::webdriver::WebDriverLauncher;
use cli::Cli;
use config::AppConfig;
use mail::imap::ImapMailStore;
use mail::link::LinkPattern;
use mail::poller::MailboxPoller;
use scenario::diagnostics::DiagnosticCapture;
use scenario::runner::SuiteRunner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    cli.apply(&mut config)?;

    tracing::info!("resetcheck starting...");
    tracing::info!("Application: {}", config.app.base_url);
    tracing::info!("WebDriver: {}", config.browser.webdriver_url);
    tracing::info!(
        "Mailbox: {}:{}/{}",
        config.mail.imap_host,
        config.mail.imap_port,
        config.mail.folder
    );
    tracing::info!(
        "Scenarios: {}",
        config
            .scenarios
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let store = ImapMailStore::from_config(&config.mail);
    let pattern = LinkPattern::for_app(&config.app.base_url)?;
    tracing::debug!("Reset link pattern: {}", pattern.as_str());
    let poller = MailboxPoller::new(Arc::new(store), pattern);
    let launcher = WebDriverLauncher::new(config.browser.clone());
    let diagnostics = DiagnosticCapture::new(config.diagnostics.dir.clone());
    tracing::info!("Diagnostics directory: {}", diagnostics.dir().display());

    let runner = SuiteRunner::new(config, Arc::new(launcher), poller, diagnostics);
    let reports = runner.run_all().await;

    for report in &reports {
        println!("{}", report.verdict());
        for path in report.artifacts() {
            println!("    saved {}", path.display());
        }
    }

    let failed = reports.iter().filter(|r| !r.passed()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} scenarios failed", failed, reports.len());
    }
    Ok(())
}
