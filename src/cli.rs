use clap::Parser;
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::scenario::ScenarioKind;

#[derive(Parser, Debug)]
#[command(name = "resetcheck")]
#[command(about = "End-to-end login and password-recovery checks over WebDriver and IMAP")]
#[command(version)]
pub struct Cli {
    /// Scenarios to run, overriding SUITE_SCENARIOS
    /// (title, login, negative-login, password-recovery)
    #[arg(value_delimiter = ',')]
    pub scenarios: Vec<ScenarioKind>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,

    /// Where failure screenshots and page dumps go
    #[arg(long)]
    pub diagnostics_dir: Option<PathBuf>,
}

impl Cli {
    /// Lay the command line over the environment-derived configuration.
    pub fn apply(self, config: &mut AppConfig) -> anyhow::Result<()> {
        if self.headed {
            config.browser.headless = false;
        }
        if let Some(dir) = self.diagnostics_dir {
            config.diagnostics.dir = dir;
        }
        if self.scenarios.is_empty() {
            return config.validate();
        }
        config.select_scenarios(self.scenarios)
    }
}
