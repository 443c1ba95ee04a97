//! Top-level runners for the install and uninstall commands
//!
//! Each runner drives one [`Orchestrator`] workflow and prints the final
//! status line. Errors are returned to `main`, which reports them and sets
//! the exit code.

use anyhow::Result;

use super::orchestration::Orchestrator;
use super::path_registry::PathChange;
use super::placement::Removal;
use crate::config::InstallerConfig;

/// Run the install workflow against the host
pub async fn run_install(config: InstallerConfig) -> Result<()> {
    let mut orchestrator = Orchestrator::new(config);
    orchestrator.reporter().heading("🔧 Mintas Installation");

    let outcome = orchestrator.install().await?;
    let reporter = orchestrator.reporter();

    reporter.success(&format!(
        "Mintas {} installed to {}",
        outcome.tag,
        outcome.location.path().display()
    ));
    match outcome.path_change {
        Some(PathChange::Added) => {
            reporter.detail("   Open a new terminal for the PATH change to take effect.")
        }
        None => reporter.detail(&format!(
            "   Add {} to your PATH manually to run mintas from any terminal.",
            outcome.location.path().display()
        )),
        _ => {}
    }
    if !outcome.warnings.is_empty() {
        log::debug!("install finished with {} warning(s)", outcome.warnings.len());
    }
    Ok(())
}

/// Run the uninstall workflow against the host
pub async fn run_uninstall(config: InstallerConfig) -> Result<()> {
    let mut orchestrator = Orchestrator::new(config);
    orchestrator.reporter().heading("🗑  Mintas Uninstallation");

    let outcome = orchestrator.uninstall().await?;
    if let Removal::Removed(_) = outcome.removal {
        orchestrator.reporter().success("Mintas uninstalled");
    }
    Ok(())
}
