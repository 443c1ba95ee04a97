//! Install and uninstall workflows
//!
//! Install walks `Idle → Detecting → Resolving → Downloading → Extracting →
//! Placing → Registering → Done`; uninstall walks `Idle → Detecting →
//! Placing → Registering → Done`. Every run passes through `CleaningUp`
//! before its terminal state, and a failure in any stage ends in `Failed`
//! after the temporary workspace has been removed.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, warn};

use super::download::{Fetcher, Platform, ReleaseResolver, extract};
use super::path_registry::{
    NoopRegistrar, PathChange, PathRegistrar, UserPathRegistrar, UserPathStore,
    default_path_store,
};
use super::placement::{InstallLocation, Placer, Removal, UnixPlacer, WindowsPlacer};
use super::privilege::{ElevationProvider, default_elevation};
use super::status::Reporter;
use super::workspace::Workspace;
use super::InstallerError;
use crate::config::InstallerConfig;

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Detecting,
    Resolving,
    Downloading,
    Extracting,
    Placing,
    Registering,
    CleaningUp,
    Done,
    Failed,
}

/// Per-platform placer and registrar, chosen once per run
pub struct Backend {
    pub placer: Box<dyn Placer>,
    pub registrar: Box<dyn PathRegistrar>,
}

impl Backend {
    pub fn for_platform(
        platform: Platform,
        config: &InstallerConfig,
        elevation: Arc<dyn ElevationProvider>,
        path_store: Arc<dyn UserPathStore>,
    ) -> Result<Self, InstallerError> {
        Ok(match platform {
            Platform::Windows => Backend {
                placer: Box::new(WindowsPlacer::new(config.install_app_dir()?)),
                registrar: Box::new(UserPathRegistrar::new(path_store)),
            },
            Platform::Linux | Platform::MacOs => Backend {
                placer: Box::new(UnixPlacer::new(config.install_bin_dir(), elevation)),
                registrar: Box::new(NoopRegistrar),
            },
        })
    }
}

/// Summary of a successful install
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub platform: Platform,
    pub tag: String,
    pub location: InstallLocation,
    /// `None` when PATH registration failed (see `warnings`)
    pub path_change: Option<PathChange>,
    pub warnings: Vec<String>,
}

/// Summary of a successful uninstall
#[derive(Debug, Clone)]
pub struct UninstallOutcome {
    pub platform: Platform,
    pub removal: Removal,
    pub path_change: Option<PathChange>,
    pub warnings: Vec<String>,
}

/// Sequences detection, download, extraction, placement and registration
pub struct Orchestrator {
    config: InstallerConfig,
    kernel_name: Option<String>,
    elevation: Arc<dyn ElevationProvider>,
    path_store: Arc<dyn UserPathStore>,
    workspace_root: Option<PathBuf>,
    reporter: Reporter,
    stage: Stage,
    history: Vec<Stage>,
}

impl Orchestrator {
    /// Orchestrator wired to the host's real capabilities
    pub fn new(config: InstallerConfig) -> Self {
        Self {
            config,
            kernel_name: None,
            elevation: default_elevation(),
            path_store: default_path_store(),
            workspace_root: None,
            reporter: Reporter::stdout(),
            stage: Stage::Idle,
            history: Vec::new(),
        }
    }

    /// Classify this kernel name instead of asking the host
    pub fn with_kernel_name(mut self, kernel: impl Into<String>) -> Self {
        self.kernel_name = Some(kernel.into());
        self
    }

    pub fn with_elevation(mut self, elevation: Arc<dyn ElevationProvider>) -> Self {
        self.elevation = elevation;
        self
    }

    pub fn with_path_store(mut self, store: Arc<dyn UserPathStore>) -> Self {
        self.path_store = store;
        self
    }

    /// Create temporary workspaces under `root` instead of the system temp dir
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Every stage entered by the last run, in order
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    fn transition(&mut self, next: Stage) {
        debug!("{:?} -> {:?}", self.stage, next);
        self.stage = next;
        self.history.push(next);
    }

    fn reset(&mut self) {
        self.history.clear();
        self.stage = Stage::Idle;
        self.history.push(Stage::Idle);
    }

    fn detect(&mut self) -> Result<(Platform, Backend), InstallerError> {
        self.transition(Stage::Detecting);
        let platform = match &self.kernel_name {
            Some(kernel) => Platform::from_kernel_name(kernel)?,
            None => Platform::detect()?,
        };
        self.reporter.detail(&format!("Platform: {platform}"));

        let backend = Backend::for_platform(
            platform,
            &self.config,
            self.elevation.clone(),
            self.path_store.clone(),
        )?;
        Ok((platform, backend))
    }

    /// Run the install workflow
    pub async fn install(&mut self) -> Result<InstallOutcome, InstallerError> {
        self.reset();
        let mut workspace = None;

        let result = self.install_stages(&mut workspace).await;

        self.transition(Stage::CleaningUp);
        if let Some(workspace) = workspace.take() {
            let path = workspace.path().to_path_buf();
            if let Err(e) = workspace.close() {
                warn!("Failed to remove workspace {}: {e}", path.display());
                self.reporter
                    .warn(&format!("could not remove {}: {e}", path.display()));
            }
        }

        self.finish(result)
    }

    async fn install_stages(
        &mut self,
        workspace: &mut Option<Workspace>,
    ) -> Result<InstallOutcome, InstallerError> {
        let (platform, backend) = self.detect()?;

        self.transition(Stage::Resolving);
        self.reporter.step("🔍 Looking up the latest release...");
        let asset = ReleaseResolver::new(&self.config)?.resolve(platform).await?;
        self.reporter
            .detail(&format!("   {} ({})", asset.filename, asset.tag));

        self.transition(Stage::Downloading);
        let ws = workspace.insert(Workspace::create(self.workspace_root.as_deref())?);
        let archive = ws.archive_path(asset.filename);
        self.reporter.step(&format!("📥 Downloading {}...", asset.filename));
        Fetcher::new(&self.config, self.reporter.is_enabled())?
            .download(&asset.download_url, &archive)
            .await?;

        self.transition(Stage::Extracting);
        self.reporter.step("📦 Extracting...");
        let payload = extract(&archive, platform, &ws.staging_dir()).await?;

        self.transition(Stage::Placing);
        let target = backend.placer.location();
        self.reporter
            .step(&format!("📍 Installing to {}...", target.path().display()));
        let location = backend.placer.place(&payload)?;

        self.transition(Stage::Registering);
        let mut warnings = Vec::new();
        let path_change = match backend.registrar.add_to_path(location.path()) {
            Ok(change) => {
                self.report_path_change(change, location.path());
                Some(change)
            }
            Err(e) => {
                self.warn_non_fatal(&e, &mut warnings);
                None
            }
        };

        Ok(InstallOutcome {
            platform,
            tag: asset.tag,
            location,
            path_change,
            warnings,
        })
    }

    /// Run the uninstall workflow
    pub async fn uninstall(&mut self) -> Result<UninstallOutcome, InstallerError> {
        self.reset();
        let result = self.uninstall_stages();
        // Uninstall owns no temporary resources
        self.transition(Stage::CleaningUp);
        self.finish(result)
    }

    fn uninstall_stages(&mut self) -> Result<UninstallOutcome, InstallerError> {
        let (platform, backend) = self.detect()?;
        let mut warnings = Vec::new();

        self.transition(Stage::Placing);
        let removal = backend.placer.remove()?;
        match &removal {
            Removal::Removed(location) => self
                .reporter
                .success(&format!("Removed {}", location.path().display())),
            Removal::NotInstalled(location) => {
                let message = format!(
                    "Mintas is not installed ({} not found)",
                    location.path().display()
                );
                warn!("{message}");
                self.reporter.warn(&message);
                warnings.push(message);
            }
        }

        self.transition(Stage::Registering);
        let location = backend.placer.location();
        let path_change = match backend.registrar.remove_from_path(location.path()) {
            Ok(change) => {
                self.report_path_change(change, location.path());
                Some(change)
            }
            Err(e) => {
                self.warn_non_fatal(&e, &mut warnings);
                None
            }
        };

        Ok(UninstallOutcome {
            platform,
            removal,
            path_change,
            warnings,
        })
    }

    fn finish<T>(&mut self, result: Result<T, InstallerError>) -> Result<T, InstallerError> {
        match result {
            Ok(outcome) => {
                self.transition(Stage::Done);
                Ok(outcome)
            }
            Err(e) => {
                self.transition(Stage::Failed);
                Err(e)
            }
        }
    }

    fn report_path_change(&self, change: PathChange, location: &std::path::Path) {
        match change {
            PathChange::Added => self
                .reporter
                .success(&format!("Added {} to your PATH", location.display())),
            PathChange::AlreadyPresent => self
                .reporter
                .detail(&format!("   {} is already on your PATH", location.display())),
            PathChange::Removed => self
                .reporter
                .success(&format!("Removed {} from your PATH", location.display())),
            PathChange::NotPresent | PathChange::Skipped => {}
        }
    }

    fn warn_non_fatal(&self, err: &InstallerError, warnings: &mut Vec<String>) {
        let message = err.to_string();
        warn!("{message}");
        self.reporter.warn(&message);
        warnings.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::path_registry::MemoryPathStore;
    use crate::install::privilege::DeniedElevation;

    struct BrokenPathStore;

    impl UserPathStore for BrokenPathStore {
        fn read(&self) -> Result<String, InstallerError> {
            Err(InstallerError::PathRegistration("registry unavailable".into()))
        }

        fn write(&self, _value: &str) -> Result<(), InstallerError> {
            Err(InstallerError::PathRegistration("registry unavailable".into()))
        }
    }

    fn config_in(dir: &std::path::Path) -> InstallerConfig {
        InstallerConfig {
            bin_dir: Some(dir.join("bin")),
            app_dir: Some(dir.join("Mintas")),
            // Unroutable so a stray network call fails fast
            api_base: "http://127.0.0.1:9".into(),
            ..InstallerConfig::default()
        }
    }

    fn orchestrator(dir: &std::path::Path, kernel: &str) -> Orchestrator {
        Orchestrator::new(config_in(dir))
            .with_kernel_name(kernel)
            .with_elevation(Arc::new(DeniedElevation))
            .with_path_store(Arc::new(MemoryPathStore::new(r"C:\Windows")))
            .with_reporter(Reporter::silent())
            .with_workspace_root(dir.join("tmp"))
    }

    #[tokio::test]
    async fn unsupported_platform_fails_after_detecting() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(dir.path(), "SunOS");

        let err = orch.install().await.unwrap_err();
        assert!(matches!(err, InstallerError::UnsupportedPlatform(_)));
        assert_eq!(
            orch.history(),
            &[Stage::Idle, Stage::Detecting, Stage::CleaningUp, Stage::Failed]
        );
    }

    #[tokio::test]
    async fn uninstall_of_nothing_warns_and_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(dir.path(), "Linux");

        let outcome = orch.uninstall().await.unwrap();
        assert!(matches!(outcome.removal, Removal::NotInstalled(_)));
        assert_eq!(outcome.path_change, Some(PathChange::Skipped));
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(
            orch.history(),
            &[
                Stage::Idle,
                Stage::Detecting,
                Stage::Placing,
                Stage::Registering,
                Stage::CleaningUp,
                Stage::Done
            ]
        );
    }

    #[tokio::test]
    async fn windows_uninstall_path_failure_is_non_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Mintas")).unwrap();

        let mut orch = orchestrator(dir.path(), "MINGW64_NT-10.0")
            .with_path_store(Arc::new(BrokenPathStore));

        let outcome = orch.uninstall().await.unwrap();
        assert!(matches!(outcome.removal, Removal::Removed(_)));
        assert_eq!(outcome.path_change, None);
        assert!(outcome.warnings[0].contains("registry unavailable"));
        assert_eq!(orch.stage(), Stage::Done);
        assert!(!dir.path().join("Mintas").exists());
    }

    #[tokio::test]
    async fn unreachable_release_api_is_a_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(dir.path(), "Linux");

        let err = orch.install().await.unwrap_err();
        assert!(matches!(err, InstallerError::Network(_)));
        assert_eq!(
            orch.history(),
            &[
                Stage::Idle,
                Stage::Detecting,
                Stage::Resolving,
                Stage::CleaningUp,
                Stage::Failed
            ]
        );
    }
}
