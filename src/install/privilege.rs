//! Privilege escalation for operations on protected locations
//!
//! Elevated work is expressed as a [`PrivilegedScript`] and handed to an
//! [`ElevationProvider`]. The provider is injected into the placer so tests
//! and non-interactive runs can swap `sudo` for something inert.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use log::{info, warn};

use super::InstallerError;

/// Ordered shell lines executed as one elevated `sh -c` invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegedScript {
    lines: Vec<String>,
}

impl PrivilegedScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Render as a `set -e` shell script
    pub fn render(&self) -> String {
        let mut script = String::from("set -e\n");
        for line in &self.lines {
            script.push_str(line);
            script.push('\n');
        }
        script
    }
}

/// Quote a path for inclusion in a POSIX shell script
pub fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

/// Runs a script with elevated rights or fails with `ElevationDenied`
pub trait ElevationProvider: Send + Sync {
    fn run_elevated(&self, script: &PrivilegedScript) -> Result<(), InstallerError>;
}

/// Elevation through `sudo sh -c` (may prompt for a password)
#[derive(Debug, Default)]
pub struct SudoElevation;

impl ElevationProvider for SudoElevation {
    fn run_elevated(&self, script: &PrivilegedScript) -> Result<(), InstallerError> {
        let sudo = which::which("sudo")
            .map_err(|e| InstallerError::ElevationDenied(format!("sudo not found: {e}")))?;

        info!("Running {} privileged command(s) with sudo", script.lines().len());
        eprintln!("🔐 Administrator rights required, you may be prompted for your password");

        let status = Command::new(sudo)
            .arg("sh")
            .arg("-c")
            .arg(script.render())
            .status()
            .map_err(|e| InstallerError::ElevationDenied(format!("failed to execute sudo: {e}")))?;

        if !status.success() {
            warn!("sudo exited with {status}");
            return Err(InstallerError::ElevationDenied(format!(
                "privileged command failed with exit code {}",
                status.code().unwrap_or(-1)
            )));
        }
        Ok(())
    }
}

/// Provider for hosts without an escalation mechanism; always refuses
#[derive(Debug, Default)]
pub struct DeniedElevation;

impl ElevationProvider for DeniedElevation {
    fn run_elevated(&self, _script: &PrivilegedScript) -> Result<(), InstallerError> {
        Err(InstallerError::ElevationDenied(
            "no privilege escalation mechanism available".to_string(),
        ))
    }
}

/// The elevation mechanism native to this host
pub fn default_elevation() -> Arc<dyn ElevationProvider> {
    if cfg!(unix) && which::which("sudo").is_ok() {
        Arc::new(SudoElevation)
    } else {
        Arc::new(DeniedElevation)
    }
}

/// Whether the current user may create files inside `dir`
#[cfg(unix)]
pub fn is_writable(dir: &Path) -> bool {
    use nix::unistd::{AccessFlags, access};
    access(dir, AccessFlags::W_OK | AccessFlags::X_OK).is_ok()
}

/// Whether the current user may create files inside `dir`
#[cfg(not(unix))]
pub fn is_writable(dir: &Path) -> bool {
    std::fs::metadata(dir)
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn script_renders_with_set_e() {
        let script = PrivilegedScript::new()
            .line("mkdir -p '/usr/local/bin'")
            .line("chmod 755 '/usr/local/bin/mintas'");
        assert_eq!(
            script.render(),
            "set -e\nmkdir -p '/usr/local/bin'\nchmod 755 '/usr/local/bin/mintas'\n"
        );
        assert_eq!(script.lines().len(), 2);
    }

    #[test]
    fn quoting_survives_single_quotes() {
        assert_eq!(shell_quote(Path::new("/tmp/a b")), "'/tmp/a b'");
        assert_eq!(
            shell_quote(&PathBuf::from("/tmp/it's")),
            r"'/tmp/it'\''s'"
        );
    }

    #[test]
    fn denied_provider_reports_elevation_denied() {
        let err = DeniedElevation
            .run_elevated(&PrivilegedScript::new().line("true"))
            .unwrap_err();
        assert!(matches!(err, InstallerError::ElevationDenied(_)));
    }

    #[test]
    fn missing_directory_is_not_writable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_writable(dir.path()));
        assert!(!is_writable(&dir.path().join("does-not-exist")));
    }
}
