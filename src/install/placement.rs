//! Moving the unpacked payload into its canonical install location
//!
//! - Linux/macOS: a single `mintas` executable in the bin directory
//!   (`/usr/local/bin` by default), escalating through the injected
//!   [`ElevationProvider`] when that directory is not writable.
//! - Windows: the whole unpacked tree in the user-local application
//!   directory, replacing whatever was there.
//!
//! Removal is the mirror image and treats a missing target as a no-op so
//! uninstall can be repeated safely.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use walkdir::WalkDir;

use super::download::UNIX_BINARY_NAME;
use super::error::PlacementError;
use super::privilege::{ElevationProvider, PrivilegedScript, is_writable, shell_quote};
use super::InstallerError;

/// Where the product is installed; its presence means "installed"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallLocation {
    /// Single executable (linux/macos)
    Binary(PathBuf),
    /// Application directory tree (windows)
    Directory(PathBuf),
}

impl InstallLocation {
    pub fn path(&self) -> &Path {
        match self {
            InstallLocation::Binary(p) | InstallLocation::Directory(p) => p,
        }
    }

    pub fn exists(&self) -> bool {
        fs::symlink_metadata(self.path()).is_ok()
    }
}

/// Result of tearing down an install location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    Removed(InstallLocation),
    /// Nothing was installed; uninstall treats this as a warning
    NotInstalled(InstallLocation),
}

/// Places and removes the installed payload
pub trait Placer: Send + Sync {
    /// The location this placer installs into
    fn location(&self) -> InstallLocation;

    fn place(&self, payload: &Path) -> Result<InstallLocation, InstallerError>;

    fn remove(&self) -> Result<Removal, InstallerError>;
}

/// Installs the single `mintas` executable into a bin directory
pub struct UnixPlacer {
    bin_dir: PathBuf,
    elevation: Arc<dyn ElevationProvider>,
}

impl UnixPlacer {
    pub fn new(bin_dir: impl Into<PathBuf>, elevation: Arc<dyn ElevationProvider>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            elevation,
        }
    }

    fn target(&self) -> PathBuf {
        self.bin_dir.join(UNIX_BINARY_NAME)
    }

    /// Copy to a sibling temp file, mark it executable, rename over target
    fn place_direct(&self, payload: &Path, target: &Path) -> Result<(), PlacementError> {
        let staged = self
            .bin_dir
            .join(format!(".{UNIX_BINARY_NAME}.tmp-{}", std::process::id()));

        fs::copy(payload, &staged)
            .map_err(|e| PlacementError::io("failed to copy payload to", &staged, e))?;

        if let Err(e) = set_executable(&staged).and_then(|()| {
            fs::rename(&staged, target)
                .map_err(|e| PlacementError::io("failed to move binary into", target, e))
        }) {
            let _ = fs::remove_file(&staged);
            return Err(e);
        }

        let _ = fs::remove_file(payload);
        Ok(())
    }

    fn place_elevated(&self, payload: &Path, target: &Path) -> Result<(), PlacementError> {
        info!(
            "{} is not writable, escalating privileges",
            self.bin_dir.display()
        );
        let script = PrivilegedScript::new()
            .line(format!("mkdir -p {}", shell_quote(&self.bin_dir)))
            .line(format!("mv -f {} {}", shell_quote(payload), shell_quote(target)))
            .line(format!("chmod 755 {}", shell_quote(target)));

        self.elevation
            .run_elevated(&script)
            .map_err(|e| PlacementError::ElevationDeclined {
                path: self.bin_dir.clone(),
                reason: e.to_string(),
            })
    }
}

impl Placer for UnixPlacer {
    fn location(&self) -> InstallLocation {
        InstallLocation::Binary(self.target())
    }

    fn place(&self, payload: &Path) -> Result<InstallLocation, InstallerError> {
        if !payload.is_file() {
            return Err(PlacementError::MissingPayload(payload.to_path_buf()).into());
        }
        let target = self.target();

        // Creating the directory is attempted unprivileged first
        if !self.bin_dir.exists()
            && let Err(e) = fs::create_dir_all(&self.bin_dir)
        {
            debug!("Could not create {}: {e}", self.bin_dir.display());
        }

        if is_writable(&self.bin_dir) {
            self.place_direct(payload, &target)?;
        } else {
            self.place_elevated(payload, &target)?;
        }

        verify_executable(&target)?;
        info!("Installed {}", target.display());
        Ok(InstallLocation::Binary(target))
    }

    fn remove(&self) -> Result<Removal, InstallerError> {
        let location = self.location();
        let target = self.target();

        if !location.exists() {
            return Ok(Removal::NotInstalled(location));
        }

        if is_writable(&self.bin_dir) {
            fs::remove_file(&target)
                .map_err(|e| PlacementError::io("failed to remove", &target, e))?;
        } else {
            let script = PrivilegedScript::new().line(format!("rm -f {}", shell_quote(&target)));
            self.elevation
                .run_elevated(&script)
                .map_err(|e| PlacementError::ElevationDeclined {
                    path: self.bin_dir.clone(),
                    reason: e.to_string(),
                })?;
        }

        info!("Removed {}", target.display());
        Ok(Removal::Removed(location))
    }
}

/// Installs the unpacked tree into the user-local application directory
pub struct WindowsPlacer {
    app_dir: PathBuf,
}

impl WindowsPlacer {
    pub fn new(app_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_dir: app_dir.into(),
        }
    }
}

impl Placer for WindowsPlacer {
    fn location(&self) -> InstallLocation {
        InstallLocation::Directory(self.app_dir.clone())
    }

    fn place(&self, payload: &Path) -> Result<InstallLocation, InstallerError> {
        if !payload.is_dir() {
            return Err(PlacementError::MissingPayload(payload.to_path_buf()).into());
        }

        // The new tree is built beside the old one and swapped in by rename,
        // so a failed copy leaves the previous install untouched.
        let staged = sibling_dir(&self.app_dir, "new")?;
        let retired = sibling_dir(&self.app_dir, "old")?;
        discard_dir(&staged);
        discard_dir(&retired);

        fs::create_dir_all(&staged)
            .map_err(|e| PlacementError::io("failed to create", &staged, e))?;
        let copied = match copy_tree(payload, &staged) {
            Ok(copied) => copied,
            Err(e) => {
                discard_dir(&staged);
                return Err(e.into());
            }
        };

        let had_previous = self.app_dir.exists();
        if had_previous && let Err(e) = fs::rename(&self.app_dir, &retired) {
            discard_dir(&staged);
            return Err(PlacementError::io("failed to move aside", &self.app_dir, e).into());
        }
        if let Err(e) = fs::rename(&staged, &self.app_dir) {
            if had_previous && let Err(restore) = fs::rename(&retired, &self.app_dir) {
                warn!(
                    "Could not restore {} from {}: {restore}",
                    self.app_dir.display(),
                    retired.display()
                );
            }
            discard_dir(&staged);
            return Err(
                PlacementError::io("failed to move new tree into", &self.app_dir, e).into(),
            );
        }
        if had_previous {
            discard_dir(&retired);
        }

        info!("Copied {copied} files into {}", self.app_dir.display());
        Ok(self.location())
    }

    fn remove(&self) -> Result<Removal, InstallerError> {
        let location = self.location();
        if !self.app_dir.exists() {
            return Ok(Removal::NotInstalled(location));
        }
        fs::remove_dir_all(&self.app_dir)
            .map_err(|e| PlacementError::io("failed to remove", &self.app_dir, e))?;
        info!("Removed {}", self.app_dir.display());
        Ok(Removal::Removed(location))
    }
}

/// `<dir>.<tag>-<pid>` next to `dir`
fn sibling_dir(dir: &Path, tag: &str) -> Result<PathBuf, PlacementError> {
    let name = dir.file_name().ok_or_else(|| {
        PlacementError::io(
            "invalid install location",
            dir,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "no directory name"),
        )
    })?;
    Ok(dir.with_file_name(format!(
        "{}.{tag}-{}",
        name.to_string_lossy(),
        std::process::id()
    )))
}

/// Best-effort removal of a scratch directory
fn discard_dir(dir: &Path) {
    if dir.exists()
        && let Err(e) = fs::remove_dir_all(dir)
    {
        warn!("Could not remove {}: {e}", dir.display());
    }
}

/// Recursively copy `src` into `dest`, returning the number of files copied
fn copy_tree(src: &Path, dest: &Path) -> Result<usize, PlacementError> {
    let mut files = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            PlacementError::io("failed to walk", path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| PlacementError::MissingPayload(entry.path().to_path_buf()))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| PlacementError::io("failed to create", &target, e))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| PlacementError::io("failed to create", parent, e))?;
            }
            fs::copy(entry.path(), &target)
                .map_err(|e| PlacementError::io("failed to copy", &target, e))?;
            files += 1;
        }
    }
    Ok(files)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), PlacementError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|e| PlacementError::io("failed to set permissions on", path, e))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), PlacementError> {
    Ok(())
}

#[cfg(unix)]
fn verify_executable(path: &Path) -> Result<(), PlacementError> {
    use std::os::unix::fs::PermissionsExt;
    let metadata =
        fs::metadata(path).map_err(|e| PlacementError::io("failed to inspect", path, e))?;
    if metadata.permissions().mode() & 0o111 == 0 {
        return Err(PlacementError::NotExecutable(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn verify_executable(path: &Path) -> Result<(), PlacementError> {
    if !path.is_file() {
        return Err(PlacementError::MissingPayload(path.to_path_buf()));
    }
    Ok(())
}
