//! Mintas installation library
//!
//! Detects the host platform, resolves the latest release asset, downloads
//! and unpacks it, then places it in the platform's canonical location and
//! registers that location on the user PATH where needed. Uninstall reverses
//! placement and registration.

pub mod download;
mod error;
pub mod orchestration;
pub mod path_registry;
pub mod placement;
pub mod privilege;
#[cfg(windows)]
mod registry;
pub mod runners;
pub mod status;
pub mod workspace;

pub use download::{ArchiveKind, Platform, ReleaseAsset};
pub use error::{InstallerError, PlacementError};
pub use orchestration::{Backend, InstallOutcome, Orchestrator, Stage, UninstallOutcome};
pub use path_registry::{
    MemoryPathStore, PathChange, PathRegistrar, UnavailablePathStore, UserPathStore,
    default_path_store,
};
#[cfg(windows)]
pub use registry::RegistryPathStore;
pub use placement::{InstallLocation, Placer, Removal};
pub use privilege::{DeniedElevation, ElevationProvider, PrivilegedScript};
pub use status::Reporter;
