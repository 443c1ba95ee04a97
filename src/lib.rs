//! Installer and uninstaller for the Mintas runtime
//!
//! The binary (`mintas-install`) is a thin wrapper over [`install::runners`];
//! everything it does is available here with injectable capabilities for
//! privilege escalation and user PATH storage.

pub mod cli;
pub mod config;
pub mod install;

pub use config::InstallerConfig;
pub use install::{InstallerError, Orchestrator};
