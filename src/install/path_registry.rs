//! User PATH registration
//!
//! Only windows installs touch the persistent search path: the application
//! directory is appended to the user-scope `Path` variable. On linux/macos
//! the canonical bin directory is assumed to be searched already and
//! registration is a no-op.

use std::path::Path;
use std::sync::{Arc, Mutex};

use log::{debug, info};

use super::InstallerError;

/// Separator of the windows `Path` variable
pub const PATH_SEPARATOR: char = ';';

/// Effect of a registration call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathChange {
    Added,
    AlreadyPresent,
    Removed,
    NotPresent,
    /// Platform without path registration
    Skipped,
}

/// Adds/removes the install location from the persistent search path
pub trait PathRegistrar: Send + Sync {
    fn add_to_path(&self, location: &Path) -> Result<PathChange, InstallerError>;

    fn remove_from_path(&self, location: &Path) -> Result<PathChange, InstallerError>;
}

/// Registrar for platforms whose install location is already on PATH
#[derive(Debug, Default)]
pub struct NoopRegistrar;

impl PathRegistrar for NoopRegistrar {
    fn add_to_path(&self, _location: &Path) -> Result<PathChange, InstallerError> {
        Ok(PathChange::Skipped)
    }

    fn remove_from_path(&self, _location: &Path) -> Result<PathChange, InstallerError> {
        Ok(PathChange::Skipped)
    }
}

/// Backing store of the user-scope path variable
pub trait UserPathStore: Send + Sync {
    fn read(&self) -> Result<String, InstallerError>;

    fn write(&self, value: &str) -> Result<(), InstallerError>;
}

/// Registrar editing the user `Path` through a [`UserPathStore`]
pub struct UserPathRegistrar {
    store: Arc<dyn UserPathStore>,
}

impl UserPathRegistrar {
    pub fn new(store: Arc<dyn UserPathStore>) -> Self {
        Self { store }
    }
}

impl PathRegistrar for UserPathRegistrar {
    fn add_to_path(&self, location: &Path) -> Result<PathChange, InstallerError> {
        let entry = location.display().to_string();
        let current = self.store.read()?;

        match append_path_entry(&current, &entry) {
            Some(updated) => {
                self.store.write(&updated)?;
                info!("Added {entry} to the user PATH");
                Ok(PathChange::Added)
            }
            None => {
                debug!("{entry} already on the user PATH");
                Ok(PathChange::AlreadyPresent)
            }
        }
    }

    fn remove_from_path(&self, location: &Path) -> Result<PathChange, InstallerError> {
        let entry = location.display().to_string();
        let current = self.store.read()?;

        match strip_path_entry(&current, &entry) {
            Some(updated) => {
                self.store.write(&updated)?;
                info!("Removed {entry} from the user PATH");
                Ok(PathChange::Removed)
            }
            None => Ok(PathChange::NotPresent),
        }
    }
}

/// Windows path segments compare case-insensitively, ignoring trailing slashes
fn same_entry(segment: &str, entry: &str) -> bool {
    let normalise = |s: &str| s.trim().trim_end_matches(['\\', '/']).to_string();
    normalise(segment).eq_ignore_ascii_case(&normalise(entry))
}

/// `current` with `entry` appended, or `None` when it is already present
pub fn append_path_entry(current: &str, entry: &str) -> Option<String> {
    if current.split(PATH_SEPARATOR).any(|s| same_entry(s, entry)) {
        return None;
    }
    Some(if current.is_empty() {
        entry.to_string()
    } else if current.ends_with(PATH_SEPARATOR) {
        format!("{current}{entry}")
    } else {
        format!("{current}{PATH_SEPARATOR}{entry}")
    })
}

/// `current` without any segment equal to `entry`, or `None` if absent
///
/// Remaining segments keep their original order.
pub fn strip_path_entry(current: &str, entry: &str) -> Option<String> {
    let segments: Vec<&str> = current.split(PATH_SEPARATOR).collect();
    let kept: Vec<&str> = segments
        .iter()
        .copied()
        .filter(|s| !same_entry(s, entry))
        .collect();

    (kept.len() != segments.len()).then(|| kept.join(&PATH_SEPARATOR.to_string()))
}

/// UTF-16LE bytes of `value` with the trailing NUL a registry string needs
pub fn encode_registry_string(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Decode a registry string, refusing data that would not survive a rewrite
pub fn decode_registry_string(wide: &[u16]) -> Result<String, InstallerError> {
    let end = wide.iter().rposition(|&c| c != 0).map_or(0, |i| i + 1);
    String::from_utf16(&wide[..end]).map_err(|e| {
        InstallerError::PathRegistration(format!("user Path is not valid UTF-16: {e}"))
    })
}

/// Store for hosts without a user-scope path variable
#[derive(Debug, Default)]
pub struct UnavailablePathStore;

impl UserPathStore for UnavailablePathStore {
    fn read(&self) -> Result<String, InstallerError> {
        Err(InstallerError::PathRegistration(
            "the user Path can only be edited on a windows host".to_string(),
        ))
    }

    fn write(&self, _value: &str) -> Result<(), InstallerError> {
        self.read().map(|_| ())
    }
}

/// The user path store native to this host
#[cfg(windows)]
pub fn default_path_store() -> Arc<dyn UserPathStore> {
    Arc::new(super::registry::RegistryPathStore)
}

/// The user path store native to this host
#[cfg(not(windows))]
pub fn default_path_store() -> Arc<dyn UserPathStore> {
    Arc::new(UnavailablePathStore)
}

/// In-memory path store shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryPathStore {
    value: Arc<Mutex<String>>,
}

impl MemoryPathStore {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            value: Arc::new(Mutex::new(initial.into())),
        }
    }

    pub fn value(&self) -> String {
        self.value
            .lock()
            .map(|v| v.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl UserPathStore for MemoryPathStore {
    fn read(&self) -> Result<String, InstallerError> {
        Ok(self.value())
    }

    fn write(&self, value: &str) -> Result<(), InstallerError> {
        let mut guard = self
            .value
            .lock()
            .map_err(|e| InstallerError::PathRegistration(format!("path store poisoned: {e}")))?;
        *guard = value.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = r"C:\Users\ada\AppData\Local\Mintas";

    #[test]
    fn append_adds_once() {
        let first = append_path_entry(r"C:\Windows;C:\Tools", APP).unwrap();
        assert_eq!(first, format!(r"C:\Windows;C:\Tools;{APP}"));
        assert_eq!(append_path_entry(&first, APP), None);
    }

    #[test]
    fn append_handles_empty_and_trailing_separator() {
        assert_eq!(append_path_entry("", APP).unwrap(), APP);
        assert_eq!(
            append_path_entry(r"C:\Tools;", APP).unwrap(),
            format!(r"C:\Tools;{APP}")
        );
    }

    #[test]
    fn matching_ignores_case_and_trailing_backslash() {
        let current = format!(r"C:\Tools;{}\", APP.to_lowercase());
        assert_eq!(append_path_entry(&current, APP), None);
        assert_eq!(strip_path_entry(&current, APP).unwrap(), r"C:\Tools");
    }

    #[test]
    fn strip_drops_every_occurrence_and_keeps_order() {
        let current = format!(r"C:\A;{APP};C:\B;{APP};C:\C");
        assert_eq!(strip_path_entry(&current, APP).unwrap(), r"C:\A;C:\B;C:\C");
        assert_eq!(strip_path_entry(r"C:\A;C:\B", APP), None);
    }

    #[test]
    fn strip_of_sole_entry_leaves_empty_value() {
        assert_eq!(strip_path_entry(APP, APP).unwrap(), "");
    }

    #[test]
    fn registrar_round_trip_restores_original_path() {
        let store = MemoryPathStore::new(r"C:\Windows;C:\Tools");
        let registrar = UserPathRegistrar::new(Arc::new(store.clone()));
        let location = Path::new(APP);

        assert_eq!(registrar.add_to_path(location).unwrap(), PathChange::Added);
        assert_eq!(
            registrar.add_to_path(location).unwrap(),
            PathChange::AlreadyPresent
        );
        assert_eq!(store.value().matches("Mintas").count(), 1);

        assert_eq!(
            registrar.remove_from_path(location).unwrap(),
            PathChange::Removed
        );
        assert_eq!(store.value(), r"C:\Windows;C:\Tools");
        assert_eq!(
            registrar.remove_from_path(location).unwrap(),
            PathChange::NotPresent
        );
    }

    #[test]
    fn registrar_leaves_other_segments_byte_for_byte() {
        let original = r"C:\Users\José\bin;%USERPROFILE%\go\bin;;C:\Tools";
        let store = MemoryPathStore::new(original);
        let registrar = UserPathRegistrar::new(Arc::new(store.clone()));

        registrar.add_to_path(Path::new(APP)).unwrap();
        assert_eq!(store.value(), format!("{original};{APP}"));
        registrar.remove_from_path(Path::new(APP)).unwrap();
        assert_eq!(store.value(), original);
    }

    #[test]
    fn registry_strings_keep_non_ascii_and_variables() {
        let value = r"C:\Users\José\bin;%USERPROFILE%\go\bin";
        let bytes = encode_registry_string(value);
        assert_eq!(&bytes[bytes.len() - 2..], &[0, 0]);

        let wide: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        assert_eq!(decode_registry_string(&wide).unwrap(), value);
        assert_eq!(decode_registry_string(&[]).unwrap(), "");
    }

    #[test]
    fn unpaired_surrogates_are_refused() {
        let err = decode_registry_string(&[0x43, 0xD800, 0x3B, 0]).unwrap_err();
        assert!(matches!(err, InstallerError::PathRegistration(_)));
    }

    #[test]
    fn unavailable_store_is_a_registration_error() {
        let registrar = UserPathRegistrar::new(Arc::new(UnavailablePathStore));
        let err = registrar.add_to_path(Path::new(APP)).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn noop_registrar_skips() {
        let registrar = NoopRegistrar;
        assert_eq!(
            registrar.add_to_path(Path::new("/usr/local/bin")).unwrap(),
            PathChange::Skipped
        );
        assert_eq!(
            registrar.remove_from_path(Path::new("/usr/local/bin")).unwrap(),
            PathChange::Skipped
        );
    }
}
