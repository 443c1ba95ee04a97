//! User `Path` stored under `HKCU\Environment`

use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, LPARAM, WPARAM};
use windows::Win32::System::Registry::{
    HKEY, HKEY_CURRENT_USER, KEY_QUERY_VALUE, KEY_SET_VALUE, REG_EXPAND_SZ, REG_SAM_FLAGS,
    REG_SZ, REG_VALUE_TYPE, RegCloseKey, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    HWND_BROADCAST, SMTO_ABORTIFHUNG, SendMessageTimeoutW, WM_SETTINGCHANGE,
};
use windows::core::w;

use super::InstallerError;
use super::path_registry::{UserPathStore, decode_registry_string, encode_registry_string};

/// RAII wrapper for an open registry key
struct RegistryHandle(HKEY);

impl RegistryHandle {
    fn open_environment(access: REG_SAM_FLAGS) -> Result<Self, InstallerError> {
        let mut key = HKEY::default();
        unsafe { RegOpenKeyExW(HKEY_CURRENT_USER, w!("Environment"), Some(0), access, &mut key) }
            .ok()
            .map_err(|e| {
                InstallerError::PathRegistration(format!("cannot open HKCU\\Environment: {e}"))
            })?;
        Ok(Self(key))
    }
}

impl Drop for RegistryHandle {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            unsafe {
                let _ = RegCloseKey(self.0);
            }
        }
    }
}

/// Reads and writes the raw (unexpanded) user `Path` value
///
/// Values are written back as `REG_EXPAND_SZ` so `%VAR%` segments keep
/// working, then `WM_SETTINGCHANGE` tells running shells to reload.
#[derive(Debug, Default)]
pub struct RegistryPathStore;

impl UserPathStore for RegistryPathStore {
    fn read(&self) -> Result<String, InstallerError> {
        let key = RegistryHandle::open_environment(KEY_QUERY_VALUE)?;

        let mut kind = REG_VALUE_TYPE::default();
        let mut size: u32 = 0;
        let status = unsafe {
            RegQueryValueExW(key.0, w!("Path"), None, Some(&mut kind), None, Some(&mut size))
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(String::new());
        }
        status.ok().map_err(|e| {
            InstallerError::PathRegistration(format!("cannot query the user Path: {e}"))
        })?;
        if kind != REG_SZ && kind != REG_EXPAND_SZ {
            return Err(InstallerError::PathRegistration(format!(
                "user Path has unexpected registry type {}",
                kind.0
            )));
        }

        let mut wide = vec![0u16; (size as usize).div_ceil(2)];
        unsafe {
            RegQueryValueExW(
                key.0,
                w!("Path"),
                None,
                None,
                Some(wide.as_mut_ptr().cast()),
                Some(&mut size),
            )
        }
        .ok()
        .map_err(|e| InstallerError::PathRegistration(format!("cannot read the user Path: {e}")))?;
        wide.truncate(size as usize / 2);

        decode_registry_string(&wide)
    }

    fn write(&self, value: &str) -> Result<(), InstallerError> {
        let key = RegistryHandle::open_environment(KEY_SET_VALUE)?;
        let bytes = encode_registry_string(value);

        unsafe { RegSetValueExW(key.0, w!("Path"), None, REG_EXPAND_SZ, Some(&bytes)) }
            .ok()
            .map_err(|e| {
                InstallerError::PathRegistration(format!("cannot write the user Path: {e}"))
            })?;

        broadcast_environment_change();
        Ok(())
    }
}

fn broadcast_environment_change() {
    let mut result = 0usize;
    unsafe {
        SendMessageTimeoutW(
            HWND_BROADCAST,
            WM_SETTINGCHANGE,
            WPARAM(0),
            LPARAM(w!("Environment").as_ptr() as isize),
            SMTO_ABORTIFHUNG,
            5000,
            Some(&mut result),
        );
    }
}
