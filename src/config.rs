use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::install::InstallerError;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "MINTAS_INSTALLER_CONFIG";

const DEFAULT_REPOSITORY: &str = "mintas-lang/mintas";
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Installer configuration (every field optional in the TOML file).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallerConfig {
    /// `owner/name` of the GitHub repository hosting releases
    pub repository: String,
    /// Base URL of the release-hosting API
    pub api_base: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Abort a download when no bytes arrive for this long
    pub inactivity_timeout_secs: u64,
    /// Canonical binary directory on linux/macos
    pub bin_dir: Option<PathBuf>,
    /// Application directory on windows
    pub app_dir: Option<PathBuf>,
    pub github_token: Option<String>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            repository: DEFAULT_REPOSITORY.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            user_agent: format!("mintas-installer/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 30,
            connect_timeout_secs: 30,
            inactivity_timeout_secs: 300,
            bin_dir: None,
            app_dir: None,
            github_token: None,
        }
    }
}

impl InstallerConfig {
    /// Load config from the explicit or default location, then apply
    /// environment overrides.
    pub fn load() -> Result<Self, InstallerError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => match default_config_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, InstallerError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            InstallerError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| InstallerError::Config(format!("{}: {e}", path.display())))?;
        log::debug!("Loaded installer config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, InstallerError> {
        toml::from_str(raw).map_err(|e| InstallerError::Config(e.to_string()))
    }

    /// Overlay values taken from `lookup` (the process environment in production)
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(api) = non_empty("MINTAS_RELEASE_API") {
            self.api_base = api;
        }
        if let Some(repo) = non_empty("MINTAS_REPOSITORY") {
            self.repository = repo;
        }
        if let Some(dir) = non_empty("MINTAS_BIN_DIR") {
            self.bin_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = non_empty("MINTAS_APP_DIR") {
            self.app_dir = Some(PathBuf::from(dir));
        }
        if let Some(token) = non_empty("GITHUB_TOKEN") {
            self.github_token = Some(token);
        }
    }

    /// Canonical binary directory for linux/macos installs
    pub fn install_bin_dir(&self) -> PathBuf {
        self.bin_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("/usr/local/bin"))
    }

    /// User-local application directory for windows installs
    pub fn install_app_dir(&self) -> Result<PathBuf, InstallerError> {
        match &self.app_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_local_dir()
                .map(|dir| dir.join("Mintas"))
                .ok_or_else(|| {
                    InstallerError::Config(
                        "could not determine the local application data directory".to_string(),
                    )
                }),
        }
    }

    /// URL of the "latest release" endpoint for the configured repository
    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/releases/latest",
            self.api_base.trim_end_matches('/'),
            self.repository.trim_matches('/')
        )
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mintas").join("installer.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_point_at_github() {
        let config = InstallerConfig::default();
        assert_eq!(
            config.latest_release_url(),
            "https://api.github.com/repos/mintas-lang/mintas/releases/latest"
        );
        assert_eq!(config.inactivity_timeout_secs, 300);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = InstallerConfig::from_toml(
            r#"
            repository = "acme/mintas"
            bin_dir = "/opt/bin"
            "#,
        )
        .unwrap();
        assert_eq!(config.repository, "acme/mintas");
        assert_eq!(config.bin_dir, Some(PathBuf::from("/opt/bin")));
        assert_eq!(config.api_base, "https://api.github.com");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = InstallerConfig::from_toml("repo = \"x\"").unwrap_err();
        assert!(matches!(err, InstallerError::Config(_)));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = InstallerConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn env_overrides_win_and_blank_values_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("MINTAS_RELEASE_API", "http://127.0.0.1:9999/"),
            ("MINTAS_BIN_DIR", "/tmp/bin"),
            ("MINTAS_APP_DIR", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = InstallerConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(
            config.latest_release_url(),
            "http://127.0.0.1:9999/repos/mintas-lang/mintas/releases/latest"
        );
        assert_eq!(config.bin_dir, Some(PathBuf::from("/tmp/bin")));
        assert_eq!(config.app_dir, None);
    }

    #[test]
    fn install_dirs_use_overrides() {
        let config = InstallerConfig {
            bin_dir: Some(PathBuf::from("/x/bin")),
            app_dir: Some(PathBuf::from("/x/app")),
            ..InstallerConfig::default()
        };
        assert_eq!(config.install_bin_dir(), PathBuf::from("/x/bin"));
        assert_eq!(config.install_app_dir().unwrap(), PathBuf::from("/x/app"));
    }

    #[test]
    fn bin_dir_defaults_to_usr_local_bin() {
        assert_eq!(
            InstallerConfig::default().install_bin_dir(),
            PathBuf::from("/usr/local/bin")
        );
    }
}
