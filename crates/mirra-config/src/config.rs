use std::{
    fs,
    path::PathBuf,
    sync::{LazyLock, PoisonError, RwLock},
    time::Duration,
};

use documented::{Documented, DocumentedFields};
use mirra_utils::{
    name::scope,
    path::{resolve_path, xdg_config_home, xdg_data_home},
    time::parse_duration,
};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::{debug, info};
use url::Url;

use crate::{
    annotations::annotate_toml_table,
    error::{ConfigError, Result},
};

pub const DEFAULT_UPSTREAM_REGISTRY: &str = "https://registry.npmjs.org";
pub const DEFAULT_REGISTRY_HOST: &str = "http://localhost:7001";
pub const DEFAULT_SYNC_CONCURRENCY: usize = 4;
pub const DEFAULT_REQUEST_TIMEOUT: &str = "60s";

/// How far dependency expansion reaches during a sync run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Any discovered dependency is synced.
    #[default]
    All,
    /// Only dependencies that already exist locally are refreshed.
    Exist,
}

/// Mirror configuration
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Base URL of the upstream registry packages are mirrored from.
    /// Default: https://registry.npmjs.org
    #[serde(default = "default_upstream_registry")]
    pub upstream_registry: String,

    /// Set when the upstream is itself a mirra instance. The upstream is then
    /// asked to sync a package before it is fetched.
    /// Default: false
    pub upstream_is_mirror: Option<bool>,

    /// Public host of this mirror, used to rewrite tarball URLs.
    /// Default: http://localhost:7001
    pub registry_host: Option<String>,

    /// Exact names of local-only packages that are never synced.
    pub private_packages: Option<Vec<String>>,

    /// Scopes (e.g. "@company") whose packages are local-only.
    pub private_scopes: Option<Vec<String>>,

    /// Maintain abbreviated metadata rows for the lightweight install format.
    /// Default: false
    pub enable_abbreviated_metadata: Option<bool>,

    /// Persist version, dist-tag and unpublish records to the backup store.
    /// Default: false
    pub sync_backup_files: Option<bool>,

    /// Download tarballs of newly mirrored versions into the blob store.
    /// Default: true
    pub sync_tarballs: Option<bool>,

    /// Dependency expansion mode: "all" or "exist".
    /// Default: all
    pub sync_mode: Option<SyncMode>,

    /// Number of packages reconciled in parallel within one run.
    /// Default: 4
    pub sync_concurrency: Option<usize>,

    /// Timeout for upstream requests (e.g. "30s", "2m").
    /// Default: 60s
    pub request_timeout: Option<String>,

    /// Directory holding the local package store.
    /// Default: $XDG_DATA_HOME/mirra/data
    pub data_path: Option<String>,

    /// Directory holding backup blobs and mirrored tarballs.
    /// Default: $XDG_DATA_HOME/mirra/backup
    pub backup_path: Option<String>,
}

fn default_upstream_registry() -> String {
    DEFAULT_UPSTREAM_REGISTRY.to_string()
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("MIRRA_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("mirra").join("config.toml"),
    })
});

/// Loads the configuration file into the process-wide slot.
pub fn init() -> Result<()> {
    let config = Config::new()?;
    let mut global_config = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    *global_config = Some(config);
    Ok(())
}

/// Returns the process-wide configuration, falling back to defaults.
pub fn get_config() -> Config {
    if let Some(config) = CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return config.clone();
    }

    let mut config_guard = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    config_guard.get_or_insert_with(Config::default_config).clone()
}

pub fn config_path() -> PathBuf {
    CONFIG_PATH
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .to_path_buf()
}

impl Config {
    pub fn default_config() -> Self {
        let data_root = format!("{}/mirra", xdg_data_home().display());

        Self {
            upstream_registry: default_upstream_registry(),
            upstream_is_mirror: Some(false),
            registry_host: Some(DEFAULT_REGISTRY_HOST.to_string()),
            private_packages: Some(Vec::new()),
            private_scopes: Some(Vec::new()),
            enable_abbreviated_metadata: Some(false),
            sync_backup_files: Some(false),
            sync_tarballs: Some(true),
            sync_mode: Some(SyncMode::All),
            sync_concurrency: Some(DEFAULT_SYNC_CONCURRENCY),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT.to_string()),
            data_path: Some(format!("{data_root}/data")),
            backup_path: Some(format!("{data_root}/backup")),
        }
    }

    /// Loads the configuration file, or the defaults if it does not exist.
    pub fn new() -> Result<Self> {
        let path = config_path();

        let mut config = match fs::read_to_string(&path) {
            Ok(content) => {
                debug!("loading configuration from {}", path.display());
                toml::from_str(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default_config(),
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        if let Ok(upstream) = std::env::var("MIRRA_UPSTREAM") {
            config.upstream_registry = upstream;
        }

        config.resolve()?;

        Ok(config)
    }

    /// Validates the configuration and fills unset values with defaults.
    pub fn resolve(&mut self) -> Result<()> {
        let trimmed = self.upstream_registry.trim_end_matches('/').to_string();
        let parsed = Url::parse(&trimmed).map_err(|err| {
            ConfigError::InvalidUpstreamUrl {
                url: trimmed.clone(),
                reason: err.to_string(),
            }
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUpstreamUrl {
                url: trimmed,
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        self.upstream_registry = trimmed;

        if let Some(scopes) = &self.private_scopes {
            if let Some(bad) = scopes
                .iter()
                .find(|s| !s.starts_with('@') || s.len() < 2 || s.contains('/'))
            {
                return Err(ConfigError::InvalidScope(bad.clone()));
            }
        }

        if self.sync_concurrency == Some(0) {
            return Err(ConfigError::InvalidConcurrency);
        }

        if let Some(timeout) = &self.request_timeout {
            if parse_duration(timeout).is_none() {
                return Err(ConfigError::InvalidDuration(timeout.clone()));
            }
        }

        self.upstream_is_mirror.get_or_insert(false);
        self.registry_host
            .get_or_insert_with(|| DEFAULT_REGISTRY_HOST.to_string());
        self.private_packages.get_or_insert_with(Vec::new);
        self.private_scopes.get_or_insert_with(Vec::new);
        self.enable_abbreviated_metadata.get_or_insert(false);
        self.sync_backup_files.get_or_insert(false);
        self.sync_tarballs.get_or_insert(true);
        self.sync_mode.get_or_insert(SyncMode::All);
        self.sync_concurrency.get_or_insert(DEFAULT_SYNC_CONCURRENCY);
        self.request_timeout
            .get_or_insert_with(|| DEFAULT_REQUEST_TIMEOUT.to_string());

        Ok(())
    }

    /// Whether `name` is a local-only package, by exact name or private scope.
    pub fn is_private_package(&self, name: &str) -> bool {
        if self
            .private_packages
            .as_ref()
            .is_some_and(|names| names.iter().any(|n| n == name))
        {
            return true;
        }

        scope(name).is_some_and(|scope| {
            self.private_scopes
                .as_ref()
                .is_some_and(|scopes| scopes.iter().any(|s| s == scope))
        })
    }

    pub fn upstream_is_mirror(&self) -> bool {
        self.upstream_is_mirror.unwrap_or(false)
    }

    pub fn registry_host(&self) -> &str {
        self.registry_host
            .as_deref()
            .unwrap_or(DEFAULT_REGISTRY_HOST)
            .trim_end_matches('/')
    }

    pub fn abbreviated_enabled(&self) -> bool {
        self.enable_abbreviated_metadata.unwrap_or(false)
    }

    pub fn backup_enabled(&self) -> bool {
        self.sync_backup_files.unwrap_or(false)
    }

    pub fn tarballs_enabled(&self) -> bool {
        self.sync_tarballs.unwrap_or(true)
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode.unwrap_or_default()
    }

    pub fn sync_concurrency(&self) -> usize {
        self.sync_concurrency
            .unwrap_or(DEFAULT_SYNC_CONCURRENCY)
            .max(1)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(Duration::from_secs(60))
    }

    pub fn get_data_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("MIRRA_DATA") {
            return Ok(resolve_path(&env_path)?);
        }
        match &self.data_path {
            Some(path) => Ok(resolve_path(path)?),
            None => Ok(xdg_data_home().join("mirra").join("data")),
        }
    }

    pub fn get_backup_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("MIRRA_BACKUP") {
            return Ok(resolve_path(&env_path)?);
        }
        match &self.backup_path {
            Some(path) => Ok(resolve_path(path)?),
            None => Ok(xdg_data_home().join("mirra").join("backup")),
        }
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;
        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;
        Ok(doc)
    }
}

/// Writes an annotated default configuration to the config path.
pub fn generate_default_config() -> Result<PathBuf> {
    let path = config_path();

    if path.exists() {
        return Err(ConfigError::ConfigAlreadyExists);
    }

    let annotated_doc = Config::default_config().to_annotated_document()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&path, annotated_doc.to_string())?;
    info!(
        "Default configuration file generated with documentation at: {}",
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::test_utils::with_env;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.upstream_registry, DEFAULT_UPSTREAM_REGISTRY);
        assert!(!config.upstream_is_mirror());
        assert!(!config.backup_enabled());
        assert!(!config.abbreviated_enabled());
        assert!(config.tarballs_enabled());
        assert_eq!(config.sync_mode(), SyncMode::All);
        assert_eq!(config.sync_concurrency(), DEFAULT_SYNC_CONCURRENCY);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_private_package_matching() {
        let mut config = Config::default_config();
        config.private_packages = Some(vec!["google".into()]);
        config.private_scopes = Some(vec!["@cnpmtest".into()]);

        assert!(config.is_private_package("google"));
        assert!(config.is_private_package("@cnpmtest/google"));
        assert!(config.is_private_package("@cnpmtest/anything"));
        assert!(!config.is_private_package("google-ads"));
        assert!(!config.is_private_package("@sindresorhus/df"));
        assert!(!config.is_private_package("@cnpmtestx/google"));
    }

    #[test]
    fn test_resolve_trims_upstream_and_fills_defaults() {
        let mut config: Config =
            toml::from_str("upstream_registry = \"https://registry.npmmirror.com/\"").unwrap();
        config.resolve().unwrap();

        assert_eq!(config.upstream_registry, "https://registry.npmmirror.com");
        assert_eq!(config.sync_concurrency, Some(DEFAULT_SYNC_CONCURRENCY));
        assert_eq!(config.sync_mode, Some(SyncMode::All));
        assert_eq!(config.private_scopes, Some(Vec::new()));
        assert_eq!(config.registry_host(), DEFAULT_REGISTRY_HOST);
    }

    #[test]
    fn test_missing_upstream_uses_default() {
        let config: Config = toml::from_str("sync_mode = \"exist\"").unwrap();
        assert_eq!(config.upstream_registry, DEFAULT_UPSTREAM_REGISTRY);
        assert_eq!(config.sync_mode(), SyncMode::Exist);
    }

    #[test]
    fn test_resolve_rejects_invalid_values() {
        let mut config = Config::default_config();
        config.upstream_registry = "not a url".into();
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidUpstreamUrl { .. })
        ));

        let mut config = Config::default_config();
        config.upstream_registry = "ftp://registry.example".into();
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidUpstreamUrl { .. })
        ));

        let mut config = Config::default_config();
        config.private_scopes = Some(vec!["company".into()]);
        assert!(matches!(config.resolve(), Err(ConfigError::InvalidScope(_))));

        let mut config = Config::default_config();
        config.sync_concurrency = Some(0);
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidConcurrency)
        ));

        let mut config = Config::default_config();
        config.request_timeout = Some("soon".into());
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = Config::default_config();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.upstream_registry, config.upstream_registry);
        assert_eq!(deserialized.sync_mode, config.sync_mode);
    }

    #[test]
    #[serial]
    fn test_path_env_override() {
        with_env(&[("MIRRA_BACKUP", Some("/custom/backup"))], || {
            let config = Config::default_config();
            assert_eq!(
                config.get_backup_path().unwrap(),
                PathBuf::from("/custom/backup")
            );
        });
    }

    #[test]
    #[serial]
    fn test_new_reads_file_and_env_upstream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "upstream_registry = \"https://registry.npmjs.org\"\nsync_backup_files = true\n",
        )
        .unwrap();

        *CONFIG_PATH.write().unwrap() = path;
        let config = with_env(
            &[("MIRRA_UPSTREAM", Some("https://registry.npmmirror.com"))],
            Config::new,
        )
        .unwrap();

        assert!(config.backup_enabled());
        assert_eq!(config.upstream_registry, "https://registry.npmmirror.com");
    }

    #[test]
    #[serial]
    fn test_generate_default_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        *CONFIG_PATH.write().unwrap() = path.clone();

        assert_eq!(generate_default_config().unwrap(), path);
        assert!(fs::read_to_string(&path)
            .unwrap()
            .contains("# Base URL of the upstream registry"));
        assert!(matches!(
            generate_default_config(),
            Err(ConfigError::ConfigAlreadyExists)
        ));
    }
}
