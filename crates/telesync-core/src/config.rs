//! Configuration module for TeleSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, environment overrides, validation, defaults, and a builder
//! pattern for programmatic use. A [`Config`] is built once at process start
//! and passed by reference; nothing in the core reads ambient state.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::domain::{DestinationPath, DomainError};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for TeleSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

/// Saved-history source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory holding the exported saved history (`result.json` + media).
    pub export_dir: Option<PathBuf>,
    /// Number of history items requested per page.
    pub page_size: u32,
}

/// Network share settings.
///
/// `host`, `share` and `credentials` are all required for a run to do
/// anything; when one is missing the run is a logged no-op.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// Server hosting the share.
    pub host: Option<String>,
    /// Share name on that server.
    pub share: Option<String>,
    #[serde(flatten)]
    pub credentials: Credentials,
    /// Upload directory; may start with the share name.
    pub subpath: String,
    /// Local directory where `//host/share` is mounted.
    pub mount_root: Option<PathBuf>,
}

/// Login for the share.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<String>,
    /// Windows domain; empty for workgroup servers.
    pub domain: String,
}

/// Daily trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Run once immediately at process start.
    pub run_on_start: bool,
    /// Local wall-clock time of the daily run, `HH:MM`.
    pub daily_at: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/telesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("telesync")
            .join("config.yaml")
    }

    /// Overlay settings from the process environment and a `.env` file in
    /// the working directory.
    ///
    /// See [`Config::apply_overrides_with_dotenv`] for precedence.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_overrides_with_dotenv(Path::new(DOTENV_FILE), |key| std::env::var(key).ok())
    }

    /// Overlay settings from `process`, falling back to the `dotenv` file.
    ///
    /// A variable set (non-empty) in `process` wins over the file. A missing
    /// file is not an error; a malformed one is.
    pub fn apply_overrides_with_dotenv<F>(
        &mut self,
        dotenv: &Path,
        process: F,
    ) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_vars = read_dotenv(dotenv)?;
        self.apply_overrides_from(|key| {
            process(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| file_vars.get(key).cloned())
        });
        Ok(())
    }

    /// Overlay settings from `lookup`, which maps a variable name to its value.
    ///
    /// Recognized: `SMB_HOST`, `SMB_SHARE`, `SMB_USER`, `SMB_PASSWORD`,
    /// `SMB_PATH`, `SMB_DOMAIN`, `SMB_MOUNT_ROOT`, `TELESYNC_EXPORT_DIR`.
    /// Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SMB_HOST") {
            self.destination.host = Some(v);
        }
        if let Some(v) = get("SMB_SHARE") {
            self.destination.share = Some(v);
        }
        if let Some(v) = get("SMB_USER") {
            self.destination.credentials.user = Some(v);
        }
        if let Some(v) = get("SMB_PASSWORD") {
            self.destination.credentials.password = Some(v);
        }
        if let Some(v) = get("SMB_PATH") {
            self.destination.subpath = v;
        }
        if let Some(v) = get("SMB_DOMAIN") {
            self.destination.credentials.domain = v;
        }
        if let Some(v) = get("SMB_MOUNT_ROOT") {
            self.destination.mount_root = Some(PathBuf::from(v));
        }
        if let Some(v) = get("TELESYNC_EXPORT_DIR") {
            self.source.export_dir = Some(PathBuf::from(v));
        }
    }
}

/// Name of the dotenv file picked up from the working directory.
pub const DOTENV_FILE: &str = ".env";

/// Parse a dotenv file into a map; a missing file yields an empty map.
fn read_dotenv(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(HashMap::new());
        }
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };

    let mut vars = HashMap::new();
    for entry in iter {
        let (key, value) = entry.with_context(|| format!("parsing {}", path.display()))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

impl DestinationConfig {
    /// Returns true when host, share, user and password are all set.
    pub fn is_complete(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        present(&self.host)
            && present(&self.share)
            && present(&self.credentials.user)
            && present(&self.credentials.password)
    }

    /// Names of the required settings that are missing, for diagnostics.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        let mut missing = Vec::new();
        if !present(&self.host) {
            missing.push("destination.host");
        }
        if !present(&self.share) {
            missing.push("destination.share");
        }
        if !present(&self.credentials.user) {
            missing.push("destination.user");
        }
        if !present(&self.credentials.password) {
            missing.push("destination.password");
        }
        missing
    }

    /// The upload directory with the share prefix and stray separators removed.
    pub fn destination_path(&self) -> DestinationPath {
        DestinationPath::normalize(&self.subpath, self.share.as_deref().unwrap_or_default())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("domain", &self.domain)
            .finish()
    }
}

impl ScheduleConfig {
    /// Parse `daily_at` as a wall-clock time.
    pub fn daily_time(&self) -> Result<NaiveTime, DomainError> {
        NaiveTime::parse_from_str(self.daily_at.trim(), "%H:%M")
            .map_err(|_| DomainError::InvalidTimeOfDay(self.daily_at.clone()))
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

// Config, DestinationConfig and Credentials derive Default.
// (clippy::derivable_impls)

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            export_dir: None,
            page_size: 100,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            run_on_start: true,
            daily_at: "02:00".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"source.page_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for `source.page_size`.
const MAX_PAGE_SIZE: u32 = 1000;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. Missing destination
    /// settings are not reported here: they make a run a no-op, not an error.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- source ---
        if self.source.page_size == 0 || self.source.page_size > MAX_PAGE_SIZE {
            errors.push(ValidationError {
                field: "source.page_size".into(),
                message: format!("must be in range 1..={MAX_PAGE_SIZE}"),
            });
        }

        // --- schedule ---
        if let Err(e) = self.schedule.daily_time() {
            errors.push(ValidationError {
                field: "schedule.daily_at".into(),
                message: format!("{e}; expected HH:MM"),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use telesync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .destination_host("nas.local")
///     .destination_share("Media")
///     .destination_credentials("alice", "secret", "")
///     .destination_subpath("Media/telegram")
///     .source_page_size(50)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- source ---

    pub fn source_export_dir(mut self, dir: PathBuf) -> Self {
        self.config.source.export_dir = Some(dir);
        self
    }

    pub fn source_page_size(mut self, page_size: u32) -> Self {
        self.config.source.page_size = page_size;
        self
    }

    // --- destination ---

    pub fn destination_host(mut self, host: impl Into<String>) -> Self {
        self.config.destination.host = Some(host.into());
        self
    }

    pub fn destination_share(mut self, share: impl Into<String>) -> Self {
        self.config.destination.share = Some(share.into());
        self
    }

    pub fn destination_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        self.config.destination.credentials = Credentials {
            user: Some(user.into()),
            password: Some(password.into()),
            domain: domain.into(),
        };
        self
    }

    pub fn destination_subpath(mut self, subpath: impl Into<String>) -> Self {
        self.config.destination.subpath = subpath.into();
        self
    }

    pub fn destination_mount_root(mut self, root: PathBuf) -> Self {
        self.config.destination.mount_root = Some(root);
        self
    }

    // --- schedule ---

    pub fn schedule_run_on_start(mut self, run_on_start: bool) -> Self {
        self.config.schedule.run_on_start = run_on_start;
        self
    }

    pub fn schedule_daily_at(mut self, daily_at: impl Into<String>) -> Self {
        self.config.schedule.daily_at = daily_at.into();
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn complete_builder() -> ConfigBuilder {
        ConfigBuilder::new()
            .destination_host("nas.local")
            .destination_share("Media")
            .destination_credentials("alice", "hunter2", "")
    }

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.source.page_size, 100);
        assert!(cfg.source.export_dir.is_none());
        assert!(cfg.destination.host.is_none());
        assert!(cfg.destination.subpath.is_empty());
        assert!(cfg.schedule.run_on_start);
        assert_eq!(cfg.schedule.daily_at, "02:00");
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    #[test]
    fn default_destination_is_incomplete() {
        let cfg = Config::default();
        assert!(!cfg.destination.is_complete());
        assert_eq!(
            cfg.destination.missing_fields(),
            vec![
                "destination.host",
                "destination.share",
                "destination.user",
                "destination.password"
            ]
        );
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
source:
  export_dir: /srv/export
  page_size: 50
destination:
  host: nas.local
  share: Media
  user: alice
  password: hunter2
  domain: WORKGROUP
  subpath: "Media/telegram/"
  mount_root: /mnt/media
schedule:
  run_on_start: false
  daily_at: "03:30"
logging:
  level: debug
  json: true
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.source.export_dir, Some(PathBuf::from("/srv/export")));
        assert_eq!(cfg.source.page_size, 50);
        assert_eq!(cfg.destination.host.as_deref(), Some("nas.local"));
        assert_eq!(cfg.destination.credentials.user.as_deref(), Some("alice"));
        assert_eq!(cfg.destination.credentials.domain, "WORKGROUP");
        assert_eq!(cfg.destination.mount_root, Some(PathBuf::from("/mnt/media")));
        assert!(cfg.destination.is_complete());
        assert_eq!(cfg.destination.destination_path().as_str(), "telegram");
        assert!(!cfg.schedule.run_on_start);
        assert_eq!(
            cfg.schedule.daily_time().unwrap(),
            NaiveTime::from_hms_opt(3, 30, 0).unwrap()
        );
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
    }

    #[test]
    fn load_partial_yaml_fills_defaults() {
        let yaml = "destination:\n  host: nas.local\n";
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).unwrap();
        assert_eq!(cfg.destination.host.as_deref(), Some("nas.local"));
        assert_eq!(cfg.source.page_size, 100);
        assert_eq!(cfg.schedule.daily_at, "02:00");
    }

    #[test]
    fn load_or_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/telesync.yaml"));
        assert_eq!(cfg.source.page_size, 100);
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("telesync/config.yaml"));
    }

    // -- Environment overrides --

    #[test]
    fn env_overrides_fill_destination() {
        let vars: HashMap<&str, &str> = [
            ("SMB_HOST", "10.0.0.5"),
            ("SMB_SHARE", "Backup"),
            ("SMB_USER", "bob"),
            ("SMB_PASSWORD", "pw"),
            ("SMB_PATH", "Backup/phone"),
            ("SMB_DOMAIN", "CORP"),
            ("SMB_MOUNT_ROOT", "/mnt/backup"),
            ("TELESYNC_EXPORT_DIR", "/data/export"),
        ]
        .into_iter()
        .collect();

        let mut cfg = Config::default();
        cfg.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert!(cfg.destination.is_complete());
        assert_eq!(cfg.destination.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(cfg.destination.credentials.domain, "CORP");
        assert_eq!(cfg.destination.destination_path().as_str(), "phone");
        assert_eq!(cfg.destination.mount_root, Some(PathBuf::from("/mnt/backup")));
        assert_eq!(cfg.source.export_dir, Some(PathBuf::from("/data/export")));
    }

    #[test]
    fn empty_env_values_do_not_override() {
        let mut cfg = complete_builder().build();
        cfg.apply_overrides_from(|k| (k == "SMB_HOST").then(|| "  ".to_string()));
        assert_eq!(cfg.destination.host.as_deref(), Some("nas.local"));
    }

    fn write_dotenv(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join(DOTENV_FILE);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn dotenv_file_completes_destination() {
        let dir = tempfile::TempDir::new().unwrap();
        let dotenv = write_dotenv(
            &dir,
            "SMB_HOST=nas.local\nSMB_SHARE=Media\nSMB_USER=alice\nSMB_PASSWORD=\"pa ss\"\n",
        );

        let mut cfg = Config::default();
        cfg.apply_overrides_with_dotenv(&dotenv, |_| None).unwrap();

        assert!(cfg.destination.is_complete());
        assert_eq!(cfg.destination.share.as_deref(), Some("Media"));
        assert_eq!(cfg.destination.credentials.password.as_deref(), Some("pa ss"));
    }

    #[test]
    fn process_env_wins_over_dotenv() {
        let dir = tempfile::TempDir::new().unwrap();
        let dotenv = write_dotenv(&dir, "SMB_HOST=from-file\nSMB_USER=file-user\n");

        let mut cfg = Config::default();
        cfg.apply_overrides_with_dotenv(&dotenv, |k| match k {
            "SMB_HOST" => Some("from-process".to_string()),
            "SMB_USER" => Some(String::new()),
            _ => None,
        })
        .unwrap();

        assert_eq!(cfg.destination.host.as_deref(), Some("from-process"));
        assert_eq!(cfg.destination.credentials.user.as_deref(), Some("file-user"));
    }

    #[test]
    fn missing_dotenv_is_not_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cfg = complete_builder().build();

        cfg.apply_overrides_with_dotenv(&dir.path().join(DOTENV_FILE), |_| None).unwrap();
        assert_eq!(cfg.destination.host.as_deref(), Some("nas.local"));
    }

    #[test]
    fn malformed_dotenv_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let dotenv = write_dotenv(&dir, "SMB_HOST='unterminated\n");

        let err = Config::default()
            .apply_overrides_with_dotenv(&dotenv, |_| None)
            .unwrap_err();
        assert!(format!("{err:#}").contains(".env"));
    }

    // -- Completeness --

    #[test]
    fn blank_password_is_incomplete() {
        let mut cfg = complete_builder().build();
        assert!(cfg.destination.is_complete());

        cfg.destination.credentials.password = Some("   ".to_string());
        assert!(!cfg.destination.is_complete());
        assert_eq!(cfg.destination.missing_fields(), vec!["destination.password"]);
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let cfg = complete_builder().build();
        let rendered = format!("{:?}", cfg.destination.credentials);
        assert!(rendered.contains("alice"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }

    // -- Validation --

    #[test]
    fn validate_page_size_bounds() {
        let errors = ConfigBuilder::new().source_page_size(0).build().validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "source.page_size");

        let errors = ConfigBuilder::new().source_page_size(5000).build().validate();
        assert_eq!(errors[0].field, "source.page_size");
    }

    #[test]
    fn validate_daily_at() {
        for bad in ["25:00", "2am", ""] {
            let errors = ConfigBuilder::new().schedule_daily_at(bad).build().validate();
            assert_eq!(errors.len(), 1, "{bad:?}");
            assert_eq!(errors[0].field, "schedule.daily_at");
        }
    }

    #[test]
    fn validate_log_level() {
        let errors = ConfigBuilder::new().logging_level("loud").build().validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().starts_with("logging.level: invalid level 'loud'"));
    }

    #[test]
    fn build_validated_collects_all_errors() {
        let result = ConfigBuilder::new()
            .source_page_size(0)
            .logging_level("nope")
            .build_validated();
        assert_eq!(result.unwrap_err().len(), 2);
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home(Path::new("/srv/x")), PathBuf::from("/srv/x"));
    }
}
