//! Configuration for leadboard.
//!
//! Settings are read from `.leadboard/leadboard.toml` and layered
//! file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [backend]
//! kind = "sqlite"            # or "http"
//! base_url = "http://127.0.0.1:3141"
//! db_path = ".leadboard/leads.db"
//! timeout_secs = 10
//!
//! [session]
//! company_id = "acme"
//! employee_id = "emp-7"
//!
//! [server]
//! port = 3141
//!
//! [forms]
//! payment_modes = ["Cash", "UPI"]
//! lost_reasons = ["Budget", "Went with competitor"]
//! junk_reasons = []
//!
//! [logging]
//! filter = "leadboard=debug"
//! json = false
//! ```
//!
//! | Variable                | Overrides               |
//! |-------------------------|-------------------------|
//! | `LEADBOARD_API_URL`     | `backend.base_url`      |
//! | `LEADBOARD_COMPANY_ID`  | `session.company_id`    |
//! | `LEADBOARD_EMPLOYEE_ID` | `session.employee_id`   |
//! | `LEADBOARD_TOKEN`       | bearer token (env only) |

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::forms::FormOptions;
use crate::server::DEFAULT_PORT;
use crate::session::{DEFAULT_COMPANY, Session};

pub const CONFIG_DIR: &str = ".leadboard";
pub const CONFIG_FILE: &str = "leadboard.toml";

pub const ENV_API_URL: &str = "LEADBOARD_API_URL";
pub const ENV_TOKEN: &str = "LEADBOARD_TOKEN";
pub const ENV_COMPANY_ID: &str = "LEADBOARD_COMPANY_ID";
pub const ENV_EMPLOYEE_ID: &str = "LEADBOARD_EMPLOYEE_ID";

/// Where leads are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local SQLite file.
    #[default]
    Sqlite,
    /// Remote lead API.
    Http,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Http => write!(f, "http"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(BackendKind::Sqlite),
            "http" => Ok(BackendKind::Http),
            _ => anyhow::bail!("Invalid backend '{}'. Valid values: sqlite, http", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSection {
    #[serde(default)]
    pub kind: BackendKind,
    /// Lead API base URL, for the http backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// SQLite file, relative to the project directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            base_url: None,
            db_path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default)]
    pub json: bool,
}

/// Parsed `leadboard.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadboardToml {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub forms: FormOptions,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl LeadboardToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse leadboard.toml")
    }

    /// Load `leadboard.toml` from `dir`, or defaults if it does not exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize leadboard.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(ref url) = self.backend.base_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            warnings.push(format!(
                "Invalid backend.base_url '{}': should start with http:// or https://",
                url
            ));
        }
        if self.backend.kind == BackendKind::Http && self.backend.base_url.is_none() {
            warnings.push(format!(
                "backend.kind is \"http\" but backend.base_url is not set; {} or the local server default will be used",
                ENV_API_URL
            ));
        }
        if self.backend.timeout_secs == 0 {
            warnings.push("backend.timeout_secs is 0; every request will time out".to_string());
        }
        if let Some(ref company) = self.session.company_id
            && company.trim().is_empty()
        {
            warnings.push("session.company_id is empty".to_string());
        }
        if self.forms.payment_modes.is_empty() {
            warnings.push("forms.payment_modes is empty; payment mode accepts any text".to_string());
        }
        if let Some(ref filter) = self.logging.filter
            && tracing_subscriber::EnvFilter::try_new(filter).is_err()
        {
            warnings.push(format!("Invalid logging.filter '{}'", filter));
        }

        warnings
    }
}

/// Resolved runtime configuration.
///
/// Merges, in increasing precedence:
/// 1. leadboard.toml
/// 2. Environment variables
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct LeadboardConfig {
    pub project_dir: PathBuf,
    /// Path to the .leadboard directory
    pub leadboard_dir: PathBuf,
    pub toml: LeadboardToml,
    pub verbose: bool,
    /// CLI override for the backend kind
    pub cli_backend: Option<BackendKind>,
}

impl LeadboardConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let leadboard_dir = project_dir.join(CONFIG_DIR);
        let toml = LeadboardToml::load_or_default(&leadboard_dir)?;

        Ok(Self {
            project_dir,
            leadboard_dir,
            toml,
            verbose: false,
            cli_backend: None,
        })
    }

    pub fn with_cli_args(
        project_dir: PathBuf,
        verbose: bool,
        backend: Option<BackendKind>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.cli_backend = backend;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.leadboard_dir.join(CONFIG_FILE)
    }

    /// Backend kind (CLI → file).
    pub fn backend_kind(&self) -> BackendKind {
        self.cli_backend.unwrap_or(self.toml.backend.kind)
    }

    /// Lead API base URL (env → file → local server).
    pub fn api_url(&self) -> String {
        env_non_empty(ENV_API_URL)
            .or_else(|| self.toml.backend.base_url.clone())
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", self.toml.server.port))
    }

    /// SQLite file (file → `.leadboard/leads.db`), resolved against the
    /// project directory.
    pub fn db_path(&self) -> PathBuf {
        match self.toml.backend.db_path {
            Some(ref p) => self.project_dir.join(p),
            None => self.leadboard_dir.join("leads.db"),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.toml.backend.timeout_secs)
    }

    pub fn server_port(&self) -> u16 {
        self.toml.server.port
    }

    /// Company id (env → file → "default").
    pub fn company_id(&self) -> String {
        env_non_empty(ENV_COMPANY_ID)
            .or_else(|| self.toml.session.company_id.clone())
            .unwrap_or_else(|| DEFAULT_COMPANY.to_string())
    }

    /// Employee id (env → file).
    pub fn employee_id(&self) -> Option<String> {
        env_non_empty(ENV_EMPLOYEE_ID).or_else(|| self.toml.session.employee_id.clone())
    }

    /// The session every store call runs under.
    pub fn session(&self) -> Session {
        let mut session = Session::new(self.company_id());
        if let Some(employee) = self.employee_id() {
            session = session.with_employee(employee);
        }
        if let Some(token) = env_non_empty(ENV_TOKEN) {
            session = session.with_token(token);
        }
        session
    }

    pub fn form_options(&self) -> &FormOptions {
        &self.toml.forms
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [ENV_API_URL, ENV_TOKEN, ENV_COMPANY_ID, ENV_EMPLOYEE_ID] {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("sqlite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert_eq!("HTTP".parse::<BackendKind>().unwrap(), BackendKind::Http);
        let err = "postgres".parse::<BackendKind>().unwrap_err();
        assert!(err.to_string().contains("Invalid backend"));
    }

    #[test]
    fn test_parse_empty_gives_defaults() {
        let toml = LeadboardToml::parse("").unwrap();
        assert_eq!(toml.backend.kind, BackendKind::Sqlite);
        assert_eq!(toml.backend.timeout_secs, 10);
        assert_eq!(toml.server.port, 3141);
        assert_eq!(toml.forms.payment_modes.len(), 5);
        assert!(toml.forms.lost_reasons.is_empty());
        assert!(!toml.logging.json);
        assert!(toml.validate().is_empty());
    }

    #[test]
    fn test_parse_full_file() {
        let toml = LeadboardToml::parse(
            r#"
[backend]
kind = "http"
base_url = "https://crm.example.com"
timeout_secs = 3

[session]
company_id = "acme"
employee_id = "emp-7"

[server]
port = 8080

[forms]
payment_modes = ["UPI"]
lost_reasons = ["Budget", "Timeline"]

[logging]
filter = "leadboard=debug"
json = true
"#,
        )
        .unwrap();
        assert_eq!(toml.backend.kind, BackendKind::Http);
        assert_eq!(toml.backend.base_url.as_deref(), Some("https://crm.example.com"));
        assert_eq!(toml.session.company_id.as_deref(), Some("acme"));
        assert_eq!(toml.server.port, 8080);
        assert_eq!(toml.forms.payment_modes, vec!["UPI"]);
        assert_eq!(toml.forms.lost_reasons.len(), 2);
        assert!(toml.logging.json);
        assert!(toml.validate().is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_backend() {
        let err = LeadboardToml::parse("[backend]\nkind = \"postgres\"\n").unwrap_err();
        assert!(err.to_string().contains("leadboard.toml"));
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut toml = LeadboardToml::default();
        toml.backend.kind = BackendKind::Http;
        toml.backend.timeout_secs = 0;
        toml.session.company_id = Some(" ".into());
        toml.forms.payment_modes.clear();
        toml.logging.filter = Some("leadboard=loud".into());
        let warnings = toml.validate();
        assert!(warnings.iter().any(|w| w.contains("base_url")));
        assert!(warnings.iter().any(|w| w.contains("timeout_secs")));
        assert!(warnings.iter().any(|w| w.contains("company_id")));
        assert!(warnings.iter().any(|w| w.contains("payment_modes")));
        assert!(warnings.iter().any(|w| w.contains("logging.filter")));

        toml.backend.base_url = Some("crm.example.com".into());
        assert!(toml.validate().iter().any(|w| w.contains("http://")));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut toml = LeadboardToml::default();
        toml.session.company_id = Some("acme".into());
        toml.forms.junk_reasons = vec!["Spam".into()];
        toml.save(&path).unwrap();

        let loaded = LeadboardToml::load(&path).unwrap();
        assert_eq!(loaded.session.company_id.as_deref(), Some("acme"));
        assert_eq!(loaded.forms.junk_reasons, vec!["Spam"]);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let toml = LeadboardToml::load_or_default(dir.path()).unwrap();
        assert_eq!(toml.backend.kind, BackendKind::Sqlite);
    }

    #[test]
    fn test_config_layers_file_env_cli() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let dir = tempdir().unwrap();
        let lb_dir = dir.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&lb_dir).unwrap();
        std::fs::write(
            lb_dir.join(CONFIG_FILE),
            "[backend]\nkind = \"http\"\nbase_url = \"http://file:1\"\n[session]\ncompany_id = \"acme\"\n",
        )
        .unwrap();

        let config = LeadboardConfig::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.backend_kind(), BackendKind::Http);
        assert_eq!(config.api_url(), "http://file:1");
        assert_eq!(config.company_id(), "acme");
        assert!(config.session().token.is_none());

        unsafe {
            std::env::set_var(ENV_API_URL, "http://env:2");
            std::env::set_var(ENV_COMPANY_ID, "globex");
            std::env::set_var(ENV_TOKEN, "secret");
        }
        let config =
            LeadboardConfig::with_cli_args(dir.path().to_path_buf(), true, Some(BackendKind::Sqlite))
                .unwrap();
        assert_eq!(config.backend_kind(), BackendKind::Sqlite);
        assert_eq!(config.api_url(), "http://env:2");
        let session = config.session();
        assert_eq!(session.company_id, "globex");
        assert_eq!(session.token.as_deref(), Some("secret"));
        assert!(config.verbose);

        clear_env();
    }

    #[test]
    fn test_defaults_without_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let dir = tempdir().unwrap();
        let config = LeadboardConfig::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.company_id(), "default");
        assert_eq!(config.employee_id(), None);
        assert_eq!(config.api_url(), "http://127.0.0.1:3141");
        assert!(config.db_path().ends_with(".leadboard/leads.db"));
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }
}
