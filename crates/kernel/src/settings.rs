use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "DELIVERY_ENV";
const CONFIG_DIR_ENV: &str = "DELIVERY_CONFIG_DIR";
const ENV_PREFIX: &str = "DELIVERY";
/// Connection string variable shared with the delivery service.
pub const MONGO_URI_ENV: &str = "MONGO_URI";

/// Deployment environment the bootstrap is running against.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub seed: SeedSettings,
    #[serde(default = "default_indexes")]
    pub indexes: Vec<IndexSpec>,
    #[serde(default)]
    pub app_user: AppUserSettings,
    #[serde(default)]
    pub bootstrap: BootstrapSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            database: DatabaseSettings::default(),
            seed: SeedSettings::default(),
            indexes: default_indexes(),
            app_user: AppUserSettings::default(),
            bootstrap: BootstrapSettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay
    /// and `DELIVERY_*` variables (`__` separates nested keys). An explicit
    /// `config_dir` takes precedence over `DELIVERY_CONFIG_DIR`.
    pub fn load_with_dir(config_dir: Option<&Path>) -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match config_dir {
            Some(dir) => dir.to_path_buf(),
            None => match std::env::var(CONFIG_DIR_ENV) {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => std::env::current_dir()
                    .context("unable to resolve current directory")?
                    .join("config"),
            },
        };

        let mut settings = Self::from_sources(&config_dir, &environment)?;

        if let Ok(uri) = std::env::var(MONGO_URI_ENV) {
            settings.database.uri = uri;
        }

        Ok(settings)
    }

    /// Build settings from `<config_dir>/base.toml`, `<config_dir>/<environment>.toml`
    /// and prefixed environment variables.
    pub fn from_sources(config_dir: &Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_environment: Environment = environment.parse()?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // The selector variable wins over any `environment` key in the files.
        settings.environment = parsed_environment;

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_uri")]
    pub uri: String,
    #[serde(default = "DatabaseSettings::default_name")]
    pub name: String,
    #[serde(default = "DatabaseSettings::default_collection")]
    pub collection: String,
    #[serde(default = "DatabaseSettings::default_app_name")]
    pub app_name: String,
    #[serde(default = "DatabaseSettings::default_server_selection_timeout_ms")]
    pub server_selection_timeout_ms: u64,
}

impl DatabaseSettings {
    fn default_uri() -> String {
        "mongodb://127.0.0.1:27017".to_string()
    }

    fn default_name() -> String {
        "delivery_db".to_string()
    }

    fn default_collection() -> String {
        "deliveries".to_string()
    }

    fn default_app_name() -> String {
        "delivery-init".to_string()
    }

    fn default_server_selection_timeout_ms() -> u64 {
        10_000
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: Self::default_uri(),
            name: Self::default_name(),
            collection: Self::default_collection(),
            app_name: Self::default_app_name(),
            server_selection_timeout_ms: Self::default_server_selection_timeout_ms(),
        }
    }
}

/// Where the seed records come from. `None` means the built-in set.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SeedSettings {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Sort direction of a single-field index.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexOrder {
    #[default]
    Asc,
    Desc,
}

impl IndexOrder {
    /// Numeric direction used in index key documents.
    pub fn direction(self) -> i32 {
        match self {
            IndexOrder::Asc => 1,
            IndexOrder::Desc => -1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IndexSpec {
    pub field: String,
    #[serde(default)]
    pub order: IndexOrder,
}

impl IndexSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: IndexOrder::Asc,
        }
    }
}

fn default_indexes() -> Vec<IndexSpec> {
    vec![IndexSpec::ascending("user_id"), IndexSpec::ascending("status")]
}

/// A role granted to the application user. `db` defaults to the target database.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RoleSettings {
    pub role: String,
    #[serde(default)]
    pub db: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct AppUserSettings {
    #[serde(default = "AppUserSettings::default_username")]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_file: Option<PathBuf>,
    #[serde(default = "AppUserSettings::default_roles")]
    pub roles: Vec<RoleSettings>,
}

impl AppUserSettings {
    fn default_username() -> String {
        "stud".to_string()
    }

    fn default_roles() -> Vec<RoleSettings> {
        vec![RoleSettings {
            role: "readWrite".to_string(),
            db: None,
        }]
    }
}

impl Default for AppUserSettings {
    fn default() -> Self {
        Self {
            username: Self::default_username(),
            password: None,
            password_file: None,
            roles: Self::default_roles(),
        }
    }
}

impl std::fmt::Debug for AppUserSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppUserSettings")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .field("password_file", &self.password_file)
            .field("roles", &self.roles)
            .finish()
    }
}

/// What to do when the target collection already exists.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RerunPolicy {
    /// Run every step; the collection step fails on an initialized target.
    #[default]
    Fail,
    /// Leave an initialized target untouched and report success.
    Skip,
}

impl std::str::FromStr for RerunPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value {
            "fail" => Ok(RerunPolicy::Fail),
            "skip" => Ok(RerunPolicy::Skip),
            other => Err(anyhow!("unsupported re-run policy '{}'; expected fail/skip", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BootstrapSettings {
    #[serde(default)]
    pub on_existing: RerunPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_level")]
    pub level: String,
}

impl TelemetrySettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
