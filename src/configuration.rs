use std::time::Duration;

use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::ConnectOptions;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub source: SourceSettings,
    pub providers: ProviderSettings,
    pub pipeline: PipelineSettings,
    pub dispatch: DispatchSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default)]
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(&self.password)
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db()
            .database(&self.database_name)
            .log_statements(log::LevelFilter::Trace)
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct SourceSettings {
    pub webdriver_url: String,
    pub login_url: String,
    pub login_ready_selector: String,
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
    pub search_url: String,
    pub page_ready_selector: String,
    #[serde(default = "default_page_settle_secs")]
    pub page_settle_secs: u64,
    pub queries: Vec<String>,
}

impl SourceSettings {
    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn page_settle(&self) -> Duration {
        Duration::from_secs(self.page_settle_secs)
    }
}

#[derive(serde::Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Getprospect,
    Hunter,
    Apollo,
}

#[derive(serde::Deserialize, Clone)]
pub struct ProviderSettings {
    /// Priority order: cheaper or more reliable providers first.
    pub order: Vec<ProviderKind>,
    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,
    pub getprospect_api_key: Option<String>,
    pub hunter_api_key: Option<String>,
    pub apollo_api_key: Option<String>,
}

impl ProviderSettings {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct PipelineSettings {
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Hard ceiling on candidates processed per run. 0 means unlimited.
    #[serde(default)]
    pub contact_budget: u32,
    /// Candidates counted as processed without lookup/persist/send, for
    /// resuming mid-result-set after a partial run.
    #[serde(default)]
    pub skip_offset: u32,
    pub page_ceiling: u32,
    pub candidate_delay_secs: u64,
    pub page_delay_secs: u64,
    /// On a failed dedup lookup, true treats the candidate as unseen and
    /// keeps going; false skips it.
    #[serde(default = "default_true")]
    pub dedup_fail_open: bool,
}

impl PipelineSettings {
    pub fn candidate_delay(&self) -> Duration {
        Duration::from_secs(self.candidate_delay_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_secs(self.page_delay_secs)
    }

    pub fn retention_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct DispatchSettings {
    #[serde(default)]
    pub enabled: bool,
    pub smtp_host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub smtp_port: u16,
    pub from_email: String,
    pub subject: String,
    pub template_path: String,
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

fn default_retention_days() -> i64 {
    14
}

fn default_lookup_timeout_secs() -> u64 {
    10
}

fn default_login_timeout_secs() -> u64 {
    300
}

fn default_page_settle_secs() -> u64 {
    3
}

fn default_true() -> bool {
    true
}
