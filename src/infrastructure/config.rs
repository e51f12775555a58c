use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub zoho: ZohoConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_max")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_pool_max(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_provider")]
    pub provider: String,
}

/// Zoho Books credentials and endpoints. Secrets stay optional here;
/// `ZohoCredentials::from_config` decides whether they are usable.
#[derive(Debug, Deserialize, Clone)]
pub struct ZohoConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub organization_id: Option<String>,
    #[serde(default = "default_accounts_url")]
    pub accounts_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// 0 leaves reqwest's own defaults in place.
    #[serde(default)]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default)]
    pub interval_seconds: u64,
    #[serde(default)]
    pub run_on_startup: bool,
    #[serde(default = "default_due_in_days")]
    pub due_in_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_filter")]
    pub default_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: default_store_provider(),
        }
    }
}

impl Default for ZohoConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            refresh_token: None,
            organization_id: None,
            accounts_url: default_accounts_url(),
            api_base_url: default_api_base_url(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            request_timeout_seconds: 0,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 0,
            run_on_startup: false,
            due_in_days: default_due_in_days(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            default_filter: default_log_filter(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("INVOICES").separator("__"));
        let cfg = builder.build()?;
        let mut config: Config = cfg.try_deserialize()?;

        config.zoho.apply_legacy_env();

        if config.store.provider == "memory" {
            return Ok(config);
        }

        if config.database.url.trim().is_empty() {
            let database_url = match env::var("INVOICES__DATABASE__URL") {
                Ok(url) if !url.trim().is_empty() => url,
                _ => match env::var("DATABASE_URL") {
                    Ok(url) if !url.trim().is_empty() => url,
                    _ => {
                        return Err(config::ConfigError::Message(
                            "Missing database URL. Set INVOICES__DATABASE__URL or DATABASE_URL."
                                .into(),
                        ));
                    }
                },
            };

            config.database.url = database_url;
        }

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }

    /// `None` disables the periodic sync worker.
    pub fn sync_interval(&self) -> Option<Duration> {
        match self.sync.interval_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl ZohoConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Fills blank secrets from the unprefixed `ZOHO_*` variables.
    fn apply_legacy_env(&mut self) {
        fill_from_env(&mut self.client_id, "ZOHO_CLIENT_ID");
        fill_from_env(&mut self.client_secret, "ZOHO_CLIENT_SECRET");
        fill_from_env(&mut self.refresh_token, "ZOHO_REFRESH_TOKEN");
        fill_from_env(&mut self.organization_id, "ZOHO_ORG_ID");
    }
}

fn fill_from_env(slot: &mut Option<String>, key: &str) {
    let missing = slot.as_deref().map(str::trim).map_or(true, str::is_empty);
    if missing {
        if let Ok(value) = env::var(key) {
            if !value.trim().is_empty() {
                *slot = Some(value);
            }
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_pool_max() -> u32 {
    10
}

fn default_store_provider() -> String {
    "postgres".to_string()
}

fn default_accounts_url() -> String {
    "https://accounts.zoho.com".to_string()
}

fn default_api_base_url() -> String {
    "https://www.zohoapis.com/books/v3".to_string()
}

fn default_page_size() -> u32 {
    200
}

fn default_max_pages() -> u32 {
    500
}

fn default_due_in_days() -> i64 {
    crate::domain::models::INTERNAL_DUE_DAYS
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}
