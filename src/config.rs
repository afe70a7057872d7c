use rocket::figment::{
    Figment,
    providers::{Env, Format, Toml},
    value::{Uncased, UncasedStr},
};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_API_BASE_PATH: &str = "/api";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
    pub api: ApiConfig,
    pub game: GameConfig,
    pub sheets: SheetsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub address: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
    pub slow_query_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    /// Exact origins allowed to call the API. A single `*` allows every origin.
    #[serde(deserialize_with = "string_or_list")]
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_path: String,
    pub enable_swagger: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GameConfig {
    /// Advisory answering window reported to the client as `endTime`.
    pub session_duration_seconds: i64,
    pub pool_cache_ttl_seconds: u64,
    /// Accept a check-in link on a session that already exists.
    pub late_checkin_enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SheetsConfig {
    pub service_account_email: String,
    pub private_key: String,
    pub spreadsheet_id: String,
    pub pool_a_range: String,
    pub pool_b_range: String,
    pub donor_range: String,
    pub token_url: String,
    pub api_base_url: String,
    pub request_timeout_seconds: u64,
}

impl SheetsConfig {
    /// Private keys pasted into env files usually carry escaped newlines.
    pub fn private_key_pem(&self) -> String {
        self.private_key.replace("\\n", "\n")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/quiz_db".to_string(),
            max_connections: 16,
            min_connections: 0,
            acquire_timeout: 5,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            address: "0.0.0.0".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            slow_query_ms: 500,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_credentials: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_API_BASE_PATH.to_string(),
            enable_swagger: false,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            session_duration_seconds: 60,
            pool_cache_ttl_seconds: 60,
            late_checkin_enabled: true,
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            service_account_email: String::new(),
            private_key: String::new(),
            spreadsheet_id: String::new(),
            pool_a_range: "PoolA!A2:F".to_string(),
            pool_b_range: "PoolB!A2:F".to_string(),
            donor_range: "PoolC!A2:B".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            api_base_url: "https://sheets.googleapis.com/v4".to_string(),
            request_timeout_seconds: 10,
        }
    }
}

const LEGACY_ENV_KEYS: [&str; 6] = [
    "DATABASE_URL",
    "CORS_ORIGIN",
    "PORT",
    "SERVICE_ACCOUNT_EMAIL",
    "SERVICE_ACCOUNT_PRIVATE_KEY",
    "SPREADSHEET_ID",
];

fn legacy_env_key(key: &UncasedStr) -> Uncased<'_> {
    let mapped = match key.as_str().to_ascii_uppercase().as_str() {
        "DATABASE_URL" => "database.url",
        "CORS_ORIGIN" => "cors.allowed_origins",
        "PORT" => "server.port",
        "SERVICE_ACCOUNT_EMAIL" => "sheets.service_account_email",
        "SERVICE_ACCOUNT_PRIVATE_KEY" => "sheets.private_key",
        "SPREADSHEET_ID" => "sheets.spreadsheet_id",
        _ => return key.into(),
    };
    mapped.into()
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Quiz.toml (base configuration file)
    /// 2. Environment variables (prefixed with QUIZ_, nested keys split on `__`)
    /// 3. Unprefixed variables used by existing deployments (DATABASE_URL, PORT, ...)
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        let defaults = toml::to_string(&Config::default()).unwrap_or_default();

        Figment::new()
            .merge(Toml::string(&defaults))
            .merge(Toml::file("Quiz.toml").nested())
            .merge(Env::prefixed("QUIZ_").split("__"))
            .merge(Env::raw().only(&LEGACY_ENV_KEYS).map(legacy_env_key))
    }
}

/// Accepts either a TOML/JSON list or a comma-separated string such as `CORS_ORIGIN`.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        String(String),
        List(Vec<String>),
    }

    let values = match StringOrList::deserialize(deserializer)? {
        StringOrList::String(value) => value.split(',').map(str::to_string).collect(),
        StringOrList::List(values) => values,
    };

    Ok(values.into_iter().map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect())
}
