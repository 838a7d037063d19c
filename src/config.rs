use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Verification settings for Supabase-issued access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_audience")]
    pub audience: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SupabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub anon_key: Option<String>,
}

/// Outbox dispatcher tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub poll_interval_secs: u64,
    pub batch_size: u64,
    pub max_attempts: i32,
    pub base_backoff_secs: i64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            batch_size: 50,
            max_attempts: 5,
            base_backoff_secs: 30,
        }
    }
}

fn default_audience() -> String {
    "authenticated".to_string()
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // no config file: build from environment variables and defaults
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::from_toml_str(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::from_env()?,
            Err(e) => {
                return Err(format!("Cannot read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        toml::from_str(config_str).map_err(|e| format!("Failed to parse config file: {e}").into())
    }

    fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let database_url = get_env("DATABASE_URL")
            .ok_or("Missing DATABASE_URL environment variable and no config.toml found")?;
        let jwt_secret = get_env("SUPABASE_JWT_SECRET")
            .ok_or("Missing SUPABASE_JWT_SECRET environment variable and no config.toml found")?;

        let defaults = NotifierConfig::default();
        Ok(Config {
            server: ServerConfig {
                host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get_env_parse("SERVER_PORT", 8080u16),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
            },
            auth: AuthConfig {
                jwt_secret,
                audience: get_env("SUPABASE_JWT_AUDIENCE").unwrap_or_else(default_audience),
            },
            supabase: SupabaseConfig {
                url: get_env("PUBLIC_SUPABASE_URL"),
                anon_key: get_env("PUBLIC_SUPABASE_ANON_KEY"),
            },
            notifier: NotifierConfig {
                poll_interval_secs: get_env_parse(
                    "NOTIFIER_POLL_INTERVAL_SECS",
                    defaults.poll_interval_secs,
                ),
                batch_size: get_env_parse("NOTIFIER_BATCH_SIZE", defaults.batch_size),
                max_attempts: get_env_parse("NOTIFIER_MAX_ATTEMPTS", defaults.max_attempts),
                base_backoff_secs: get_env_parse(
                    "NOTIFIER_BASE_BACKOFF_SECS",
                    defaults.base_backoff_secs,
                ),
            },
        })
    }

    // environment variables win even when a file exists
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("SUPABASE_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Ok(v) = env::var("SUPABASE_JWT_AUDIENCE") {
            self.auth.audience = v;
        }
        if let Ok(v) = env::var("PUBLIC_SUPABASE_URL") {
            self.supabase.url = Some(v);
        }
        if let Ok(v) = env::var("PUBLIC_SUPABASE_ANON_KEY") {
            self.supabase.anon_key = Some(v);
        }
        if let Ok(v) = env::var("NOTIFIER_POLL_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            self.notifier.poll_interval_secs = n;
        }
        if let Ok(v) = env::var("NOTIFIER_BATCH_SIZE")
            && let Ok(n) = v.parse()
        {
            self.notifier.batch_size = n;
        }
        if let Ok(v) = env::var("NOTIFIER_MAX_ATTEMPTS")
            && let Ok(n) = v.parse()
        {
            self.notifier.max_attempts = n;
        }
        if let Ok(v) = env::var("NOTIFIER_BASE_BACKOFF_SECS")
            && let Ok(n) = v.parse()
        {
            self.notifier.base_backoff_secs = n;
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(AppError::ConfigError(
                "database.url must not be empty".to_string(),
            ));
        }
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(AppError::ConfigError(
                "auth.jwt_secret must not be empty".to_string(),
            ));
        }
        if self.notifier.batch_size == 0 || self.notifier.max_attempts <= 0 {
            return Err(AppError::ConfigError(
                "notifier.batch_size and notifier.max_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[server]
host = "127.0.0.1"
port = 3000

[database]
url = "postgres://localhost/market"
max_connections = 4

[auth]
jwt_secret = "super-secret"
"#;

    #[test]
    fn test_parse_minimal_file_uses_defaults() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.auth.audience, "authenticated");
        assert_eq!(config.notifier.batch_size, 50);
        assert_eq!(config.notifier.max_attempts, 5);
        assert!(config.supabase.url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_notifier_section() {
        let text = format!(
            "{SAMPLE}\n[notifier]\npoll_interval_secs = 1\nbatch_size = 10\nmax_attempts = 3\nbase_backoff_secs = 2\n"
        );
        let config = Config::from_toml_str(&text).unwrap();
        assert_eq!(config.notifier.poll_interval_secs, 1);
        assert_eq!(config.notifier.base_backoff_secs, 2);
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let text = SAMPLE.replace("super-secret", "");
        let config = Config::from_toml_str(&text).unwrap();
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        assert!(Config::from_toml_str("[server]\nhost = \"x\"\nport = 1\n").is_err());
    }
}
