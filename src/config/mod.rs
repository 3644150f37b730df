//! Process configuration
//!
//! `APP_ENV` picks a preset (development, staging or production) and the
//! individual variables listed in `with_env_overrides` adjust it. The
//! development preset runs on the in-memory store with a fixed signing key
//! so the server and the test suite start with no environment at all.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub jobs: JobsConfig,
    pub course: CourseConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn detect() -> Self {
        match env::var("APP_ENV").unwrap_or_default().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

/// Which `Store` implementation the server runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    /// Pool acquire timeout, seconds
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseConfig {
    pub join_code_length: usize,
}

/// Overwrite `slot` when `key` is set and parses; malformed values keep the preset
fn override_from<T: FromStr>(slot: &mut T, key: &str) {
    if let Some(parsed) = env::var(key).ok().and_then(|raw| raw.trim().parse().ok()) {
        *slot = parsed;
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let preset = match Environment::detect() {
            Environment::Development => Self::development(),
            Environment::Staging => Self::staging(),
            Environment::Production => Self::production(),
        };
        preset.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var("DATABASE_URL") {
            self.database.url = Some(url);
        }
        override_from(&mut self.database.backend, "DATABASE_BACKEND");
        override_from(&mut self.database.max_connections, "DATABASE_MAX_CONNECTIONS");
        override_from(&mut self.database.connection_timeout, "DATABASE_CONNECTION_TIMEOUT");

        override_from(&mut self.api.port, "PORT");
        override_from(&mut self.api.port, "LEARNHUB_API_PORT");
        override_from(&mut self.api.enable_request_logging, "API_ENABLE_REQUEST_LOGGING");

        override_from(&mut self.security.jwt_secret, "JWT_SECRET");
        override_from(&mut self.security.jwt_expiry_hours, "SECURITY_JWT_EXPIRY_HOURS");

        override_from(&mut self.jobs.workers, "JOBS_WORKERS");
        override_from(&mut self.jobs.queue_capacity, "JOBS_QUEUE_CAPACITY");
        override_from(&mut self.jobs.sweep_interval_secs, "JOBS_SWEEP_INTERVAL_SECS");

        override_from(&mut self.course.join_code_length, "COURSE_JOIN_CODE_LENGTH");
        self
    }

    pub fn development() -> Self {
        AppConfig {
            environment: Environment::Development,
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig { port: 3000, enable_request_logging: true },
            security: SecurityConfig {
                jwt_secret: "learnhub-dev-secret".into(),
                jwt_expiry_hours: 168,
            },
            jobs: JobsConfig { workers: 2, queue_capacity: 1024, sweep_interval_secs: 30 },
            course: CourseConfig { join_code_length: 6 },
        }
    }

    /// Postgres-backed; the secret has to come from `JWT_SECRET`
    pub fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database = DatabaseConfig {
            backend: StoreBackend::Postgres,
            url: None,
            max_connections: 20,
            connection_timeout: 10,
        };
        config.security = SecurityConfig { jwt_secret: String::new(), jwt_expiry_hours: 24 };
        config.jobs = JobsConfig { workers: 4, queue_capacity: 4096, sweep_interval_secs: 60 };
        config
    }

    pub fn production() -> Self {
        let mut config = Self::staging();
        config.environment = Environment::Production;
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.api = ApiConfig { port: 8080, enable_request_logging: false };
        config.security.jwt_expiry_hours = 4;
        config.jobs.workers = 8;
        config.jobs.queue_capacity = 16384;
        config
    }
}

/// Loaded on first access
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_runs_in_memory() {
        let config = AppConfig::development();
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.course.join_code_length, 6);
        assert!(!config.security.jwt_secret.is_empty());
    }

    #[test]
    fn production_requires_postgres_and_a_secret() {
        let config = AppConfig::production();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.database.backend, StoreBackend::Postgres);
        assert!(config.security.jwt_secret.is_empty());
        assert!(config.jobs.workers > 1);
        assert!(!config.api.enable_request_logging);
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("Memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("postgresql".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }
}
