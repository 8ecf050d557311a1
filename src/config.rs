use std::env;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

const DEFAULT_STAGE_TTL_SECONDS: u64 = 30 * 60;
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
}

impl std::fmt::Debug for StripeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeSettings").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub bind_addr: SocketAddr,
    pub stripe: StripeSettings,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub stage_ttl: Duration,
    pub stage_backend: StageBackend,
    pub log_format: LogFormat,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn invalid(name: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok(); // Load .env file

        let stage_ttl = match optional("WORKSPACE_STAGE_TTL_SECONDS") {
            Some(raw) => {
                let secs = raw
                    .parse::<u64>()
                    .map_err(|e| invalid("WORKSPACE_STAGE_TTL_SECONDS", e))?;
                if secs == 0 {
                    return Err(invalid("WORKSPACE_STAGE_TTL_SECONDS", "must be positive"));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_STAGE_TTL_SECONDS),
        };

        let stage_backend = match optional("WORKSPACE_STAGE_BACKEND").as_deref() {
            None | Some("memory") => StageBackend::Memory,
            Some("postgres") => StageBackend::Postgres,
            Some(other) => {
                return Err(invalid(
                    "WORKSPACE_STAGE_BACKEND",
                    format!("expected `memory` or `postgres`, got `{other}`"),
                ))
            }
        };

        let log_format = match optional("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(invalid(
                    "LOG_FORMAT",
                    format!("expected `pretty` or `json`, got `{other}`"),
                ))
            }
        };

        let bind_addr = optional("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| invalid("BIND_ADDR", e))?;

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            frontend_origin: required("FRONTEND_ORIGIN")?,
            bind_addr,
            stripe: StripeSettings {
                secret_key: required("STRIPE_SECRET_KEY")?,
                webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            },
            jwt_secret: required("JWT_SECRET")?,
            jwt_issuer: optional("JWT_ISSUER").unwrap_or_else(|| "planboard".to_string()),
            jwt_audience: optional("JWT_AUDIENCE").unwrap_or_else(|| "planboard-app".to_string()),
            stage_ttl,
            stage_backend,
            log_format,
        })
    }
}
