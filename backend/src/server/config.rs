//! Environment-driven application configuration.
//!
//! Everything the process needs is resolved once at startup; services
//! receive explicit values and never read the environment afterwards.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use actix_web::cookie::Key;
use tracing::warn;
use url::Url;

/// Errors raised while resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is absent.
    #[error("missing required environment variable {name}")]
    Missing {
        /// The variable name.
        name: &'static str,
    },
    /// A variable is present but unparsable.
    #[error("invalid value for {name}: {message}")]
    Invalid {
        /// The variable name.
        name: &'static str,
        /// Why parsing failed.
        message: String,
    },
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing { name })
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|err: T::Err| ConfigError::Invalid {
            name,
            message: err.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Resolved application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Redis connection string; absent disables caching.
    pub redis_url: Option<String>,
    /// Payment gateway API base.
    pub paystack_base_url: Url,
    /// Payment gateway secret key (bearer token and webhook HMAC key).
    pub paystack_secret_key: String,
    /// Post-checkout redirect URL handed to the gateway.
    pub payment_callback_url: Option<String>,
    /// Session cookie signing key.
    pub session_key: Key,
    /// Whether the session cookie requires HTTPS.
    pub cookie_secure: bool,
    /// Minutes a reservation hold lasts before reclaim.
    pub hold_ttl_minutes: i64,
    /// Seconds between expiry sweeps.
    pub sweep_interval: Duration,
}

impl AppConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = parsed(
            "BIND_ADDR",
            "0.0.0.0:8080"
                .parse()
                .unwrap_or_else(|_| unreachable!("default bind address parses")),
        )?;
        let database_url = required("DATABASE_URL")?;
        let redis_url = env::var("REDIS_URL").ok();

        let paystack_base_url = match env::var("PAYSTACK_BASE_URL") {
            Ok(raw) => Url::parse(&raw).map_err(|err| ConfigError::Invalid {
                name: "PAYSTACK_BASE_URL",
                message: err.to_string(),
            })?,
            Err(_) => Url::parse("https://api.paystack.co/")
                .unwrap_or_else(|_| unreachable!("default gateway URL parses")),
        };
        let paystack_secret_key = required("PAYSTACK_SECRET_KEY")?;
        let payment_callback_url = env::var("PAYMENT_CALLBACK_URL").ok();

        let session_key = load_session_key()?;
        let cookie_secure = env::var("SESSION_COOKIE_SECURE")
            .map(|v| v != "0")
            .unwrap_or(true);

        let hold_ttl_minutes = parsed("HOLD_TTL_MINUTES", 15i64)?;
        let sweep_interval = Duration::from_secs(parsed("SWEEP_INTERVAL_SECS", 60u64)?);

        Ok(Self {
            bind_addr,
            database_url,
            redis_url,
            paystack_base_url,
            paystack_secret_key,
            payment_callback_url,
            session_key,
            cookie_secure,
            hold_ttl_minutes,
            sweep_interval,
        })
    }
}

fn load_session_key() -> Result<Key, ConfigError> {
    let key_path =
        env::var("SESSION_KEY_FILE").unwrap_or_else(|_| "/var/run/secrets/session_key".into());
    match std::fs::read(&key_path) {
        Ok(bytes) => Ok(Key::derive_from(&bytes)),
        Err(err) => {
            let allow_dev = env::var("SESSION_ALLOW_EPHEMERAL").ok().as_deref() == Some("1");
            if cfg!(debug_assertions) || allow_dev {
                warn!(path = %key_path, error = %err, "using temporary session key (dev only)");
                Ok(Key::generate())
            } else {
                Err(ConfigError::Invalid {
                    name: "SESSION_KEY_FILE",
                    message: format!("failed to read session key at {key_path}: {err}"),
                })
            }
        }
    }
}
