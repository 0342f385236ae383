use std::{env, time::Duration};

use gate_common::{parse_boolean_flag, parse_duration_millis, parse_number, Secret};
use gate_engine::{RateLimitRule, DEFAULT_CACHE_TTL, DEFAULT_LOOKUP_TIMEOUT};
use log::*;
use rand::{thread_rng, RngCore};

use crate::errors::ServerError;

const DEFAULT_GATE_HOST: &str = "127.0.0.1";
const DEFAULT_GATE_PORT: u16 = 8360;
const DEFAULT_IP_RATE_LIMIT: u32 = 5;
const DEFAULT_PARTNER_RATE_LIMIT: u32 = 100;
const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(1);
/// HS256 secrets shorter than the hash output are accepted, but they are weak.
const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub proxy: ProxyConfig,
    pub gatekeeper: GatekeeperConfig,
    /// When set, CORS headers are only returned for these origins. Otherwise every origin is echoed back.
    pub cors_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_GATE_HOST.to_string(),
            port: DEFAULT_GATE_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            proxy: ProxyConfig::default(),
            gatekeeper: GatekeeperConfig::default(),
            cors_origins: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("GATE_HOST").ok().unwrap_or_else(|| DEFAULT_GATE_HOST.into());
        let port = parse_number("GATE_PORT", env::var("GATE_PORT").ok(), DEFAULT_GATE_PORT);
        let database_url = env::var("GATE_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ GATE_DATABASE_URL is not set. Please set it to the URL for the gatekeeper database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let proxy = ProxyConfig::from_env();
        let gatekeeper = GatekeeperConfig::from_env_or_default();
        let cors_origins = env::var("GATE_CORS_ORIGINS").ok().and_then(|s| parse_origins(&s));
        match &cors_origins {
            Some(origins) => info!("🪛️ CORS is restricted to {}", origins.join(", ")),
            None => info!("🪛️ GATE_CORS_ORIGINS is not set. CORS headers will echo any origin."),
        }
        Self { host, port, database_url, auth, proxy, gatekeeper, cors_origins }
    }
}

fn parse_origins(value: &str) -> Option<Vec<String>> {
    let origins = value
        .split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<String>>();
    (!origins.is_empty()).then_some(origins)
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The shared HS256 secret used to verify (and, for operators, to sign) bearer tokens.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. No token issued by \
             any other service will be accepted. DO NOT operate on production like this. 🚨️🚨️🚨️"
        );
        let mut key = [0u8; 32];
        thread_rng().fill_bytes(&mut key);
        Self { jwt_secret: Secret::new(hex::encode(key)) }
    }
}

impl AuthConfig {
    pub fn new(jwt_secret: &str) -> Self {
        Self { jwt_secret: Secret::new(jwt_secret.to_string()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret = env::var("GATE_JWT_SECRET")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [GATE_JWT_SECRET]")))?;
        if secret.trim().is_empty() {
            return Err(ServerError::ConfigurationError("GATE_JWT_SECRET is empty".to_string()));
        }
        if secret.len() < MIN_JWT_SECRET_LEN {
            warn!("🪛️ GATE_JWT_SECRET is shorter than {MIN_JWT_SECRET_LEN} bytes. Consider using a longer secret.");
        }
        Ok(Self { jwt_secret: Secret::new(secret) })
    }
}

//-------------------------------------------------  ProxyConfig  ------------------------------------------------------
/// Which proxy headers may be trusted when working out the client's address.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProxyConfig {
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the `for=` field of the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
}

impl ProxyConfig {
    pub fn from_env() -> Self {
        let use_x_forwarded_for = parse_boolean_flag(env::var("GATE_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("GATE_USE_FORWARDED").ok(), false);
        Self { use_x_forwarded_for, use_forwarded }
    }
}

//-----------------------------------------------  GatekeeperConfig  ---------------------------------------------------
/// The immutable tuning of the request pipeline, built once at startup.
#[derive(Clone, Debug)]
pub struct GatekeeperConfig {
    pub ip_rate_limit: RateLimitRule,
    pub partner_rate_limit: RateLimitRule,
    /// Per-subject limiting is off unless `GATE_SUBJECT_RATE_LIMIT` is set to a non-zero value.
    pub subject_rate_limit: Option<RateLimitRule>,
    pub cache_ttl: Duration,
    pub store_timeout: Duration,
    /// The shared key for Groove callbacks. Groove routes reject every request while this is empty.
    pub groove_secret: Secret<String>,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            ip_rate_limit: RateLimitRule::new(DEFAULT_IP_RATE_LIMIT, DEFAULT_RATE_WINDOW),
            partner_rate_limit: RateLimitRule::new(DEFAULT_PARTNER_RATE_LIMIT, DEFAULT_RATE_WINDOW),
            subject_rate_limit: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            store_timeout: DEFAULT_LOOKUP_TIMEOUT,
            groove_secret: Secret::default(),
        }
    }
}

impl GatekeeperConfig {
    pub fn from_env_or_default() -> Self {
        let ip_rate_limit = rule_from_env("GATE_IP_RATE_LIMIT", "GATE_IP_RATE_WINDOW_MS", DEFAULT_IP_RATE_LIMIT);
        let partner_rate_limit =
            rule_from_env("GATE_PARTNER_RATE_LIMIT", "GATE_PARTNER_RATE_WINDOW_MS", DEFAULT_PARTNER_RATE_LIMIT);
        let subject_rate_limit = match rule_from_env("GATE_SUBJECT_RATE_LIMIT", "GATE_SUBJECT_RATE_WINDOW_MS", 0) {
            rule if rule.limit == 0 => None,
            rule => Some(rule),
        };
        let cache_secs =
            parse_number("GATE_CACHE_TTL_SECS", env::var("GATE_CACHE_TTL_SECS").ok(), DEFAULT_CACHE_TTL.as_secs());
        let store_timeout = parse_duration_millis(
            "GATE_STORE_TIMEOUT_MS",
            env::var("GATE_STORE_TIMEOUT_MS").ok(),
            DEFAULT_LOOKUP_TIMEOUT,
        );
        let groove_secret = env::var("GATE_GROOVE_SECRET").ok().unwrap_or_else(|| {
            warn!("🪛️ GATE_GROOVE_SECRET is not set. Groove callbacks will be rejected.");
            String::default()
        });
        Self {
            ip_rate_limit,
            partner_rate_limit,
            subject_rate_limit,
            cache_ttl: Duration::from_secs(cache_secs),
            store_timeout,
            groove_secret: Secret::new(groove_secret),
        }
    }

    pub fn with_groove_secret(mut self, secret: &str) -> Self {
        self.groove_secret = Secret::new(secret.to_string());
        self
    }
}

fn rule_from_env(limit_var: &str, window_var: &str, default_limit: u32) -> RateLimitRule {
    let limit = parse_rate_limit(limit_var, env::var(limit_var).ok(), default_limit);
    let window = parse_duration_millis(window_var, env::var(window_var).ok(), DEFAULT_RATE_WINDOW);
    RateLimitRule::new(limit, window)
}

/// A limit of zero would reject every request, so it falls back to the default. Limits whose default is zero are
/// disabled, and stay that way when set to zero.
fn parse_rate_limit(name: &str, value: Option<String>, default_limit: u32) -> u32 {
    match parse_number(name, value, default_limit) {
        0 if default_limit > 0 => {
            warn!("🪛️ {name} cannot be zero. Using the default of {default_limit} instead.");
            default_limit
        },
        limit => limit,
    }
}
