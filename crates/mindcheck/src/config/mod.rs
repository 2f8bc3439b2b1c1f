use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SCORING_API_URL: &str = "http://localhost:3000/";
const DEFAULT_SCORING_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub assessment: AssessmentConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            assessment: AssessmentConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Built-in questionnaire to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogChoice {
    Phq,
    Student,
}

impl CatalogChoice {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "phq" | "screening" => Ok(Self::Phq),
            "student" => Ok(Self::Student),
            other => Err(ConfigError::UnknownCatalog(other.to_string())),
        }
    }
}

/// Where the final submission is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringStrategy {
    Local,
    Remote,
}

impl ScoringStrategy {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "offline" => Ok(Self::Local),
            "remote" | "api" => Ok(Self::Remote),
            other => Err(ConfigError::UnknownScoringStrategy(other.to_string())),
        }
    }
}

/// Connection details for the external prediction service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteScoringConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringConfig {
    pub strategy: ScoringStrategy,
    pub remote: RemoteScoringConfig,
    pub timeout: Duration,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            strategy: ScoringStrategy::Local,
            remote: RemoteScoringConfig {
                base_url: DEFAULT_SCORING_API_URL.to_string(),
                bearer_token: None,
            },
            timeout: Duration::from_millis(DEFAULT_SCORING_TIMEOUT_MS),
        }
    }
}

/// Bounds on live sessions held in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Sessions older than this are dropped when new ones start.
    pub ttl: Duration,
    pub max_sessions: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

/// Questionnaire, scoring, and saved-progress settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentConfig {
    pub catalog: CatalogChoice,
    pub scoring: ScoringConfig,
    /// Directory for saved progress; an in-memory store is used when unset.
    pub progress_dir: Option<PathBuf>,
    pub sessions: SessionLimits,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogChoice::Phq,
            scoring: ScoringConfig::default(),
            progress_dir: None,
            sessions: SessionLimits::default(),
        }
    }
}

fn positive_env(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or(ConfigError::InvalidSessionLimit(key)),
        Err(_) => Ok(default),
    }
}

impl AssessmentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let catalog = CatalogChoice::parse(
            &env::var("ASSESSMENT_CATALOG").unwrap_or_else(|_| "phq".to_string()),
        )?;
        let strategy = ScoringStrategy::parse(
            &env::var("SCORING_STRATEGY").unwrap_or_else(|_| "local".to_string()),
        )?;

        let base_url =
            env::var("SCORING_API_URL").unwrap_or_else(|_| DEFAULT_SCORING_API_URL.to_string());
        let bearer_token = env::var("SCORING_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        let timeout_ms = match env::var("SCORING_TIMEOUT_MS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::InvalidTimeout)?,
            Err(_) => DEFAULT_SCORING_TIMEOUT_MS,
        };

        let progress_dir = env::var("PROGRESS_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let ttl_secs = positive_env("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;
        let max_sessions = positive_env("MAX_SESSIONS", DEFAULT_MAX_SESSIONS as u64)?;

        Ok(Self {
            catalog,
            scoring: ScoringConfig {
                strategy,
                remote: RemoteScoringConfig {
                    base_url,
                    bearer_token,
                },
                timeout: Duration::from_millis(timeout_ms),
            },
            progress_dir,
            sessions: SessionLimits {
                ttl: Duration::from_secs(ttl_secs),
                max_sessions: usize::try_from(max_sessions)
                    .map_err(|_| ConfigError::InvalidSessionLimit("MAX_SESSIONS"))?,
            },
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    UnknownCatalog(String),
    UnknownScoringStrategy(String),
    InvalidTimeout,
    InvalidSessionLimit(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::UnknownCatalog(value) => {
                write!(f, "ASSESSMENT_CATALOG '{value}' is not one of: phq, student")
            }
            ConfigError::UnknownScoringStrategy(value) => {
                write!(f, "SCORING_STRATEGY '{value}' is not one of: local, remote")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "SCORING_TIMEOUT_MS must be a positive number of milliseconds")
            }
            ConfigError::InvalidSessionLimit(key) => {
                write!(f, "{key} must be a positive whole number")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::UnknownCatalog(_)
            | ConfigError::UnknownScoringStrategy(_)
            | ConfigError::InvalidTimeout
            | ConfigError::InvalidSessionLimit(_) => None,
        }
    }
}
