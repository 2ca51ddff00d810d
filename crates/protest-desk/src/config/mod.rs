use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::intake::{DocumentKind, IntakeSettings};
use crate::workflows::protest::BillingPolicy;
use crate::workflows::saga::CompensationPolicy;

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
    pub store: StoreConfig,
    pub workflows: WorkflowConfig,
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
            telemetry: TelemetryConfig { log_level },
            store: StoreConfig::from_env()?,
            workflows: WorkflowConfig::from_env()?,
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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

/// Which record store backs the workflows.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub sqlite_path: PathBuf,
    /// Pre-load the demo referrer account into a fresh store.
    pub seed_demo: bool,
}

impl StoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let backend = match env::var("APP_STORE")
            .unwrap_or_else(|_| "memory".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" | "mem" => StoreBackend::Memory,
            "sqlite" => StoreBackend::Sqlite,
            other => return Err(ConfigError::InvalidStore(other.to_string())),
        };

        let sqlite_path = env::var("APP_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/protest-desk.db"));

        let seed_demo = match env::var("APP_SEED_DEMO") {
            Ok(value) => parse_flag("APP_SEED_DEMO", &value)?,
            Err(_) => true,
        };

        Ok(Self {
            backend,
            sqlite_path,
            seed_demo,
        })
    }
}

/// Tunables shared by the intake, deletion and billing workflows.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    pub document_types: Vec<DocumentKind>,
    pub compensation: CompensationPolicy,
    pub contingency_rate: f64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let intake = IntakeSettings::default();
        Self {
            document_types: intake.document_types,
            compensation: intake.compensation,
            contingency_rate: BillingPolicy::default().contingency_rate,
        }
    }
}

impl WorkflowConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(raw) = env::var("INTAKE_DOCUMENT_TYPES") {
            config.document_types = raw
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(|entry| {
                    DocumentKind::parse(entry)
                        .ok_or_else(|| ConfigError::InvalidDocumentType(entry.to_string()))
                })
                .collect::<Result<_, _>>()?;
        }

        if let Ok(raw) = env::var("WORKFLOW_COMPENSATION") {
            config.compensation = CompensationPolicy::parse(&raw)
                .ok_or_else(|| ConfigError::InvalidCompensation(raw.clone()))?;
        }

        if let Ok(raw) = env::var("BILLING_CONTINGENCY_RATE") {
            config.contingency_rate = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|rate| (0.0..=1.0).contains(rate))
                .ok_or_else(|| ConfigError::InvalidContingencyRate(raw.clone()))?;
        }

        Ok(config)
    }

    pub fn intake_settings(&self) -> IntakeSettings {
        IntakeSettings {
            document_types: self.document_types.clone(),
            compensation: self.compensation,
        }
    }

    pub fn billing_policy(&self) -> BillingPolicy {
        BillingPolicy {
            contingency_rate: self.contingency_rate,
        }
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidStore(String),
    InvalidFlag { name: &'static str, value: String },
    InvalidDocumentType(String),
    InvalidCompensation(String),
    InvalidContingencyRate(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidStore(value) => {
                write!(f, "APP_STORE must be 'memory' or 'sqlite', got '{}'", value)
            }
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{} must be true or false, got '{}'", name, value)
            }
            ConfigError::InvalidDocumentType(value) => {
                write!(f, "INTAKE_DOCUMENT_TYPES contains unknown document '{}'", value)
            }
            ConfigError::InvalidCompensation(value) => write!(
                f,
                "WORKFLOW_COMPENSATION must be 'rollback' or 'leave_partial', got '{}'",
                value
            ),
            ConfigError::InvalidContingencyRate(value) => write!(
                f,
                "BILLING_CONTINGENCY_RATE must be a number between 0 and 1, got '{}'",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
