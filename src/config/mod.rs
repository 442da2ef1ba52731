use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub batch: BatchConfig,
    pub memo: MemoConfig,
    pub geocoder: GeocoderConfig,
    pub request: RequestConfig,
    pub correction: CorrectionConfig,
    pub logging: LoggingConfig,
    /// Problems found while reading optional values; each one fell back to a default.
    pub warnings: Vec<String>,
}

/// Batch input/output configuration
///
/// Each field may come from the environment or from the command line; empty
/// values are rejected by [`Config::validate`].
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub location_column: String,
}

/// Memo store configuration
#[derive(Debug, Clone)]
pub struct MemoConfig {
    pub enabled: bool,
    pub path: PathBuf,
    /// Number of store mutations tolerated before a flush to disk.
    pub save_threshold: usize,
}

/// Geocoding provider configuration
#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub base_url: String,
    /// Ordered identities; each batch pass consumes the next one.
    pub user_agents: Vec<String>,
    pub timeout_secs: u64,
    /// Minimum delay between two calls made with the same identity.
    pub min_delay_ms: u64,
}

/// HTTP retry configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Spelling-correction configuration
#[derive(Debug, Clone, Default)]
pub struct CorrectionConfig {
    pub enabled: bool,
    pub lexicon_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let mut warnings = Vec::new();

        let batch = BatchConfig {
            input_path: env::var("GEOCODE_INPUT_PATH").map(PathBuf::from).unwrap_or_default(),
            output_path: env::var("GEOCODE_OUTPUT_PATH").map(PathBuf::from).unwrap_or_default(),
            location_column: env::var("LOCATION_COLUMN").unwrap_or_default(),
        };

        let memo = MemoConfig {
            enabled: flag("USE_MEMO", true, &mut warnings),
            path: PathBuf::from(env::var("MEMO_PATH").unwrap_or_else(|_| "memo.json".to_string())),
            save_threshold: parsed("MEMO_SAVE_THRESHOLD", 50, &mut warnings),
        };

        let user_agents = parse_user_agents(&required("USER_AGENTS")?);
        if user_agents.is_empty() {
            return Err(AppError::Config {
                message: "USER_AGENTS must name at least one user agent".to_string(),
            });
        }

        let geocoder = GeocoderConfig {
            base_url: env::var("NOMINATIM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_NOMINATIM_URL.to_string()),
            user_agents,
            timeout_secs: parsed("GEOCODE_TIMEOUT_SECS", 15, &mut warnings),
            min_delay_ms: parsed("GEOCODE_MIN_DELAY_MS", 1000, &mut warnings),
        };

        let request = RequestConfig {
            max_retries: parsed("MAX_RETRIES", 2, &mut warnings),
            retry_delay_ms: parsed("RETRY_DELAY_MS", 1000, &mut warnings),
        };

        let correction = CorrectionConfig {
            enabled: flag("USE_AUTOCORRECT", false, &mut warnings),
            lexicon_path: env::var("CORRECTIONS_PATH").ok().map(PathBuf::from),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    warnings.push(format!("Unknown LOG_FORMAT \"{}\", using pretty", other));
                    LogFormat::Pretty
                }
            },
        };

        Ok(Config {
            batch,
            memo,
            geocoder,
            request,
            correction,
            logging,
            warnings,
        })
    }
}

impl Config {
    /// Check the batch settings once every source has been applied.
    pub fn validate(&self) -> Result<(), AppError> {
        let missing = [
            ("GEOCODE_INPUT_PATH", "--input", self.batch.input_path.as_os_str().is_empty()),
            ("GEOCODE_OUTPUT_PATH", "--output", self.batch.output_path.as_os_str().is_empty()),
            ("LOCATION_COLUMN", "--column", self.batch.location_column.trim().is_empty()),
        ];
        match missing.iter().find(|(_, _, empty)| *empty) {
            Some((var, flag, _)) => Err(AppError::Config {
                message: format!("{} (or {}) is required", var, flag),
            }),
            None => Ok(()),
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_NOMINATIM_URL.to_string(),
            user_agents: Vec::new(),
            timeout_secs: 15,
            min_delay_ms: 1000,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

/// Split a comma-separated identity list, dropping blanks.
pub fn parse_user_agents(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Config {
        message: format!("{} is required", key),
    })
}

fn parsed<T: FromStr>(key: &str, default: T, warnings: &mut Vec<String>) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warnings.push(format!("Invalid value \"{}\" for {}, using default", raw, key));
                default
            }
        },
        Err(_) => default,
    }
}

fn flag(key: &str, default: bool, warnings: &mut Vec<String>) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                warnings.push(format!("Invalid value \"{}\" for {}, using {}", raw, key, default));
                default
            }
        },
        Err(_) => default,
    }
}
