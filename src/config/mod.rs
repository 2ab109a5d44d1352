//! Configuration loading and validation
//!
//! ## Responsibilities
//!
//! - Load the YAML config file
//! - Apply `FRP_*` environment overrides
//! - Validate recognition backend selection (exactly one)
//! - Resolve filesystem paths

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/config/config.yml";
pub const DEFAULT_DB_PATH: &str = "/config/platewatch.db";
pub const DEFAULT_SNAPSHOT_DIR: &str = "/plates";
pub const DEFAULT_METRICS_PORT: u16 = 8080;
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Objects accepted when no explicit object filter is configured
pub const DEFAULT_OBJECTS: &[&str] = &["car", "motorcycle", "bus"];

/// Configuration block for the Frigate integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrigateConfig {
    pub frigate_url: String,
    pub mqtt_server: String,

    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,

    #[serde(default)]
    pub mqtt_username: Option<String>,

    #[serde(default)]
    pub mqtt_password: Option<String>,

    #[serde(default = "default_main_topic")]
    pub main_topic: String,

    #[serde(default = "default_return_topic")]
    pub return_topic: Option<String>,

    /// Attribute-scoring feature: upstream events carry a scored
    /// license_plate attribute
    #[serde(default)]
    pub frigate_plus: bool,

    #[serde(default)]
    pub license_plate_min_score: f64,

    #[serde(default)]
    pub camera: Vec<String>,

    #[serde(default)]
    pub zones: Vec<String>,

    #[serde(default)]
    pub objects: Vec<String>,

    /// Minimum recognition confidence; fuzzy watch-list matches are exempt
    #[serde(default)]
    pub min_score: Option<f64>,

    #[serde(default)]
    pub save_snapshots: bool,

    #[serde(default)]
    pub draw_box: bool,

    #[serde(default)]
    pub always_save_snapshot: bool,

    /// Ordered watch-list; order is the fuzzy tie-break
    #[serde(default)]
    pub watched_plates: Vec<String>,

    /// Fuzzy-match ratio threshold in [0,1]; 0 disables the fuzzy tier
    #[serde(default)]
    pub fuzzy_match: f64,

    /// Maximum recognition attempts per event; 0 = unbounded
    #[serde(default)]
    pub max_attempts: u32,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_main_topic() -> String {
    "frigate".to_string()
}

fn default_return_topic() -> Option<String> {
    Some("plate_recognizer".to_string())
}

impl FrigateConfig {
    /// Valid object labels, falling back to the built-in default set
    pub fn valid_objects(&self) -> Vec<String> {
        if self.objects.is_empty() {
            DEFAULT_OBJECTS.iter().map(|s| s.to_string()).collect()
        } else {
            self.objects.clone()
        }
    }
}

/// Configuration for the Plate Recognizer API (Backend A)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateRecognizerConfig {
    pub token: String,

    #[serde(default)]
    pub regions: Vec<String>,

    #[serde(default)]
    pub api_url: Option<String>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

/// Configuration for the CodeProject.AI API (Backend B)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeProjectConfig {
    pub api_url: String,
}

/// Filesystem paths used by the application
#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub db_path: PathBuf,
    pub snapshot_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub frigate: FrigateConfig,

    #[serde(default)]
    pub plate_recognizer: Option<PlateRecognizerConfig>,

    #[serde(default)]
    pub code_project: Option<CodeProjectConfig>,

    #[serde(default = "default_logger_level")]
    pub logger_level: String,

    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(skip, default)]
    pub paths: PathsConfig,
}

fn default_logger_level() -> String {
    "INFO".to_string()
}

fn default_metrics_port() -> u16 {
    DEFAULT_METRICS_PORT
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

impl AppConfig {
    pub fn uses_plate_recognizer(&self) -> bool {
        self.plate_recognizer.is_some()
    }

    pub fn uses_code_project(&self) -> bool {
        self.code_project.is_some()
    }

    /// Backend selection is a deployment-time capability choice; exactly one
    /// of the two recognition backends must be configured.
    pub fn validate(&self) -> Result<()> {
        match (&self.plate_recognizer, &self.code_project) {
            (None, None) => Err(Error::Config(
                "Configure either plate_recognizer or code_project".to_string(),
            )),
            (Some(_), Some(_)) => Err(Error::Config(
                "plate_recognizer and code_project are mutually exclusive; configure one"
                    .to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Parse a comma separated env value into a list, dropping empty items
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Apply `FRP_*` environment overrides on top of the file config
pub fn apply_env_overrides(config: &mut AppConfig, env: &HashMap<String, String>) -> Result<()> {
    let get = |key: &str| env.get(key).filter(|v| !v.is_empty());

    if let Some(v) = get("FRP_FRIGATE_URL") {
        config.frigate.frigate_url = v.clone();
    }
    if let Some(v) = get("FRP_MQTT_SERVER") {
        config.frigate.mqtt_server = v.clone();
    }
    if let Some(v) = get("FRP_MQTT_PORT") {
        config.frigate.mqtt_port = v
            .parse()
            .map_err(|_| Error::Config(format!("FRP_MQTT_PORT is not a port: {v}")))?;
    }
    if let Some(v) = get("FRP_MQTT_USERNAME") {
        config.frigate.mqtt_username = Some(v.clone());
    }
    if let Some(v) = get("FRP_MQTT_PASSWORD") {
        config.frigate.mqtt_password = Some(v.clone());
    }
    if let Some(v) = get("FRP_MAIN_TOPIC") {
        config.frigate.main_topic = v.clone();
    }
    if let Some(v) = get("FRP_RETURN_TOPIC") {
        config.frigate.return_topic = Some(v.clone());
    }
    if let Some(v) = get("FRP_FRIGATE_PLUS") {
        config.frigate.frigate_plus = parse_bool(v)
            .ok_or_else(|| Error::Config(format!("FRP_FRIGATE_PLUS is not a boolean: {v}")))?;
    }
    if let Some(v) = get("FRP_MIN_SCORE") {
        config.frigate.min_score = Some(
            v.parse()
                .map_err(|_| Error::Config(format!("FRP_MIN_SCORE is not a number: {v}")))?,
        );
    }
    if let Some(v) = get("FRP_LICENSE_PLATE_MIN_SCORE") {
        config.frigate.license_plate_min_score = v.parse().map_err(|_| {
            Error::Config(format!("FRP_LICENSE_PLATE_MIN_SCORE is not a number: {v}"))
        })?;
    }
    if let Some(v) = get("FRP_FUZZY_MATCH") {
        config.frigate.fuzzy_match = v
            .parse()
            .map_err(|_| Error::Config(format!("FRP_FUZZY_MATCH is not a number: {v}")))?;
    }
    if let Some(v) = get("FRP_MAX_ATTEMPTS") {
        config.frigate.max_attempts = v
            .parse()
            .map_err(|_| Error::Config(format!("FRP_MAX_ATTEMPTS is not an integer: {v}")))?;
    }
    if let Some(v) = get("FRP_CAMERA") {
        config.frigate.camera = parse_list(v);
    }
    if let Some(v) = get("FRP_ZONES") {
        config.frigate.zones = parse_list(v);
    }
    if let Some(v) = get("FRP_OBJECTS") {
        config.frigate.objects = parse_list(v);
    }
    if let Some(v) = get("FRP_WATCHED_PLATES") {
        config.frigate.watched_plates = parse_list(v);
    }
    if let Some(v) = get("FRP_LOG_LEVEL") {
        config.logger_level = v.clone();
    }
    if let Some(v) = get("FRP_METRICS_PORT") {
        config.metrics_port = v
            .parse()
            .map_err(|_| Error::Config(format!("FRP_METRICS_PORT is not a port: {v}")))?;
    }
    if let Some(v) = get("FRP_MAX_WORKERS") {
        config.max_workers = v
            .parse()
            .map_err(|_| Error::Config(format!("FRP_MAX_WORKERS is not an integer: {v}")))?;
    }
    if let Some(v) = get("FRP_PLATE_RECOGNIZER_TOKEN") {
        if let Some(ref mut pr) = config.plate_recognizer {
            pr.token = v.clone();
        }
    }
    if let Some(v) = get("FRP_PLATE_RECOGNIZER_API_URL") {
        if let Some(ref mut pr) = config.plate_recognizer {
            pr.api_url = Some(v.clone());
        }
    }
    if let Some(v) = get("FRP_PLATE_RECOGNIZER_REGIONS") {
        if let Some(ref mut pr) = config.plate_recognizer {
            pr.regions = parse_list(v);
        }
    }
    if let Some(v) = get("FRP_CODE_PROJECT_API_URL") {
        if let Some(ref mut cp) = config.code_project {
            cp.api_url = v.clone();
        }
    }
    if let Some(v) = get("FRP_DB_PATH") {
        config.paths.db_path = PathBuf::from(v);
    }
    if let Some(v) = get("FRP_SNAPSHOT_DIR") {
        config.paths.snapshot_dir = PathBuf::from(v);
    }

    Ok(())
}

/// Parse an AppConfig from YAML text
pub fn parse_config(raw: &str) -> Result<AppConfig> {
    serde_yaml::from_str(raw).map_err(|e| Error::Config(format!("Invalid configuration: {e}")))
}

/// Load, override, and validate the application configuration
pub fn load_app_config(config_path: Option<&Path>) -> Result<AppConfig> {
    let env: HashMap<String, String> = std::env::vars().collect();

    let resolved_path = env
        .get("FRP_CONFIG_PATH")
        .map(PathBuf::from)
        .or_else(|| config_path.map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let raw = std::fs::read_to_string(&resolved_path).map_err(|e| {
        Error::Config(format!(
            "Configuration file not found at {}: {e}. Set FRP_CONFIG_PATH or create the file.",
            resolved_path.display()
        ))
    })?;

    let mut config = parse_config(&raw)?;
    apply_env_overrides(&mut config, &env)?;
    config.validate()?;

    tracing::debug!(path = %resolved_path.display(), "Configuration loaded");
    Ok(config)
}
