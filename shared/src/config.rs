use aws_sdk_appconfig as app_cfg;
use aws_sdk_s3 as s3;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_SOURCE_PREFIX: &str = "source_image/";
pub const DEFAULT_OUTPUT_PREFIX: &str = "processed_image";
pub const DEFAULT_TARGET_WIDTHS: [u32; 4] = [200, 300, 500, 1000];
pub const DEFAULT_JPEG_QUALITY: u8 = 70;
pub const DEFAULT_SUPPORTED_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("AppConfig error: {0}")]
    AppConfig(String),

    #[error("failed to parse configuration document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Only keys under this prefix are processed.
    pub source_prefix: String,

    /// Top-level folder derivatives are written under.
    pub output_prefix: String,

    /// Widths to render, processed in ascending order.
    pub target_widths: Vec<u32>,

    pub jpeg_quality: u8,

    /// Lowercased, with leading dot.
    pub supported_extensions: Vec<String>,

    /// Parent of the per-invocation scratch directory. Falls back to the system temp dir.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_prefix: DEFAULT_SOURCE_PREFIX.to_string(),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            target_widths: DEFAULT_TARGET_WIDTHS.to_vec(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            supported_extensions: DEFAULT_SUPPORTED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            scratch_dir: None,
        }
    }
}

impl Config {
    /// Sorts and dedups the widths, clamps the quality, canonicalizes extensions
    /// and strips trailing slashes from the output prefix.
    pub fn normalized(mut self) -> Self {
        self.target_widths.retain(|w| *w > 0);
        self.target_widths.sort_unstable();
        self.target_widths.dedup();
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        self.output_prefix = self.output_prefix.trim_end_matches('/').to_string();
        self.supported_extensions = self
            .supported_extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .filter(|ext| ext.len() > 1)
            .collect();

        self
    }

    pub fn is_supported(&self, extension: &str) -> bool {
        self.supported_extensions.iter().any(|ext| ext == extension)
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(prefix) = lookup("SOURCE_PREFIX") {
            self.source_prefix = prefix;
        }
        if let Some(prefix) = lookup("OUTPUT_PREFIX") {
            self.output_prefix = prefix;
        }
        if let Some(raw) = lookup("TARGET_WIDTHS") {
            self.target_widths = split_list(&raw)
                .map(|w| {
                    w.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                        name: "TARGET_WIDTHS",
                        value: raw.clone(),
                    })
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(raw) = lookup("JPEG_QUALITY") {
            self.jpeg_quality = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "JPEG_QUALITY",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup("SUPPORTED_EXTENSIONS") {
            self.supported_extensions = split_list(&raw).map(str::to_string).collect();
        }
        if let Some(dir) = lookup("SCRATCH_DIR") {
            self.scratch_dir = Some(PathBuf::from(dir));
        }

        Ok(self.normalized())
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

pub async fn get_s3_client() -> s3::Client {
    let cfg = aws_config::load_from_env().await;

    s3::Client::new(&cfg)
}

/// Loads the service configuration: defaults, then the AppConfig document when
/// `APP_CONFIGURATION` is set, then environment overrides.
pub async fn get_service_cfg(app_client: &str) -> Result<Config, ConfigError> {
    let config = match env::var("APP_CONFIGURATION") {
        Ok(configuration) => fetch_app_config(app_client, &configuration).await?,
        Err(_) => Config::default(),
    };
    let config = config.apply_overrides(|name| env::var(name).ok())?;

    tracing::event!(tracing::Level::DEBUG, "{:?}", config);

    Ok(config)
}

#[allow(deprecated)]
async fn fetch_app_config(app_client: &str, configuration: &str) -> Result<Config, ConfigError> {
    let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string());
    let config = aws_config::load_from_env().await;
    let client = app_cfg::Client::new(&config);

    let res = client
        .get_configuration()
        .client_id(app_client)
        .environment(&environment)
        .application("image-derivatives")
        .configuration(configuration)
        .send()
        .await
        .map_err(|e| ConfigError::AppConfig(e.into_service_error().to_string()))?;

    match res.content() {
        Some(content) if !content.as_ref().is_empty() => {
            Ok(serde_json::from_slice(content.as_ref())?)
        }
        _ => Ok(Config::default()),
    }
}
