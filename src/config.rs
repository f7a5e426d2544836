//! Configuration parsing and validation.
//!
//! Car Scout is configured through a TOML file (default
//! `./config/scout.toml`). Every section except `[db]` has defaults.
//!
//! ```toml
//! [db]
//! path = "./data/cars.sqlite"
//!
//! [search]
//! default_query = "new sports cars 2024 2025"
//! price_tolerance = 5000.0
//! group_limit = 3
//! include_self_matches = false
//! default_source = "web-search"
//!
//! [source]
//! provider = "openai"        # openai | file | disabled
//! model = "gpt-4-turbo-preview"
//! count = 10
//!
//! [server]
//! bind = "127.0.0.1:3000"
//! ```
//!
//! The OpenAI API key is not part of the file; it is read from
//! `OPENAI_API_KEY` when the OpenAI source is constructed.

use anyhow::{Context, Result};
use car_scout_core::grouping::GroupingParams;
use car_scout_core::pipeline::CycleSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_query")]
    pub default_query: String,
    #[serde(default = "default_price_tolerance")]
    pub price_tolerance: f64,
    #[serde(default = "default_group_limit")]
    pub group_limit: usize,
    #[serde(default)]
    pub include_self_matches: bool,
    #[serde(default = "default_cycle_source")]
    pub default_source: String,
    /// `source` recorded for single-record admissions that name none.
    #[serde(default = "default_manual_source")]
    pub manual_source: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_query: default_query(),
            price_tolerance: default_price_tolerance(),
            group_limit: default_group_limit(),
            include_self_matches: false,
            default_source: default_cycle_source(),
            manual_source: default_manual_source(),
        }
    }
}

fn default_query() -> String {
    "new sports cars 2024 2025".to_string()
}
fn default_price_tolerance() -> f64 {
    5000.0
}
fn default_group_limit() -> usize {
    3
}
fn default_cycle_source() -> String {
    "web-search".to_string()
}
fn default_manual_source() -> String {
    "manual".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Number of listings to ask the model for.
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Response file for `provider = "file"`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_base: default_api_base(),
            count: default_count(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            path: None,
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4-turbo-preview".to_string()
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_count() -> usize {
    10
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Config {
    /// Cycle settings derived from `[search]`, with an optional tolerance
    /// override for a single run.
    pub fn cycle_settings(&self, tolerance: Option<f64>) -> CycleSettings {
        CycleSettings {
            grouping: GroupingParams {
                tolerance: tolerance.unwrap_or(self.search.price_tolerance),
                limit: self.search.group_limit,
                include_self: self.search.include_self_matches,
            },
            default_source: self.search.default_source.clone(),
        }
    }
}

/// Check a price tolerance supplied in config or on the command line.
pub fn validate_tolerance(tolerance: f64) -> Result<()> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        anyhow::bail!("price tolerance must be a finite number >= 0, got {}", tolerance);
    }
    Ok(())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    validate_tolerance(config.search.price_tolerance)
        .context("search.price_tolerance is invalid")?;

    if config.search.group_limit < 1 {
        anyhow::bail!("search.group_limit must be >= 1");
    }

    if config.search.default_query.trim().is_empty() {
        anyhow::bail!("search.default_query must not be empty");
    }

    if config.source.count < 1 {
        anyhow::bail!("source.count must be >= 1");
    }

    match config.source.provider.as_str() {
        "openai" | "disabled" => {}
        "file" => {
            if config.source.path.is_none() {
                anyhow::bail!("source.path must be set when provider is 'file'");
            }
        }
        other => anyhow::bail!(
            "Unknown source provider: '{}'. Must be openai, file, or disabled.",
            other
        ),
    }

    Ok(())
}
