//! Configuration model for the tribunal orchestrator.

use serde::{Deserialize, Serialize};

/// Top-level configuration, assembled by the figment loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub budget: BudgetConfig,
    pub stage: StageConfig,
    pub blob: BlobConfig,
    pub logging: LoggingConfig,
}

/// SQLite connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL, e.g. "sqlite:.tribunal/tribunal.db"
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:.tribunal/tribunal.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Budget ceilings for the paid pipeline stages.
///
/// Each option is independently overridable via the environment
/// (`TRIBUNAL_BUDGET__MAX_JUDGE_BUDGET_USD` and friends).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Ceiling for a single judge invocation, USD
    pub max_judge_budget_usd: f64,
    /// Ceiling for a single ingest/parse invocation, USD
    pub max_parse_budget_usd: f64,
    /// Heuristic model price, USD per million tokens
    pub cost_per_million_tokens: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_judge_budget_usd: 2.0,
            max_parse_budget_usd: 1.0,
            cost_per_million_tokens: 0.10,
        }
    }
}

/// Remote stage function endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Base URL of the remote judge/parser service
    pub base_url: String,
    /// Round-trip timeout in seconds
    pub timeout_secs: u64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Blob store settings for uploaded log artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Root directory for the local blob store
    pub root: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            root: ".tribunal/blobs".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of: trace, debug, info, warn, error
    pub level: String,
    /// One of: json, pretty
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
