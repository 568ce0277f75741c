use crate::error::Result;
use crate::loader::Dataset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the datasets live and how pipeline runs are logged.
///
/// Resolution order: defaults, then an optional JSON file, then `DASHBOARD_*` environment
/// variables (a `.env` file is honoured by the binary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_dir: PathBuf,
    pub deals_file: String,
    pub tickets_file: String,
    pub companies_file: String,
    /// Rows scanned by the CSV reader to infer column types.
    pub infer_schema_rows: usize,
    /// JSON-lines file receiving one entry per dashboard evaluation.
    pub pipeline_log: Option<PathBuf>,
    pub max_in_memory_logs: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            deals_file: "deals.csv".to_string(),
            tickets_file: "tickets.csv".to_string(),
            companies_file: "companies.csv".to_string(),
            infer_schema_rows: 1000,
            pipeline_log: None,
            max_in_memory_logs: 1000,
        }
    }
}

impl DashboardConfig {
    /// Load from a JSON file; missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("DASHBOARD_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup("DASHBOARD_DEALS_FILE") {
            self.deals_file = file;
        }
        if let Some(file) = lookup("DASHBOARD_TICKETS_FILE") {
            self.tickets_file = file;
        }
        if let Some(file) = lookup("DASHBOARD_COMPANIES_FILE") {
            self.companies_file = file;
        }
        if let Some(rows) = lookup("DASHBOARD_INFER_SCHEMA_ROWS").and_then(|v| v.parse().ok()) {
            self.infer_schema_rows = rows;
        }
        if let Some(log) = lookup("DASHBOARD_PIPELINE_LOG") {
            self.pipeline_log = Some(PathBuf::from(log));
        }
        self
    }

    pub fn path_for(&self, dataset: Dataset) -> PathBuf {
        let file = match dataset {
            Dataset::Deals => &self.deals_file,
            Dataset::Tickets => &self.tickets_file,
            Dataset::Companies => &self.companies_file,
        };
        self.data_dir.join(file)
    }
}
