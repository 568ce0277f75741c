//! Dataset loading
//!
//! [`TableStore`] memoizes one [`Table`] per [`Dataset`]: the first access reads the CSV file,
//! later accesses hand out cheap clones of the same immutable table.

use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};
use crate::table::Table;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Deals,
    Tickets,
    Companies,
}

impl Dataset {
    pub const ALL: [Dataset; 3] = [Dataset::Deals, Dataset::Tickets, Dataset::Companies];

    pub fn name(&self) -> &'static str {
        match self {
            Dataset::Deals => "Deals",
            Dataset::Tickets => "Tickets",
            Dataset::Companies => "Companies",
        }
    }

    /// Column identifying a record; companies are selected by row index instead.
    pub fn id_column(&self) -> Option<&'static str> {
        match self {
            Dataset::Deals => Some("Record ID"),
            Dataset::Tickets => Some("Ticket ID"),
            Dataset::Companies => None,
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Dataset {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "deals" => Ok(Dataset::Deals),
            "tickets" => Ok(Dataset::Tickets),
            "companies" => Ok(Dataset::Companies),
            other => Err(DashboardError::Configuration(format!(
                "unknown dataset '{}' (expected deals, tickets or companies)",
                other
            ))),
        }
    }
}

/// Read a CSV file into a table.
pub fn load_csv(path: &Path, infer_schema_rows: usize) -> Result<Table> {
    if !path.exists() {
        return Err(DashboardError::Load(format!(
            "dataset file not found: {}",
            path.display()
        )));
    }

    let frame = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(infer_schema_rows))
        .finish()
        .map_err(|e| DashboardError::Load(format!("Failed to scan CSV {}: {}", path.display(), e)))?
        .collect()
        .map_err(|e| {
            DashboardError::Load(format!("Failed to collect CSV {}: {}", path.display(), e))
        })?;

    Table::new(frame)
}

/// Process-lifetime cache of loaded datasets.
pub struct TableStore {
    config: DashboardConfig,
    tables: Mutex<HashMap<Dataset, Table>>,
    loads: AtomicUsize,
}

impl TableStore {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            tables: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    /// The loaded table for `dataset`, reading it on first access.
    pub fn get(&self, dataset: Dataset) -> Result<Table> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| DashboardError::Load("table cache lock poisoned".to_string()))?;

        if let Some(table) = tables.get(&dataset) {
            debug!("Serving cached {} table", dataset);
            return Ok(table.clone());
        }

        let path = self.config.path_for(dataset);
        info!("Loading {} from {}", dataset, path.display());
        let table = load_csv(&path, self.config.infer_schema_rows)?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        info!(
            "Loaded {}: {} rows, {} columns",
            dataset,
            table.height(),
            table.width()
        );

        tables.insert(dataset, table.clone());
        Ok(table)
    }

    /// Seed the cache with an already built table.
    pub fn insert(&self, dataset: Dataset, table: Table) -> Result<()> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| DashboardError::Load("table cache lock poisoned".to_string()))?;
        tables.insert(dataset, table);
        Ok(())
    }

    pub fn is_loaded(&self, dataset: Dataset) -> bool {
        self.tables
            .lock()
            .map(|tables| tables.contains_key(&dataset))
            .unwrap_or(false)
    }

    /// Number of file reads performed so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}
