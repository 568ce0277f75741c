//! Pipeline run logger
//!
//! Structured record of every dashboard evaluation: which dataset, how many constraints, how
//! many rows survived, and how long it took.

use crate::error::{DashboardError, Result};
use crate::loader::Dataset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRunLog {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub dataset: Dataset,
    pub constraints: usize,
    pub rows_in: usize,
    pub rows_out: usize,
    pub execution_time_ms: u64,
    pub error_message: Option<String>,
}

impl PipelineRunLog {
    pub fn new(dataset: Dataset, constraints: usize, rows_in: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            dataset,
            constraints,
            rows_in,
            rows_out: 0,
            execution_time_ms: 0,
            error_message: None,
        }
    }
}

/// Keeps the most recent runs in memory and optionally appends them to a JSON-lines file.
#[derive(Clone)]
pub struct PipelineLogger {
    log_file: Option<PathBuf>,
    runs: Arc<Mutex<VecDeque<PipelineRunLog>>>,
    max_in_memory_logs: usize,
}

impl PipelineLogger {
    pub fn new(log_file: Option<PathBuf>, max_in_memory_logs: usize) -> Self {
        Self {
            log_file,
            runs: Arc::new(Mutex::new(VecDeque::new())),
            max_in_memory_logs,
        }
    }

    pub fn log_run(&self, entry: PipelineRunLog) -> Result<()> {
        {
            let mut runs = self.lock()?;
            runs.push_back(entry.clone());
            while runs.len() > self.max_in_memory_logs {
                runs.pop_front();
            }
        }

        if let Some(ref log_file) = self.log_file {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;
            let json = serde_json::to_string(&entry)?;
            writeln!(file, "{}", json)?;
        }

        Ok(())
    }

    /// Most recent runs first.
    pub fn recent_runs(&self, limit: usize) -> Vec<PipelineRunLog> {
        match self.lock() {
            Ok(runs) => runs.iter().rev().take(limit).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn runs_per_dataset(&self) -> HashMap<Dataset, u64> {
        let mut stats = HashMap::new();
        if let Ok(runs) = self.lock() {
            for run in runs.iter() {
                *stats.entry(run.dataset).or_insert(0) += 1;
            }
        }
        stats
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<PipelineRunLog>>> {
        self.runs
            .lock()
            .map_err(|_| DashboardError::Load("pipeline log lock poisoned".to_string()))
    }
}

impl Default for PipelineLogger {
    fn default() -> Self {
        Self::new(None, 1000)
    }
}
