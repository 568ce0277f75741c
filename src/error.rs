use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    /// Schema mismatch between a specification and a table, or a structurally invalid spec.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The selected record is not part of the (filtered) table.
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Load error: {0}")]
    Load(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl DashboardError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DashboardError::NotFound(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, DashboardError::Configuration(_))
    }
}

impl From<polars::error::PolarsError> for DashboardError {
    fn from(err: polars::error::PolarsError) -> Self {
        DashboardError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
