//! Filter-and-aggregate core of the deals / tickets / companies dashboard.
//!
//! Load a dataset ([`loader`]), restrict it with a [`filter_spec::FilterSpec`]
//! ([`filter::apply_filters`]), then derive KPIs ([`metrics`]), chart aggregates
//! ([`aggregate`]) and a rule-based recommendation for one record ([`recommend`]).
//! [`dashboards`] wires the three datasets together for a presentation layer.

pub mod aggregate;
pub mod config;
pub mod dashboards;
pub mod error;
pub mod filter;
pub mod filter_spec;
pub mod loader;
pub mod metrics;
pub mod observability;
pub mod recommend;
pub mod rules;
pub mod schema;
pub mod table;

pub use aggregate::{AggregateOp, AggregateTable, GroupOrder, Histogram};
pub use config::DashboardConfig;
pub use dashboards::{Dashboard, DashboardView};
pub use error::{DashboardError, Result};
pub use filter::apply_filters;
pub use filter_spec::{Constraint, FilterSpec, RangeBounds};
pub use loader::{Dataset, TableStore};
pub use metrics::{compute_metrics, MetricKind, MetricSpec, Metrics};
pub use recommend::{recommend, Advice, Recommendation, RecordKey};
pub use rules::{Condition, RuleLadder};
pub use table::{CellValue, Record, Table};
