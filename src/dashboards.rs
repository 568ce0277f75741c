//! Dataset dashboards
//!
//! Per-dataset filter panels and the view a presentation layer renders: KPIs, chart
//! aggregates, histograms and the filtered table records are selected from.

use crate::aggregate::{
    compute_aggregate, flag_totals, histogram, AggregateOp, AggregateTable, GroupOrder,
    Histogram,
};
use crate::config::DashboardConfig;
use crate::error::Result;
use crate::filter::apply_filters;
use crate::filter_spec::{Constraint, FilterSpec};
use crate::loader::{Dataset, TableStore};
use crate::metrics::{
    column_bounds, compute_metrics, distinct_values, with_flag_count, MetricFormat, MetricSpec,
};
use crate::observability::{PipelineLogger, PipelineRunLog};
use crate::recommend::{self, Recommendation, RecordKey};
use crate::schema::{companies, deals, tickets};
use crate::table::{CellValue, Table};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Shape of a loaded table, for the overview tab.
#[derive(Debug, Clone)]
pub struct Overview {
    pub rows: usize,
    pub columns: usize,
    pub head: Table,
}

pub fn overview(table: &Table, head_rows: usize) -> Overview {
    Overview {
        rows: table.height(),
        columns: table.width(),
        head: table.head(head_rows),
    }
}

/// The filter panel of `dataset` with every option selected and ranges spanning the data.
pub fn default_filters(dataset: Dataset, table: &Table) -> Result<FilterSpec> {
    let mut spec = FilterSpec::new();
    match dataset {
        Dataset::Deals => {
            for column in [
                deals::DEAL_SCORE,
                deals::DEAL_PROBABILITY,
                deals::DAYS_TO_CLOSE,
                deals::AMOUNT,
                deals::WEIGHTED_AMOUNT,
            ] {
                push_observed_range(&mut spec, table, column)?;
            }
            spec.push(Constraint::Include {
                column: deals::DEAL_STAGE.to_string(),
                allowed: distinct_values(table, deals::DEAL_STAGE, false)?,
            });
            spec = spec
                .any_flag(deals::FORECAST_CATEGORIES)
                .any_flag(deals::DEAL_TYPES);
        }
        Dataset::Tickets => {
            for column in [
                tickets::RESPONSE_TIME_HOURS,
                tickets::IMPLEMENTATION_DAYS,
                tickets::TRAINING_COMPLETIONS,
            ] {
                push_observed_range(&mut spec, table, column)?;
            }
            spec.push(Constraint::Include {
                column: tickets::STATUS.to_string(),
                allowed: distinct_values(table, tickets::STATUS, false)?,
            });
            for column in [tickets::CREATE_YEAR, tickets::CREATE_MONTH] {
                spec.push(Constraint::Include {
                    column: column.to_string(),
                    allowed: distinct_values(table, column, true)?,
                });
            }
        }
        Dataset::Companies => {
            spec.push(Constraint::Include {
                column: companies::CREATE_YEAR.to_string(),
                allowed: distinct_values(table, companies::CREATE_YEAR, true)?,
            });
            for prefix in [
                companies::TYPE_PREFIX,
                companies::PRIMARY_INDUSTRY_PREFIX,
                companies::COUNTRY_PREFIX,
            ] {
                spec = spec.any_flag(table.columns_with_prefix(prefix));
            }
        }
    }
    Ok(spec)
}

fn push_observed_range(spec: &mut FilterSpec, table: &Table, column: &str) -> Result<()> {
    match column_bounds(table, column)? {
        Some(bounds) => spec.push(Constraint::Range {
            column: column.to_string(),
            bounds,
        }),
        None => warn!("Column '{}' has no numeric values, no range filter", column),
    }
    Ok(())
}

/// Clamp the ranges of a user-supplied `spec` into the bounds observed in `table`, the way a
/// slider cannot go past the data. Ranges that miss the data entirely are kept as they are.
pub fn clamp_ranges(table: &Table, spec: &FilterSpec) -> Result<FilterSpec> {
    let mut clamped = FilterSpec::new();
    for constraint in &spec.constraints {
        let constraint = match constraint {
            Constraint::Range { column, bounds } => {
                table.require_numeric(column)?;
                bounds.validate(column)?;
                let adjusted = column_bounds(table, column)?
                    .and_then(|observed| bounds.clamp_to(observed))
                    .unwrap_or(*bounds);
                if adjusted != *bounds {
                    warn!(
                        "Range on '{}' clamped from [{}, {}] to [{}, {}]",
                        column, bounds.min, bounds.max, adjusted.min, adjusted.max
                    );
                }
                Constraint::Range {
                    column: column.clone(),
                    bounds: adjusted,
                }
            }
            other => other.clone(),
        };
        clamped.push(constraint);
    }
    Ok(clamped)
}

/// Checkbox gates of a dataset panel as (label, flag column). Unchecked by default.
pub fn checkboxes(dataset: Dataset) -> &'static [(&'static str, &'static str)] {
    match dataset {
        Dataset::Deals => &[],
        Dataset::Tickets => &[
            ("Has Onboarding Requirement", tickets::REQUIRES_ONBOARDING),
            ("Has Coaching Requirement", tickets::REQUIRES_COACHING),
            ("Has Assessment Requirement", tickets::REQUIRES_ASSESSMENT),
        ],
        Dataset::Companies => &[
            (
                "Only show companies with Form Submission YN = Yes",
                companies::FORM_SUBMISSION,
            ),
            (
                "Only show companies with Close YN = Yes",
                companies::CLOSE,
            ),
        ],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub name: String,
    pub value: Option<f64>,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedAggregate {
    pub title: String,
    pub table: AggregateTable,
}

/// Everything a presentation layer needs to render one dataset dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub dataset: Dataset,
    pub total_rows: usize,
    pub filtered_rows: usize,
    pub kpis: Vec<Kpi>,
    pub aggregates: Vec<NamedAggregate>,
    pub histograms: Vec<Histogram>,
    /// Filtered rows (with derived columns); records are selected from here.
    #[serde(skip)]
    pub filtered: Table,
    /// Inputs of the scatter chart.
    #[serde(skip)]
    pub scatter: Option<Table>,
}

impl DashboardView {
    /// Zero rows matched; not an error, the presentation shows a neutral message.
    pub fn is_empty(&self) -> bool {
        self.filtered_rows == 0
    }

    pub fn kpi(&self, name: &str) -> Option<&Kpi> {
        self.kpis.iter().find(|kpi| kpi.name == name)
    }

    pub fn aggregate(&self, title: &str) -> Option<&AggregateTable> {
        self.aggregates
            .iter()
            .find(|named| named.title == title)
            .map(|named| &named.table)
    }

    pub fn histogram(&self, column: &str) -> Option<&Histogram> {
        self.histograms.iter().find(|h| h.column == column)
    }

    /// Records the user can pick from, in table order.
    pub fn selectable_records(&self) -> Result<Vec<RecordKey>> {
        match self.dataset.id_column() {
            Some(column) => Ok(distinct_values(&self.filtered, column, false)?
                .into_iter()
                .map(|value| RecordKey::id(column, value))
                .collect()),
            None => Ok(self
                .filtered
                .numeric_values(crate::table::ROW_INDEX_COLUMN)?
                .into_iter()
                .flatten()
                .map(|index| RecordKey::Row(index as usize))
                .collect()),
        }
    }

    pub fn recommend(&self, key: &RecordKey) -> Result<Recommendation> {
        recommend::recommend(self.dataset, &self.filtered, key)
    }
}

fn kpis(table: &Table, panel: &[(MetricSpec, MetricFormat)]) -> Result<Vec<Kpi>> {
    let specs: Vec<MetricSpec> = panel.iter().map(|(spec, _)| spec.clone()).collect();
    let metrics = compute_metrics(table, &specs)?;
    Ok(metrics
        .iter()
        .zip(panel)
        .map(|(metric, (_, format))| Kpi {
            name: metric.name.clone(),
            value: metric.value,
            display: format.render(metric.value),
        })
        .collect())
}

/// Columns of the multiselect flag group over `prefix` in `spec`, or all of them when the
/// panel does not restrict that group.
fn selected_flags(spec: &FilterSpec, table: &Table, prefix: &str) -> Vec<String> {
    spec.constraints
        .iter()
        .find_map(|constraint| match constraint {
            Constraint::AnyFlag { columns }
                if !columns.is_empty() && columns.iter().all(|c| c.starts_with(prefix)) =>
            {
                Some(columns.clone())
            }
            _ => None,
        })
        .unwrap_or_else(|| table.columns_with_prefix(prefix))
}

/// Run the filter pipeline of `dataset` and assemble its view.
pub fn evaluate(dataset: Dataset, table: &Table, spec: &FilterSpec) -> Result<DashboardView> {
    let filtered = apply_filters(table, spec)?;
    let mut view = DashboardView {
        dataset,
        total_rows: table.height(),
        filtered_rows: filtered.height(),
        kpis: Vec::new(),
        aggregates: Vec::new(),
        histograms: Vec::new(),
        filtered: filtered.clone(),
        scatter: None,
    };

    match dataset {
        Dataset::Deals => {
            view.kpis = kpis(
                &filtered,
                &[
                    (
                        MetricSpec::sum("Total Revenue", deals::AMOUNT),
                        MetricFormat::Currency,
                    ),
                    (
                        MetricSpec::mean("Avg Deal Score", deals::DEAL_SCORE),
                        MetricFormat::Decimal(2),
                    ),
                    (
                        MetricSpec::mean("Avg Days to Close", deals::DAYS_TO_CLOSE),
                        MetricFormat::Decimal(1),
                    ),
                ],
            )?;
            view.aggregates.push(NamedAggregate {
                title: "Revenue by Deal Stage".to_string(),
                table: compute_aggregate(
                    &filtered,
                    &[deals::DEAL_STAGE],
                    &AggregateOp::Sum(deals::AMOUNT.to_string()),
                    GroupOrder::all_descending(),
                )?,
            });
            view.histograms
                .push(histogram(&filtered, deals::DAYS_TO_CLOSE, 30)?);
            view.scatter = Some(filtered.project(&[
                deals::DEAL_SCORE,
                deals::DEAL_PROBABILITY,
                deals::AMOUNT,
                deals::RECORD_ID,
                deals::DAYS_TO_CLOSE,
            ])?);
        }
        Dataset::Tickets => {
            view.kpis = kpis(
                &filtered,
                &[
                    (
                        MetricSpec::distinct_count("Total Tickets", tickets::TICKET_ID),
                        MetricFormat::Integer,
                    ),
                    (
                        MetricSpec::mean("Avg Response Time (hrs)", tickets::RESPONSE_TIME_HOURS),
                        MetricFormat::Decimal(2),
                    ),
                    (
                        MetricSpec::mean(
                            "Avg Implementation Duration (days)",
                            tickets::IMPLEMENTATION_DAYS,
                        ),
                        MetricFormat::Decimal(1),
                    ),
                ],
            )?;
            view.aggregates.push(NamedAggregate {
                title: "Ticket Status Distribution".to_string(),
                table: compute_aggregate(
                    &filtered,
                    &[tickets::STATUS],
                    &AggregateOp::Count,
                    GroupOrder::all_descending(),
                )?,
            });
            view.aggregates.push(NamedAggregate {
                title: "Ticket Creation Trends".to_string(),
                table: compute_aggregate(
                    &filtered,
                    &[tickets::CREATE_YEAR, tickets::CREATE_MONTH],
                    &AggregateOp::Count,
                    GroupOrder::Natural,
                )?,
            });
            view.scatter = Some(filtered.project(&[
                tickets::RESPONSE_TIME_HOURS,
                tickets::IMPLEMENTATION_DAYS,
                tickets::TRAINING_COMPLETIONS,
                tickets::TICKET_ID,
                tickets::STATUS,
            ])?);
        }
        Dataset::Companies => {
            let web_technologies = filtered.columns_with_prefix(companies::WEB_TECHNOLOGY_PREFIX);
            let enriched = with_flag_count(&filtered, &web_technologies, companies::TECH_COUNT)?;

            view.kpis = kpis(
                &enriched,
                &[
                    (MetricSpec::count("Total Companies"), MetricFormat::Integer),
                    (
                        MetricSpec::flag_count(
                            "Companies with Form Submission",
                            companies::FORM_SUBMISSION,
                        ),
                        MetricFormat::Integer,
                    ),
                    (
                        MetricSpec::flag_count("Companies with Close", companies::CLOSE),
                        MetricFormat::Integer,
                    ),
                ],
            )?;
            let types = selected_flags(spec, table, companies::TYPE_PREFIX);
            view.aggregates.push(NamedAggregate {
                title: "Company Type Distribution".to_string(),
                table: flag_totals(&enriched, "Type", &types, GroupOrder::all_descending())?,
            });
            let industries = selected_flags(spec, table, companies::PRIMARY_INDUSTRY_PREFIX);
            view.aggregates.push(NamedAggregate {
                title: "Top Primary Industries".to_string(),
                table: flag_totals(&enriched, "Primary Industry", &industries, GroupOrder::top(10))?,
            });
            view.aggregates.push(NamedAggregate {
                title: "Companies by Creation Year".to_string(),
                table: compute_aggregate(
                    &enriched,
                    &[companies::CREATE_YEAR],
                    &AggregateOp::Count,
                    GroupOrder::all_descending(),
                )?,
            });
            view.histograms
                .push(histogram(&enriched, companies::TECH_COUNT, 20)?);
            view.filtered = enriched;
        }
    }

    Ok(view)
}

/// Loaded datasets plus the run log: the stateful entry point of the dashboard.
pub struct Dashboard {
    store: TableStore,
    logger: PipelineLogger,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        let logger = PipelineLogger::new(config.pipeline_log.clone(), config.max_in_memory_logs);
        Self {
            store: TableStore::new(config),
            logger,
        }
    }

    pub fn with_store(store: TableStore, logger: PipelineLogger) -> Self {
        Self { store, logger }
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    pub fn logger(&self) -> &PipelineLogger {
        &self.logger
    }

    pub fn table(&self, dataset: Dataset) -> Result<Table> {
        self.store.get(dataset)
    }

    pub fn overview(&self, dataset: Dataset, head_rows: usize) -> Result<Overview> {
        Ok(overview(&self.store.get(dataset)?, head_rows))
    }

    pub fn default_filters(&self, dataset: Dataset) -> Result<FilterSpec> {
        default_filters(dataset, &self.store.get(dataset)?)
    }

    /// `spec` with its ranges clamped into the loaded data, for specs read from a file.
    pub fn clamp_filters(&self, dataset: Dataset, spec: &FilterSpec) -> Result<FilterSpec> {
        clamp_ranges(&self.store.get(dataset)?, spec)
    }

    /// Evaluate `spec` against the cached dataset and record the run.
    pub fn evaluate(&self, dataset: Dataset, spec: &FilterSpec) -> Result<DashboardView> {
        let table = self.store.get(dataset)?;
        let started = Instant::now();
        let result = evaluate(dataset, &table, spec);

        let mut run = PipelineRunLog::new(dataset, spec.len(), table.height());
        run.execution_time_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(view) => {
                run.rows_out = view.filtered_rows;
                info!(
                    "{} dashboard: {} of {} rows match {} constraints",
                    dataset,
                    view.filtered_rows,
                    view.total_rows,
                    spec.len()
                );
            }
            Err(e) => {
                warn!("{} dashboard evaluation failed: {}", dataset, e);
                run.error_message = Some(e.to_string());
            }
        }
        if let Err(e) = self.logger.log_run(run) {
            warn!("Failed to record pipeline run: {}", e);
        }

        result
    }

    /// Recommendation for `key` within `view`; `Ok(None)` when the selection is stale.
    pub fn recommend(&self, view: &DashboardView, key: &RecordKey) -> Result<Option<Recommendation>> {
        match view.recommend(key) {
            Ok(recommendation) => Ok(Some(recommendation)),
            Err(e) if e.is_not_found() => {
                info!("Selection {:?} is no longer in the filtered {}", key, view.dataset);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Label a record key the way the selection box shows it.
pub fn record_label(key: &RecordKey) -> String {
    match key {
        RecordKey::Id { value, .. } => match value {
            CellValue::Text(text) => text.clone(),
            other => other.to_string(),
        },
        RecordKey::Row(index) => index.to_string(),
    }
}
