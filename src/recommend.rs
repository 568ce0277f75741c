//! Recommendations for a selected record
//!
//! Each dataset has its own threshold ladder, all evaluated by the same [`RuleLadder`]. Deals
//! additionally get an outreach message chosen by deal type, independently of the advice.

use crate::error::{DashboardError, Result};
use crate::filter::apply_filters;
use crate::filter_spec::FilterSpec;
use crate::loader::Dataset;
use crate::metrics::with_flag_count;
use crate::rules::{Condition, RuleLadder};
use crate::schema::{companies, deals, tickets};
use crate::table::{CellValue, Record, Table, ROW_INDEX_COLUMN};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const LOW_DEAL_SCORE: f64 = 50.0;
pub const LONG_SALES_CYCLE_DAYS: f64 = 60.0;
pub const SLOW_RESPONSE_HOURS: f64 = 48.0;
pub const LONG_IMPLEMENTATION_DAYS: f64 = 30.0;
pub const LIMITED_TECH_STACK: f64 = 10.0;
pub const MODERATE_TECH_STACK: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    pub recommendation: String,
    pub action_plan: String,
}

impl Advice {
    pub fn new(recommendation: &str, action_plan: &str) -> Self {
        Self {
            recommendation: recommendation.to_string(),
            action_plan: action_plan.to_string(),
        }
    }
}

pub fn deals_ladder() -> RuleLadder<Advice> {
    RuleLadder::new(Advice::new(
        "The deal appears to be on track.",
        "Maintain regular engagement and monitor progress.",
    ))
    .when(
        Condition::less_than(deals::DEAL_SCORE, LOW_DEAL_SCORE),
        Advice::new(
            "The deal score is low; consider additional qualification.",
            "Schedule a follow-up call to better understand client needs.",
        ),
    )
    .when(
        Condition::greater_than(deals::DAYS_TO_CLOSE, LONG_SALES_CYCLE_DAYS),
        Advice::new(
            "The sales cycle is lengthy; analyze possible bottlenecks.",
            "Review internal processes and offer targeted incentives.",
        ),
    )
}

pub fn tickets_ladder() -> RuleLadder<Advice> {
    RuleLadder::new(Advice::new(
        "Ticket metrics are within acceptable ranges.",
        "Maintain current practices and monitor for any changes.",
    ))
    .when(
        Condition::greater_than(tickets::RESPONSE_TIME_HOURS, SLOW_RESPONSE_HOURS),
        Advice::new(
            "High response time; review support communication processes.",
            "Consider follow-up training for the support team or a review of ticket handling procedures.",
        ),
    )
    .when(
        Condition::greater_than(tickets::IMPLEMENTATION_DAYS, LONG_IMPLEMENTATION_DAYS),
        Advice::new(
            "Long implementation duration; investigate underlying causes.",
            "Initiate a process review to identify bottlenecks and streamline implementation steps.",
        ),
    )
}

pub fn companies_ladder() -> RuleLadder<Advice> {
    RuleLadder::new(Advice::new(
        "The company leverages a robust array of web technologies.",
        "Explore advanced solutions that may further optimize their tech stack.",
    ))
    .when(
        Condition::less_than(companies::TECH_COUNT, LIMITED_TECH_STACK),
        Advice::new(
            "The company appears to use a limited set of web technologies.",
            "Consider engaging to understand if additional technologies could enhance operations.",
        ),
    )
    .when(
        Condition::less_than(companies::TECH_COUNT, MODERATE_TECH_STACK),
        Advice::new(
            "The company has a moderate technology stack.",
            "Evaluate opportunities for streamlined integration of additional tools.",
        ),
    )
}

/// Outreach message for a deal, picked by its deal type flags.
pub fn deal_message_ladder() -> RuleLadder<String> {
    RuleLadder::new(
        "Please let us know if you have any questions or need further assistance. \
         We are here to support you."
            .to_string(),
    )
    .when(
        Condition::flag_set(deals::DEAL_TYPE_NEW),
        "Thank you for your interest in our new offerings. \
         We are excited to work with you and support your needs."
            .to_string(),
    )
    .when(
        Condition::flag_set(deals::DEAL_TYPE_RENEWAL),
        "We appreciate your loyalty and are committed to providing continued value. \
         Let's discuss your renewal options."
            .to_string(),
    )
}

pub fn ladder_for(dataset: Dataset) -> RuleLadder<Advice> {
    match dataset {
        Dataset::Deals => deals_ladder(),
        Dataset::Tickets => tickets_ladder(),
        Dataset::Companies => companies_ladder(),
    }
}

/// How the presentation layer identifies the selected record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKey {
    /// Value of an identifier column such as `Record ID`.
    Id { column: String, value: CellValue },
    /// Stable row index assigned when the dataset was loaded.
    Row(usize),
}

impl RecordKey {
    pub fn id(column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        RecordKey::Id {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Key for `raw` in `dataset`: its id column when it has one, the row index otherwise.
    pub fn for_dataset(dataset: Dataset, raw: &str) -> Result<Self> {
        match dataset.id_column() {
            Some(column) => {
                let value = match raw.trim().parse::<f64>() {
                    Ok(number) => CellValue::Number(number),
                    Err(_) => CellValue::Text(raw.trim().to_string()),
                };
                Ok(RecordKey::id(column, value))
            }
            None => raw.trim().parse::<usize>().map(RecordKey::Row).map_err(|_| {
                DashboardError::Configuration(format!("'{}' is not a row index", raw))
            }),
        }
    }
}

/// The first row of `table` matching `key`.
pub fn select_record(table: &Table, key: &RecordKey) -> Result<Record> {
    let spec = match key {
        RecordKey::Id { column, value } => FilterSpec::new().include(column.clone(), [value.clone()]),
        RecordKey::Row(index) => FilterSpec::new().include(ROW_INDEX_COLUMN, [*index as f64]),
    };
    let matches = apply_filters(table, &spec)?;
    if matches.is_empty() {
        return Err(DashboardError::NotFound(match key {
            RecordKey::Id { column, value } => format!("no record with {} = {}", column, value),
            RecordKey::Row(index) => format!("no record at row {}", index),
        }));
    }
    matches.record(0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub record: Record,
    pub advice: Advice,
    /// Outreach message, deals only.
    pub message: Option<String>,
}

/// Recommend on the record `key` of the filtered `table`.
///
/// Fails with `NotFound` when the record was filtered out (stale selection).
pub fn recommend(dataset: Dataset, table: &Table, key: &RecordKey) -> Result<Recommendation> {
    let record = select_record(table, key)?;
    let record = match dataset {
        Dataset::Companies if record.get(companies::TECH_COUNT).is_none() => {
            let flags = table.columns_with_prefix(companies::WEB_TECHNOLOGY_PREFIX);
            let derived = with_flag_count(table, &flags, companies::TECH_COUNT)?;
            select_record(&derived, key)?
        }
        _ => record,
    };

    let advice = ladder_for(dataset).evaluate(&record)?.clone();
    let message = match dataset {
        Dataset::Deals => Some(deal_message_ladder().evaluate(&record)?.clone()),
        Dataset::Tickets | Dataset::Companies => None,
    };
    debug!("{} recommendation: {}", dataset, advice.recommendation);

    Ok(Recommendation {
        record,
        advice,
        message,
    })
}
