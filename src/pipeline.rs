use chrono::NaiveDate;
use tracing::{info, warn};

use crate::client::ReportingApi;
use crate::processor::aggregator::{AggregatedTable, Aggregator};
use crate::processor::query_builder::QuerySpec;
use crate::processor::{AggregateOp, DateWindow, Metric, ScorecardError, SearchType};
use crate::session::Session;

/// Everything one report submission asks for
#[derive(Debug, Clone)]
pub struct Selection {
    pub site_url: String,
    pub search_type: SearchType,
    pub date_window: DateWindow,
    /// Raw selector slots, `"none"` allowed
    pub dimensions: Vec<String>,
    /// First metric drives the sort
    pub metrics: Vec<Metric>,
    pub op: AggregateOp,
}

/// Outcome of a submission that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// The query matched no rows; nothing was aggregated
    Empty,
    Ready {
        /// Rows returned by the API before aggregation
        total_rows: usize,
        table: AggregatedTable,
    },
}

/// Validates `selection`, runs its query once and aggregates the rows.
///
/// Every failure only ends this submission; `session` is never modified.
pub fn run_report(
    session: &Session,
    api: &dyn ReportingApi,
    selection: &Selection,
    today: NaiveDate,
) -> Result<Report, ScorecardError> {
    let spec = QuerySpec::from_selection(
        selection.search_type,
        selection.date_window,
        selection.dimensions.as_slice(),
    )?;
    if spec.dimensions().is_empty() {
        return Err(ScorecardError::NoDimensionSelected);
    }
    if selection.metrics.is_empty() {
        return Err(ScorecardError::NoMetricSelected);
    }
    for (idx, metric) in selection.metrics.iter().enumerate() {
        if selection.metrics[..idx].contains(metric) {
            return Err(ScorecardError::InvalidSelection(format!(
                "metric '{metric}' selected more than once"
            )));
        }
    }
    let property = session.property(&selection.site_url)?;

    let table = spec.to_query(today).execute(api, &property)?;
    if table.is_empty() {
        warn!(site = property.site_url(), "query returned no rows");
        return Ok(Report::Empty);
    }

    let aggregated = Aggregator::new()
        .group_by_dimensions(spec.dimensions())
        .metrics(&selection.metrics)
        .op(selection.op)
        .execute(&table)?;

    info!(
        total_rows = table.row_count(),
        shown = aggregated.len(),
        "report ready"
    );
    Ok(Report::Ready {
        total_rows: table.row_count(),
        table: aggregated,
    })
}
