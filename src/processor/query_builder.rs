use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::ReportingApi;
use crate::helpers::date_helpers::trailing_window;
use crate::processor::result_table::ResultTable;
use crate::processor::{DateWindow, Dimension, ScorecardError, SearchType};
use crate::session::Property;

/// Maximum number of rows requested per query
pub const ROW_CAP: usize = 25_000;

/// Validated user selection for one report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    search_type: SearchType,
    date_window: DateWindow,
    dimensions: Vec<Dimension>,
    row_cap: usize,
}

impl QuerySpec {
    /// # Errors
    /// Returns [`ScorecardError::InvalidSelection`] if a dimension is selected twice.
    pub fn new(
        search_type: SearchType,
        date_window: DateWindow,
        dimensions: Vec<Dimension>,
    ) -> Result<Self, ScorecardError> {
        for (idx, dim) in dimensions.iter().enumerate() {
            if dimensions[..idx].contains(dim) {
                return Err(ScorecardError::InvalidSelection(format!(
                    "dimension '{dim}' selected more than once"
                )));
            }
        }

        Ok(QuerySpec {
            search_type,
            date_window,
            dimensions,
            row_cap: ROW_CAP,
        })
    }

    /// Builds a query description from raw selector slots, dropping `"none"` entries.
    pub fn from_selection<S: AsRef<str>>(
        search_type: SearchType,
        date_window: DateWindow,
        selections: &[S],
    ) -> Result<Self, ScorecardError> {
        let mut dimensions = Vec::with_capacity(selections.len());
        for raw in selections {
            if let Some(dim) = Dimension::parse_selection(raw.as_ref())? {
                dimensions.push(dim);
            }
        }
        QuerySpec::new(search_type, date_window, dimensions)
    }

    pub fn search_type(&self) -> SearchType {
        self.search_type
    }

    pub fn date_window(&self) -> DateWindow {
        self.date_window
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn row_cap(&self) -> usize {
        self.row_cap
    }

    /// Query for this selection, applied in order: search type, date range,
    /// dimensions, row cap.
    pub fn to_query(&self, today: NaiveDate) -> SearchAnalyticsQuery {
        self.dimensions
            .iter()
            .fold(
                SearchAnalyticsQuery::new()
                    .search_type(self.search_type)
                    .range(today, self.date_window.days()),
                |query, dim| query.dimension(*dim),
            )
            .limit(self.row_cap)
    }
}

/// Request body of the search-analytics query endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAnalyticsRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub dimensions: Vec<Dimension>,
    #[serde(rename = "type")]
    pub search_type: SearchType,
    pub row_limit: usize,
    pub start_row: usize,
}

/// Response body of the search-analytics query endpoint
///
/// The API omits `rows` entirely when nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchAnalyticsResponse {
    #[serde(default)]
    pub rows: Vec<ApiRow>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiRow {
    #[serde(default)]
    pub keys: Vec<String>,
    pub clicks: f64,
    pub impressions: f64,
    pub ctr: f64,
    pub position: f64,
}

/// Fluent builder for a single search-analytics query
#[derive(Debug, Clone, Default)]
pub struct SearchAnalyticsQuery {
    search_type: SearchType,
    range: Option<(NaiveDate, i64)>,
    dimensions: Vec<Dimension>,
    limit: Option<usize>,
}

impl SearchAnalyticsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    /// Trailing window of `days` (negative) ending the day before `today`
    pub fn range(mut self, today: NaiveDate, days: i64) -> Self {
        self.range = Some((today, days));
        self
    }

    /// Add a dimension; order defines the key order of returned rows
    pub fn dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    /// Limit number of rows
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Resolve the builder into a request body
    pub fn build(&self) -> Result<SearchAnalyticsRequest, ScorecardError> {
        let (today, days) = self
            .range
            .ok_or_else(|| ScorecardError::InvalidSelection("date range not set".into()))?;
        let (start_date, end_date) = trailing_window(today, days)?;

        let row_limit = self.limit.unwrap_or(ROW_CAP);
        if row_limit == 0 || row_limit > ROW_CAP {
            return Err(ScorecardError::InvalidSelection(format!(
                "row limit must be between 1 and {ROW_CAP} (got {row_limit})"
            )));
        }

        for (idx, dim) in self.dimensions.iter().enumerate() {
            if self.dimensions[..idx].contains(dim) {
                return Err(ScorecardError::InvalidSelection(format!(
                    "dimension '{dim}' selected more than once"
                )));
            }
        }

        Ok(SearchAnalyticsRequest {
            start_date,
            end_date,
            dimensions: self.dimensions.clone(),
            search_type: self.search_type,
            row_limit,
            start_row: 0,
        })
    }

    /// Issue the query against `property` and materialize the rows.
    ///
    /// Exactly one request is sent; failures are returned, never retried.
    pub fn execute(
        &self,
        api: &dyn ReportingApi,
        property: &Property<'_>,
    ) -> Result<ResultTable, ScorecardError> {
        let request = self.build()?;
        debug!(
            site = property.site_url(),
            start = %request.start_date,
            end = %request.end_date,
            dimensions = ?request.dimensions,
            "issuing search analytics query"
        );

        let response = api.query(property.credentials(), property.site_url(), &request)?;
        let table = ResultTable::from_response(&self.dimensions, response)?;

        info!(
            site = property.site_url(),
            rows = table.row_count(),
            "search analytics query completed"
        );
        Ok(table)
    }
}
