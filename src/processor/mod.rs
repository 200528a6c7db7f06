use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod aggregator;
pub mod column;
pub mod query_builder;
pub mod result_table;

/// Error type used across the crate
#[derive(Debug, Error)]
pub enum ScorecardError {
    #[error("token exchange failed: {0}")]
    AuthExchange(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("no dimension selected")]
    NoDimensionSelected,

    #[error("no metric selected")]
    NoMetricSelected,

    #[error("missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("column '{column}' must be {expected}")]
    ColumnType {
        column: String,
        expected: ColumnType,
    },

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow2::error::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl ScorecardError {
    /// True for the errors raised while checking a selection or a table's
    /// columns, before any aggregation runs.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ScorecardError::NoDimensionSelected
                | ScorecardError::NoMetricSelected
                | ScorecardError::MissingColumns(_)
                | ScorecardError::ColumnType { .. }
                | ScorecardError::InvalidSelection(_)
        )
    }
}

pub use column::ColumnType;

/// Cell value of a result table (owned for simplicity)
#[derive(Debug, Clone)]
pub enum Value {
    /// Metric cell
    Float(f64),
    /// Dimension cell
    Str(String),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}


/// Categorical axis a report can be split by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Query,
    Page,
    Date,
    Country,
    Device,
    SearchAppearance,
}

/// Selector value meaning "no dimension chosen in this slot"
pub const NO_DIMENSION: &str = "none";

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Query,
        Dimension::Page,
        Dimension::Date,
        Dimension::Country,
        Dimension::Device,
        Dimension::SearchAppearance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Query => "query",
            Dimension::Page => "page",
            Dimension::Date => "date",
            Dimension::Country => "country",
            Dimension::Device => "device",
            Dimension::SearchAppearance => "searchAppearance",
        }
    }

    /// Parses a selector slot; `"none"` yields `Ok(None)`.
    pub fn parse_selection(raw: &str) -> Result<Option<Dimension>, ScorecardError> {
        if raw == NO_DIMENSION {
            return Ok(None);
        }
        raw.parse().map(Some)
    }
}

impl FromStr for Dimension {
    type Err = ScorecardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| ScorecardError::InvalidSelection(format!("unknown dimension '{s}'")))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric measurement returned for every row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Clicks,
    Impressions,
    Ctr,
    Position,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Clicks,
        Metric::Impressions,
        Metric::Ctr,
        Metric::Position,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Clicks => "clicks",
            Metric::Impressions => "impressions",
            Metric::Ctr => "ctr",
            Metric::Position => "position",
        }
    }
}

impl FromStr for Metric {
    type Err = ScorecardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ScorecardError::InvalidSelection(format!("unknown metric '{s}'")))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search surface the report covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchType {
    #[default]
    Web,
    News,
    Video,
    GoogleNews,
    Image,
}

impl SearchType {
    pub const ALL: [SearchType; 5] = [
        SearchType::Web,
        SearchType::News,
        SearchType::Video,
        SearchType::GoogleNews,
        SearchType::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Web => "web",
            SearchType::News => "news",
            SearchType::Video => "video",
            SearchType::GoogleNews => "googleNews",
            SearchType::Image => "image",
        }
    }
}

impl FromStr for SearchType {
    type Err = ScorecardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ScorecardError::InvalidSelection(format!("unknown search type '{s}'")))
    }
}

/// Trailing date window, expressed as a negative day offset from today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DateWindow {
    Last7Days,
    #[default]
    Last30Days,
    Last3Months,
    Last6Months,
    Last12Months,
}

impl DateWindow {
    pub const ALL: [DateWindow; 5] = [
        DateWindow::Last7Days,
        DateWindow::Last30Days,
        DateWindow::Last3Months,
        DateWindow::Last6Months,
        DateWindow::Last12Months,
    ];

    pub fn days(&self) -> i64 {
        match self {
            DateWindow::Last7Days => -7,
            DateWindow::Last30Days => -30,
            DateWindow::Last3Months => -91,
            DateWindow::Last6Months => -182,
            DateWindow::Last12Months => -365,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DateWindow::Last7Days => "last-7-days",
            DateWindow::Last30Days => "last-30-days",
            DateWindow::Last3Months => "last-3-months",
            DateWindow::Last6Months => "last-6-months",
            DateWindow::Last12Months => "last-12-months",
        }
    }

    pub fn from_days(days: i64) -> Result<Self, ScorecardError> {
        DateWindow::ALL
            .into_iter()
            .find(|w| w.days() == days)
            .ok_or_else(|| {
                ScorecardError::InvalidSelection(format!(
                    "date window must be one of -7, -30, -91, -182, -365 (got {days})"
                ))
            })
    }
}

impl FromStr for DateWindow {
    type Err = ScorecardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(window) = DateWindow::ALL.into_iter().find(|w| w.name() == s) {
            return Ok(window);
        }
        match s.parse::<i64>() {
            Ok(days) => DateWindow::from_days(days),
            Err(_) => Err(ScorecardError::InvalidSelection(format!(
                "unknown date range '{s}'"
            ))),
        }
    }
}

/// Aggregate operations applied to metric columns per group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AggregateOp {
    /// Sum of the group's values
    #[default]
    Sum,
    /// Mean of the group's values
    Avg,
}

impl FromStr for AggregateOp {
    type Err = ScorecardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(AggregateOp::Sum),
            "avg" => Ok(AggregateOp::Avg),
            _ => Err(ScorecardError::InvalidSelection(format!(
                "unknown aggregate op '{s}'"
            ))),
        }
    }
}
