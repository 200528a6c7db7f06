use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use tracing::debug;

use crate::processor::{
    AggregateOp, Dimension, Metric, ScorecardError, Value,
    column::ColumnType,
    result_table::ResultTable,
};

/// Number of rows kept after sorting
pub const TOP_N: usize = 50;

/// One grouped row: dimension values then one value per measure
#[derive(Debug, Clone)]
pub struct AggregatedRow {
    pub keys: Vec<String>,
    pub values: Vec<f64>,
}

// Values compare by bit pattern, matching the `Hash` impl of
// `AggregatedTable` so tables can key the export cache.
impl PartialEq for AggregatedRow {
    fn eq(&self, other: &Self) -> bool {
        self.keys == other.keys
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for AggregatedRow {}

/// Grouped, sorted and truncated view of a [`ResultTable`]
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedTable {
    /// Grouping columns, e.g. `["query", "page"]`
    pub dimensions: Vec<String>,
    /// Aggregated metric columns, e.g. `["clicks"]`
    pub measures: Vec<String>,
    /// `rows[i].keys[j]` corresponds to `dimensions[j]`,
    /// `rows[i].values[k]` to `measures[k]`
    pub rows: Vec<AggregatedRow>,
}

impl AggregatedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> + '_ {
        self.dimensions
            .iter()
            .chain(self.measures.iter())
            .map(String::as_str)
    }

    /// Value of `measure` on row `idx`
    pub fn value(&self, idx: usize, measure: &str) -> Option<f64> {
        let pos = self.measures.iter().position(|m| m == measure)?;
        self.rows.get(idx).and_then(|row| row.values.get(pos)).copied()
    }

    /// Turns the aggregate back into a plain table with the same columns.
    pub fn to_result_table(&self) -> Result<ResultTable, ScorecardError> {
        let schema = self
            .dimensions
            .iter()
            .map(|d| (d.as_str(), ColumnType::Str))
            .chain(self.measures.iter().map(|m| (m.as_str(), ColumnType::Float64)));
        let mut table = ResultTable::new(schema)?;

        for row in &self.rows {
            let values = row
                .keys
                .iter()
                .cloned()
                .map(Value::Str)
                .chain(row.values.iter().copied().map(Value::Float))
                .collect();
            table.push_row(values)?;
        }
        Ok(table)
    }
}

impl Eq for AggregatedTable {}

impl Hash for AggregatedTable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dimensions.hash(state);
        self.measures.hash(state);
        for row in &self.rows {
            row.keys.hash(state);
            for v in &row.values {
                v.to_bits().hash(state);
            }
        }
    }
}

impl fmt::Display for AggregatedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                row.keys
                    .iter()
                    .cloned()
                    .chain(row.values.iter().map(|v| format_metric(*v)))
                    .collect()
            })
            .collect();

        let mut widths: Vec<usize> = self.headers().map(str::len).collect();
        for cells in &rendered {
            for (w, cell) in widths.iter_mut().zip(cells) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let key_cols = self.dimensions.len();
        let write_line = |f: &mut fmt::Formatter<'_>, cells: &[&str]| -> fmt::Result {
            for (i, (cell, &w)) in cells.iter().zip(&widths).enumerate() {
                if i > 0 {
                    f.write_str("  ")?;
                }
                if i < key_cols {
                    write!(f, "{cell:<w$}")?;
                } else {
                    write!(f, "{cell:>w$}")?;
                }
            }
            writeln!(f)
        };

        let headers: Vec<&str> = self.headers().collect();
        write_line(f, &headers)?;
        for cells in &rendered {
            let cells: Vec<&str> = cells.iter().map(String::as_str).collect();
            write_line(f, &cells)?;
        }
        Ok(())
    }
}

fn format_metric(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        format!("{v:.4}")
    }
}

/// Groups a result table by dimension columns and aggregates metric columns
///
/// # Examples
///
/// ```rust
/// # use gsc_scorecard::processor::{Dimension, Metric, Value};
/// # use gsc_scorecard::processor::aggregator::Aggregator;
/// # use gsc_scorecard::processor::result_table::ResultTable;
/// let mut table = ResultTable::for_dimensions(&[Dimension::Query]).unwrap();
/// table.push_row(vec![
///     Value::Str("rust".into()),
///     Value::Float(3.0),
///     Value::Float(40.0),
///     Value::Float(0.075),
///     Value::Float(2.5),
/// ]).unwrap();
///
/// let top = Aggregator::new()
///     .group_by(Dimension::Query.as_str())
///     .metric(Metric::Clicks.as_str())
///     .execute(&table)
///     .unwrap();
/// assert_eq!(top.value(0, "clicks"), Some(3.0));
/// ```
#[derive(Debug, Clone)]
pub struct Aggregator {
    group_by_columns: Vec<String>,
    metrics: Vec<String>,
    op: AggregateOp,
    top_n: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            group_by_columns: Vec::new(),
            metrics: Vec::new(),
            op: AggregateOp::Sum,
            top_n: TOP_N,
        }
    }

    /// Add a single group-by column
    pub fn group_by(mut self, column: &str) -> Self {
        self.group_by_columns.push(column.to_string());
        self
    }

    /// Group by every dimension of a query, in query order
    pub fn group_by_dimensions(mut self, dimensions: &[Dimension]) -> Self {
        self.group_by_columns
            .extend(dimensions.iter().map(|d| d.as_str().to_string()));
        self
    }

    /// Add a metric column; the first one added drives the sort
    pub fn metric(mut self, column: &str) -> Self {
        self.metrics.push(column.to_string());
        self
    }

    pub fn metrics(mut self, metrics: &[Metric]) -> Self {
        self.metrics
            .extend(metrics.iter().map(|m| m.as_str().to_string()));
        self
    }

    pub fn op(mut self, op: AggregateOp) -> Self {
        self.op = op;
        self
    }

    /// Override the number of rows kept
    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    /// Checks the selection against the table without aggregating.
    ///
    /// # Errors
    /// - [`ScorecardError::NoDimensionSelected`] / [`ScorecardError::NoMetricSelected`]
    ///   for empty selections
    /// - [`ScorecardError::InvalidSelection`] when a grouping column or a metric
    ///   is named twice
    /// - [`ScorecardError::MissingColumns`] naming every absent grouping column,
    ///   or failing that every absent metric column
    /// - [`ScorecardError::ColumnType`] when a grouping column is numeric or a
    ///   metric column is a string
    pub fn validate(&self, table: &ResultTable) -> Result<(), ScorecardError> {
        if self.group_by_columns.is_empty() {
            return Err(ScorecardError::NoDimensionSelected);
        }
        if self.metrics.is_empty() {
            return Err(ScorecardError::NoMetricSelected);
        }
        if let Some(name) = first_repeat(&self.group_by_columns) {
            return Err(ScorecardError::InvalidSelection(format!(
                "grouping column '{name}' selected more than once"
            )));
        }
        if let Some(name) = first_repeat(&self.metrics) {
            return Err(ScorecardError::InvalidSelection(format!(
                "metric '{name}' selected more than once"
            )));
        }

        let missing = table.missing_columns(self.group_by_columns.as_slice());
        if !missing.is_empty() {
            return Err(ScorecardError::MissingColumns(missing));
        }
        let missing = table.missing_columns(self.metrics.as_slice());
        if !missing.is_empty() {
            return Err(ScorecardError::MissingColumns(missing));
        }

        for name in &self.group_by_columns {
            if table.get_col(name)?.column_type() != ColumnType::Str {
                return Err(ScorecardError::ColumnType {
                    column: name.clone(),
                    expected: ColumnType::Str,
                });
            }
        }
        for name in &self.metrics {
            if table.get_col(name)?.column_type() != ColumnType::Float64 {
                return Err(ScorecardError::ColumnType {
                    column: name.clone(),
                    expected: ColumnType::Float64,
                });
            }
        }
        Ok(())
    }

    /// Group, aggregate, sort descending by the first metric and keep the top rows.
    ///
    /// Groups with equal first-metric values keep the order in which their key
    /// was first seen in the table.
    pub fn execute(&self, table: &ResultTable) -> Result<AggregatedTable, ScorecardError> {
        self.validate(table)?;

        let key_cols = self
            .group_by_columns
            .iter()
            .map(|name| {
                table.get_col(name)?.as_str().ok_or_else(|| ScorecardError::ColumnType {
                    column: name.clone(),
                    expected: ColumnType::Str,
                })
            })
            .collect::<Result<Vec<&[String]>, _>>()?;
        let metric_cols = self
            .metrics
            .iter()
            .map(|name| {
                table.get_col(name)?.as_f64().ok_or_else(|| ScorecardError::ColumnType {
                    column: name.clone(),
                    expected: ColumnType::Float64,
                })
            })
            .collect::<Result<Vec<&[f64]>, _>>()?;

        // Position of each key in `groups`, which stays in first-seen order
        let mut index: HashMap<Vec<&str>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<&str>, Vec<f64>, usize)> = Vec::new();

        for row_idx in 0..table.row_count() {
            let key: Vec<&str> = key_cols.iter().map(|col| col[row_idx].as_str()).collect();
            let slot = *index.entry(key).or_insert_with_key(|key| {
                groups.push((key.clone(), vec![0.0; metric_cols.len()], 0));
                groups.len() - 1
            });

            let (_, sums, count) = &mut groups[slot];
            for (sum, col) in sums.iter_mut().zip(&metric_cols) {
                *sum += col[row_idx];
            }
            *count += 1;
        }

        let mut rows: Vec<AggregatedRow> = groups
            .into_iter()
            .map(|(key, sums, count)| AggregatedRow {
                keys: key.into_iter().map(str::to_string).collect(),
                values: match self.op {
                    AggregateOp::Sum => sums,
                    AggregateOp::Avg => sums.into_iter().map(|s| s / count as f64).collect(),
                },
            })
            .collect();

        let group_count = rows.len();
        // sort_by is stable: ties keep first-seen order
        rows.sort_by(|a, b| b.values[0].total_cmp(&a.values[0]));
        rows.truncate(self.top_n);

        debug!(
            input_rows = table.row_count(),
            groups = group_count,
            kept = rows.len(),
            "aggregated result table"
        );

        Ok(AggregatedTable {
            dimensions: self.group_by_columns.clone(),
            measures: self.metrics.clone(),
            rows,
        })
    }
}

fn first_repeat(names: &[String]) -> Option<&str> {
    names
        .iter()
        .enumerate()
        .find(|(idx, name)| names[..*idx].contains(name))
        .map(|(_, name)| name.as_str())
}
