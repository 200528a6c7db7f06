use tracing::debug;

use crate::processor::{
    Dimension, Metric, ScorecardError, Value,
    column::{Column, ColumnType},
    query_builder::SearchAnalyticsResponse,
};

/// Typed table holding the rows of one report
///
/// Columns are declared up front; every row pushed afterwards is checked
/// against that declaration, so aggregation never has to trust the shape of
/// the remote response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    headers: Vec<String>,
    columns: Vec<Column>,
    row_count: usize,
}

impl ResultTable {
    /// Create an empty table with the given column declaration
    ///
    /// # Errors
    /// Returns [`ScorecardError::InvalidSelection`] if a column name repeats.
    pub fn new<S: Into<String>>(
        schema: impl IntoIterator<Item = (S, ColumnType)>,
    ) -> Result<Self, ScorecardError> {
        let mut headers: Vec<String> = Vec::new();
        let mut columns = Vec::new();

        for (name, column_type) in schema {
            let name = name.into();
            if headers.contains(&name) {
                return Err(ScorecardError::InvalidSelection(format!(
                    "duplicate column '{name}'"
                )));
            }
            headers.push(name);
            columns.push(Column::new(column_type));
        }

        Ok(ResultTable {
            headers,
            columns,
            row_count: 0,
        })
    }

    /// Declaration for a report split by `dimensions`: one string column per
    /// dimension (request order) followed by every metric column.
    pub fn for_dimensions(dimensions: &[Dimension]) -> Result<Self, ScorecardError> {
        let schema = dimensions
            .iter()
            .map(|d| (d.as_str(), ColumnType::Str))
            .chain(Metric::ALL.into_iter().map(|m| (m.as_str(), ColumnType::Float64)));
        ResultTable::new(schema)
    }

    /// Materializes an API response into a table.
    ///
    /// # Errors
    /// Returns [`ScorecardError::Query`] when a row carries a different number
    /// of keys than there are dimensions.
    pub fn from_response(
        dimensions: &[Dimension],
        response: SearchAnalyticsResponse,
    ) -> Result<Self, ScorecardError> {
        let mut table = ResultTable::for_dimensions(dimensions)?;

        for (idx, row) in response.rows.into_iter().enumerate() {
            if row.keys.len() != dimensions.len() {
                return Err(ScorecardError::Query(format!(
                    "row {idx} has {} keys, expected {}",
                    row.keys.len(),
                    dimensions.len()
                )));
            }

            let mut values: Vec<Value> = row.keys.into_iter().map(Value::Str).collect();
            values.extend([
                Value::Float(row.clicks),
                Value::Float(row.impressions),
                Value::Float(row.ctr),
                Value::Float(row.position),
            ]);
            table.push_row(values)?;
        }

        debug!(
            rows = table.row_count(),
            columns = table.headers().len(),
            "materialized result table"
        );
        Ok(table)
    }

    /// Appends one row; values must follow the header order.
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<(), ScorecardError> {
        if values.len() != self.columns.len() {
            return Err(ScorecardError::InvalidSelection(format!(
                "row has {} values, table has {} columns",
                values.len(),
                self.columns.len()
            )));
        }

        // Check every cell before touching the columns so a bad row leaves
        // the table unchanged.
        for (idx, (value, col)) in values.iter().zip(&self.columns).enumerate() {
            let expected = col.column_type();
            let matches = matches!(
                (value, expected),
                (Value::Float(_), ColumnType::Float64) | (Value::Str(_), ColumnType::Str)
            );
            if !matches {
                return Err(ScorecardError::ColumnType {
                    column: self.headers[idx].clone(),
                    expected,
                });
            }
        }

        for (value, col) in values.into_iter().zip(self.columns.iter_mut()) {
            col.push(value).map_err(|_| {
                ScorecardError::InvalidSelection("column type changed mid-row".into())
            })?;
        }
        self.row_count += 1;
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Names from `names` that are not columns of this table, in the order given.
    pub fn missing_columns<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        names
            .iter()
            .filter_map(|name| {
                let name: &str = name.as_ref();
                (!self.has_column(name)).then(|| name.to_string())
            })
            .collect()
    }

    pub fn get_col(&self, col_name: &str) -> Result<&Column, ScorecardError> {
        let col_pos = self
            .headers
            .iter()
            .position(|cn| cn == col_name)
            .ok_or_else(|| ScorecardError::MissingColumns(vec![col_name.to_string()]))?;

        self.columns
            .get(col_pos)
            .ok_or_else(|| ScorecardError::MissingColumns(vec![col_name.to_string()]))
    }

    pub fn row(&self, idx: usize) -> Option<Vec<Value>> {
        if idx >= self.row_count {
            return None;
        }
        self.columns.iter().map(|col| col.get(idx)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::query_builder::ApiRow;

    fn api_row(keys: &[&str], clicks: f64) -> ApiRow {
        ApiRow {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            clicks,
            impressions: clicks * 10.0,
            ctr: 0.1,
            position: 4.2,
        }
    }

    #[test]
    fn test_from_response_declares_dimension_then_metric_columns() {
        let response = SearchAnalyticsResponse {
            rows: vec![api_row(&["rust", "/book"], 3.0), api_row(&["cargo", "/"], 1.0)],
        };
        let table =
            ResultTable::from_response(&[Dimension::Query, Dimension::Page], response).unwrap();

        assert_eq!(
            table.headers(),
            ["query", "page", "clicks", "impressions", "ctr", "position"]
        );
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.row(1).unwrap()[..3],
            [
                Value::Str("cargo".into()),
                Value::Str("/".into()),
                Value::Float(1.0)
            ]
        );
    }

    #[test]
    fn test_from_response_rejects_key_count_mismatch() {
        let response = SearchAnalyticsResponse {
            rows: vec![api_row(&["rust"], 3.0)],
        };
        let err = ResultTable::from_response(&[Dimension::Query, Dimension::Date], response)
            .unwrap_err();
        assert!(matches!(err, ScorecardError::Query(_)));
    }

    #[test]
    fn test_push_row_type_mismatch_leaves_table_untouched() {
        let mut table =
            ResultTable::new([("query", ColumnType::Str), ("clicks", ColumnType::Float64)])
                .unwrap();
        let err = table
            .push_row(vec![Value::Str("a".into()), Value::Str("3".into())])
            .unwrap_err();
        assert!(matches!(err, ScorecardError::ColumnType { .. }));
        assert!(table.is_empty());
        assert_eq!(table.get_col("query").unwrap().len(), 0);
    }

    #[test]
    fn test_duplicate_column_names_rejected() {
        assert!(ResultTable::new([("query", ColumnType::Str), ("query", ColumnType::Str)]).is_err());
    }

    #[test]
    fn test_missing_columns_keeps_request_order() {
        let table = ResultTable::for_dimensions(&[Dimension::Query]).unwrap();
        assert_eq!(
            table.missing_columns(&["device", "query", "page"]),
            vec!["device".to_string(), "page".to_string()]
        );
    }
}
