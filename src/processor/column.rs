use std::fmt;

use crate::processor::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Float64,
    Str,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Float64 => f.write_str("numeric"),
            ColumnType::Str => f.write_str("string"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float64(Vec<f64>),
    Str(Vec<String>),
}

impl Column {
    pub fn new(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Float64 => Column::Float64(Vec::new()),
            ColumnType::Str => Column::Str(Vec::new()),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Float64(_) => ColumnType::Float64,
            Column::Str(_) => ColumnType::Str,
        }
    }

    /// Appends a value, handing it back when its type does not match the column.
    pub fn push(&mut self, value: Value) -> Result<(), Value> {
        match (self, value) {
            (Column::Float64(values), Value::Float(v)) => values.push(v),
            (Column::Str(values), Value::Str(v)) => values.push(v),
            (_, other) => return Err(other),
        }
        Ok(())
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            Column::Float64(values) => Some(values),
            Column::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&[String]> {
        match self {
            Column::Str(values) => Some(values),
            Column::Float64(_) => None,
        }
    }

    // Random access
    pub fn get(&self, idx: usize) -> Option<Value> {
        match self {
            Column::Float64(values) => values.get(idx).copied().map(Value::Float),
            Column::Str(values) => values.get(idx).cloned().map(Value::Str),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Float64(values) => values.len(),
            Column::Str(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
