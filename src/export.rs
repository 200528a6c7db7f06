use std::cell::RefCell;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use arrow2::{
    array::{Array, Float64Array, Utf8Array},
    chunk::Chunk,
    datatypes::{DataType, Field, Schema},
    io::csv::write::{SerializeOptions, write_chunk, write_header},
};
use lru::LruCache;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rust_xlsxwriter::{Format, Workbook};
use tracing::debug;

use crate::processor::ScorecardError;
use crate::processor::aggregator::AggregatedTable;

const CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::new(16).unwrap();
const SHEET_NAME: &str = "Top Rows";

/// Converts aggregated tables into Arrow columns: one Utf8 array per
/// dimension followed by one Float64 array per measure.
pub fn to_arrow(table: &AggregatedTable) -> (Schema, Chunk<Arc<dyn Array>>) {
    let key_count = table.dimensions.len();

    let fields: Vec<Field> = table
        .dimensions
        .iter()
        .map(|d| Field::new(d, DataType::Utf8, false))
        .chain(
            table
                .measures
                .iter()
                .map(|m| Field::new(m, DataType::Float64, false)),
        )
        .collect();

    let arrays: Vec<Arc<dyn Array>> = (0..fields.len())
        .into_par_iter()
        .map(|i| {
            if i < key_count {
                let values: Vec<&str> = table.rows.iter().map(|r| r.keys[i].as_str()).collect();
                Arc::new(Utf8Array::<i32>::from_slice(values)) as Arc<dyn Array>
            } else {
                let values: Vec<f64> = table
                    .rows
                    .iter()
                    .map(|r| r.values[i - key_count])
                    .collect();
                Arc::new(Float64Array::from_vec(values)) as Arc<dyn Array>
            }
        })
        .collect();

    (Schema::from(fields), Chunk::new(arrays))
}

/// Payload format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExportFormat {
    /// Excel workbook with one worksheet
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ScorecardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ScorecardError::InvalidSelection(format!(
                "unknown export format '{other}'"
            ))),
        }
    }
}

/// Memoized spreadsheet export
///
/// Equal tables exported in the same format map to the same payload; the most
/// recently used `CACHE_CAPACITY` conversions are kept.
#[derive(Debug)]
pub struct ExportCache {
    cache: RefCell<LruCache<(ExportFormat, AggregatedTable), Rc<Vec<u8>>>>,
}

impl Default for ExportCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportCache {
    pub fn new() -> Self {
        Self::with_capacity(CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            cache: RefCell::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    /// Encoded bytes of `table` in `format`, served from the cache when an
    /// equal table was exported before.
    pub fn export(
        &self,
        table: &AggregatedTable,
        format: ExportFormat,
    ) -> Result<Rc<Vec<u8>>, ScorecardError> {
        let key = (format, table.clone());
        if let Some(hit) = self.cache.borrow_mut().get(&key) {
            debug!(rows = table.len(), %format, "export served from cache");
            return Ok(Rc::clone(hit));
        }

        let payload = Rc::new(match format {
            ExportFormat::Xlsx => encode_xlsx(table)?,
            ExportFormat::Csv => encode_csv(table)?,
        });
        self.cache.borrow_mut().put(key, Rc::clone(&payload));
        Ok(payload)
    }

    /// Workbook bytes for `table`: a bold header row then one row per group.
    pub fn to_xlsx(&self, table: &AggregatedTable) -> Result<Rc<Vec<u8>>, ScorecardError> {
        self.export(table, ExportFormat::Xlsx)
    }

    /// CSV bytes for `table`: a header line then one line per row.
    pub fn to_csv(&self, table: &AggregatedTable) -> Result<Rc<Vec<u8>>, ScorecardError> {
        self.export(table, ExportFormat::Csv)
    }

    pub fn write(
        &self,
        table: &AggregatedTable,
        format: ExportFormat,
        path: &Path,
    ) -> Result<usize, ScorecardError> {
        let payload = self.export(table, format)?;
        std::fs::write(path, payload.as_slice())?;
        debug!(bytes = payload.len(), path = %path.display(), "export written");
        Ok(payload.len())
    }
}

fn encode_xlsx(table: &AggregatedTable) -> Result<Vec<u8>, ScorecardError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, name) in table.headers().enumerate() {
        worksheet.write_string_with_format(0, to_col(col)?, name, &header_format)?;
    }

    let key_count = table.dimensions.len();
    for (idx, row) in table.rows.iter().enumerate() {
        let row_num = u32::try_from(idx + 1).map_err(|_| {
            ScorecardError::InvalidSelection(format!("{} rows exceed a worksheet", table.len()))
        })?;
        for (col, key) in row.keys.iter().enumerate() {
            worksheet.write_string(row_num, to_col(col)?, key)?;
        }
        for (col, value) in row.values.iter().enumerate() {
            worksheet.write_number(row_num, to_col(key_count + col)?, *value)?;
        }
    }
    worksheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

fn to_col(idx: usize) -> Result<u16, ScorecardError> {
    u16::try_from(idx)
        .map_err(|_| ScorecardError::InvalidSelection(format!("column {idx} exceeds a worksheet")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::aggregator::AggregatedRow;

    fn sample() -> AggregatedTable {
        AggregatedTable {
            dimensions: vec!["query".into()],
            measures: vec!["clicks".into()],
            rows: vec![
                AggregatedRow {
                    keys: vec!["rust book".into()],
                    values: vec![8.0],
                },
                AggregatedRow {
                    keys: vec!["cargo, crates".into()],
                    values: vec![2.5],
                },
            ],
        }
    }

    #[test]
    fn test_arrow_layout() {
        let (schema, chunk) = to_arrow(&sample());
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.fields[0].data_type, DataType::Utf8);
        assert_eq!(schema.fields[1].data_type, DataType::Float64);
        assert_eq!(chunk.len(), 2);
    }

    #[test]
    fn test_csv_payload() {
        let cache = ExportCache::new();
        let payload = cache.to_csv(&sample()).unwrap();
        let text = String::from_utf8(payload.to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "query,clicks");
        assert!(lines[1].starts_with("rust book,8"));
        assert!(lines[2].starts_with("\"cargo, crates\",2.5"));
    }

    #[test]
    fn test_equal_tables_share_payload() {
        let cache = ExportCache::new();
        let first = cache.to_csv(&sample()).unwrap();
        let second = cache.to_csv(&sample().clone()).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let mut other = sample();
        other.rows[0].values[0] = 9.0;
        let third = cache.to_csv(&other).unwrap();
        assert!(!Rc::ptr_eq(&first, &third));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_empty_table_exports_header_only() {
        let table = AggregatedTable {
            dimensions: vec!["page".into()],
            measures: vec!["impressions".into()],
            rows: Vec::new(),
        };
        let payload = ExportCache::new().to_csv(&table).unwrap();
        assert_eq!(String::from_utf8(payload.to_vec()).unwrap().trim_end(), "page,impressions");
    }

    #[test]
    fn test_xlsx_payload_is_a_zip_workbook() {
        let payload = ExportCache::new().to_xlsx(&sample()).unwrap();
        assert!(!payload.is_empty());
        assert_eq!(&payload[0..2], b"PK");
    }

    #[test]
    fn test_formats_cached_separately() {
        let cache = ExportCache::new();
        let xlsx = cache.export(&sample(), ExportFormat::default()).unwrap();
        let csv = cache.to_csv(&sample()).unwrap();
        assert_ne!(xlsx, csv);
        assert_eq!(cache.len(), 2);
        assert!(Rc::ptr_eq(&xlsx, &cache.to_xlsx(&sample()).unwrap()));
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("xlsx".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert_eq!("Excel".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        for format in [ExportFormat::Xlsx, ExportFormat::Csv] {
            let path = dir.path().join(format!("top.{}", format.extension()));
            let written = ExportCache::new().write(&sample(), format, &path).unwrap();
            assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, written);
        }
    }
}
