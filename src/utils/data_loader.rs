//! Data loading utilities
//!
//! Files are read through polars and converted into a [`Dataset`].
//! Numeric dtypes become numbers, strings stay text, and any other
//! dtype is rendered as text.

use crate::dataset::{Column as DataColumn, Dataset, Scalar as Cell};
use crate::error::{Result, SelectError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Data loader for CSV, JSON and Parquet files
pub struct DataLoader {
    /// Rows scanned when inferring a CSV schema
    infer_schema_length: usize,
    separator: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
            separator: b',',
        }
    }

    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        let parse_opts = CsvParseOptions::default().with_separator(self.separator);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(SelectError::from)
    }

    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        ParquetReader::new(file).finish().map_err(SelectError::from)
    }

    /// Load a JSON array of row objects
    pub fn load_json(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        JsonReader::new(file).finish().map_err(SelectError::from)
    }

    /// Detect the format from the extension and load
    pub fn load_auto(&self, path: &Path) -> Result<DataFrame> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => self.load_csv(path),
            "tsv" => DataLoader { separator: b'\t', ..*self }.load_csv(path),
            "parquet" | "pq" => self.load_parquet(path),
            "json" => self.load_json(path),
            other => Err(SelectError::Data(format!(
                "unsupported file format '{}' for {}",
                other,
                path.display()
            ))),
        }
    }

    /// Load any supported file straight into a dataset
    pub fn load_dataset(&self, path: &Path) -> Result<Dataset> {
        let df = self.load_auto(path)?;
        debug!(rows = df.height(), cols = df.width(), path = %path.display(), "loaded file");
        dataframe_to_dataset(&df)
    }
}

/// Convert a polars frame into a dataset, column by column
pub fn dataframe_to_dataset(df: &DataFrame) -> Result<Dataset> {
    let columns = df
        .get_columns()
        .iter()
        .map(|column| series_to_column(column.as_materialized_series()))
        .collect::<Result<Vec<_>>>()?;
    Dataset::new(columns)
}

fn series_to_column(series: &Series) -> Result<DataColumn> {
    let name = series.name().to_string();
    let values: Vec<Cell> = match series.dtype() {
        DataType::Boolean => series.bool()?.into_iter().map(Cell::from).collect(),
        DataType::String => series.str()?.into_iter().map(Cell::from).collect(),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Float32
        | DataType::Float64 => {
            let cast = series.cast(&DataType::Float64)?;
            cast.f64()?.into_iter().map(Cell::from).collect()
        }
        _ => {
            let cast = series.cast(&DataType::String)?;
            cast.str()?.into_iter().map(Cell::from).collect()
        }
    };
    Ok(DataColumn::new(name, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_csv_into_dataset() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "size,color,price").unwrap();
        writeln!(file, "1.5,red,10").unwrap();
        writeln!(file, "2.0,blue,").unwrap();
        writeln!(file, ",red,30").unwrap();
        file.flush().unwrap();

        let ds = DataLoader::new().load_dataset(file.path()).unwrap();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.column_names(), vec!["size", "color", "price"]);

        let size = ds.column("size").unwrap();
        assert_eq!(size.values()[0], Cell::Number(1.5));
        assert!(size.values()[2].is_missing());

        let color = ds.column("color").unwrap();
        assert_eq!(color.values()[1], Cell::Text("blue".to_string()));

        let price = ds.column("price").unwrap();
        assert_eq!(price.values()[0], Cell::Number(10.0));
        assert!(price.values()[1].is_missing());
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        let result = DataLoader::new().load_auto(file.path());
        assert!(matches!(result, Err(SelectError::Data(_))));
    }
}
