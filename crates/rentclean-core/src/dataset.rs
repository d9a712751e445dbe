use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use polars::prelude::*;
use tracing::debug;

use crate::cleaning::{LATITUDE_COLUMN, LONGITUDE_COLUMN, PRICE_COLUMN};
use crate::error::CleaningError;

/// Cell values read as missing in the price and coordinate columns. These are
/// the placeholders pandas treats as NA by default.
pub const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Load a headered CSV file. Schema inference scans every row so a late
/// fractional value does not break an integer-looking column.
///
/// Missing-value placeholders in the filter columns become nulls; every other
/// column is left exactly as read.
pub fn read_csv(path: &Path) -> Result<DataFrame, CleaningError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    for name in [PRICE_COLUMN, LONGITUDE_COLUMN, LATITUDE_COLUMN] {
        null_missing_tokens(&mut df, name)?;
    }

    debug!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "loaded csv"
    );
    Ok(df)
}

/// Write `df` as CSV with a single header row and no index column.
pub fn write_csv(df: &DataFrame, path: &Path) -> Result<(), CleaningError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let mut frame = df.clone();

    CsvWriter::new(&mut writer)
        .include_header(true)
        .finish(&mut frame)?;
    writer.flush()?;

    debug!(path = %path.display(), rows = df.height(), "wrote csv");
    Ok(())
}

/// Re-type a text column whose values are all numbers or missing tokens.
/// Columns holding any other text are left alone for the filters to reject.
fn null_missing_tokens(df: &mut DataFrame, name: &str) -> Result<(), CleaningError> {
    let Ok(column) = df.column(name) else {
        return Ok(());
    };
    if !matches!(column.dtype(), DataType::String) {
        return Ok(());
    }

    let values: Vec<Option<&str>> = column
        .str()?
        .into_iter()
        .map(|value| value.map(str::trim).filter(|v| !MISSING_TOKENS.contains(v)))
        .collect();

    let ints: Option<Vec<Option<i64>>> = values
        .iter()
        .map(|value| value.map(str::parse::<i64>).transpose().ok())
        .collect();
    let retyped = match ints {
        Some(ints) => Int64Chunked::from_iter_options(name.into(), ints.into_iter()).into_series(),
        None => {
            let floats: Option<Vec<Option<f64>>> = values
                .iter()
                .map(|value| value.map(str::parse::<f64>).transpose().ok())
                .collect();
            match floats {
                Some(floats) => {
                    Float64Chunked::from_iter_options(name.into(), floats.into_iter())
                        .into_series()
                }
                None => return Ok(()),
            }
        }
    };

    let missing = retyped.null_count();
    df.with_column(retyped)?;
    debug!(column = name, missing, "treated placeholder values as missing");
    Ok(())
}
