use polars::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::CleaningError;

pub const PRICE_COLUMN: &str = "price";
pub const LONGITUDE_COLUMN: &str = "longitude";
pub const LATITUDE_COLUMN: &str = "latitude";

/// Closed interval `[low, high]`. A NaN bound or value never matches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InclusiveRange {
    pub low: f64,
    pub high: f64,
}

impl InclusiveRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }

    /// True when no value can satisfy the range (inverted or NaN bounds).
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn is_empty(&self) -> bool {
        !(self.low <= self.high)
    }
}

/// Caller-supplied price window. `min > max` is accepted and keeps nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceBounds {
    pub min: f64,
    pub max: f64,
}

impl PriceBounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn range(&self) -> InclusiveRange {
        InclusiveRange::new(self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBox {
    pub longitude: InclusiveRange,
    pub latitude: InclusiveRange,
}

impl GeoBox {
    /// New York City.
    pub const NYC: GeoBox = GeoBox {
        longitude: InclusiveRange::new(-74.25, -73.50),
        latitude: InclusiveRange::new(40.5, 41.2),
    };

    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        self.longitude.contains(longitude) && self.latitude.contains(latitude)
    }
}

/// Row counts observed at each filtering step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub after_price_rows: usize,
    pub output_rows: usize,
}

impl CleaningReport {
    pub fn dropped_rows(&self) -> usize {
        self.input_rows - self.output_rows
    }
}

/// Keep rows whose price lies in `bounds`, inclusive at both ends.
pub fn filter_price(df: &DataFrame, bounds: &PriceBounds) -> Result<DataFrame, CleaningError> {
    let range = bounds.range();
    let price = numeric_values(df, PRICE_COLUMN)?;
    let price = price.f64()?;

    let mask: BooleanChunked = price
        .into_iter()
        .map(|value| value.is_some_and(|v| range.contains(v)))
        .collect();

    Ok(df.filter(&mask)?)
}

/// Keep rows whose coordinates lie inside `bbox`, inclusive at the edges.
pub fn filter_geo(df: &DataFrame, bbox: &GeoBox) -> Result<DataFrame, CleaningError> {
    let longitude = numeric_values(df, LONGITUDE_COLUMN)?;
    let latitude = numeric_values(df, LATITUDE_COLUMN)?;
    let longitude = longitude.f64()?;
    let latitude = latitude.f64()?;

    let mask: BooleanChunked = longitude
        .into_iter()
        .zip(latitude.into_iter())
        .map(|pair| match pair {
            (Some(lon), Some(lat)) => bbox.contains(lon, lat),
            _ => false,
        })
        .collect();

    Ok(df.filter(&mask)?)
}

/// Price filter followed by the fixed NYC bounding-box filter.
pub fn clean_listings(
    df: &DataFrame,
    bounds: &PriceBounds,
) -> Result<(DataFrame, CleaningReport), CleaningError> {
    if bounds.range().is_empty() {
        warn!(
            min_price = bounds.min,
            max_price = bounds.max,
            "price bounds admit no value; output will be empty"
        );
    }

    let input_rows = df.height();
    let priced = filter_price(df, bounds)?;
    let after_price_rows = priced.height();
    info!(
        rows_before = input_rows,
        rows_after = after_price_rows,
        "applied price filter"
    );

    let located = filter_geo(&priced, &GeoBox::NYC)?;
    let output_rows = located.height();
    info!(
        rows_before = after_price_rows,
        rows_after = output_rows,
        "applied geographic filter"
    );

    Ok((
        located,
        CleaningReport {
            input_rows,
            after_price_rows,
            output_rows,
        },
    ))
}

/// Float64 view of a filter column. Columns holding no values at all (a
/// header-only file, or every cell blank) are accepted whatever dtype the
/// reader guessed.
fn numeric_values(df: &DataFrame, name: &'static str) -> Result<Column, CleaningError> {
    let column = df
        .column(name)
        .map_err(|_| CleaningError::MissingColumn(name))?;
    let dtype = column.dtype();

    let numeric = dtype.is_float() || dtype.is_integer();
    if !numeric && column.null_count() != column.len() {
        return Err(CleaningError::NonNumericColumn {
            column: name,
            dtype: dtype.to_string(),
        });
    }

    Ok(column.cast(&DataType::Float64)?)
}
