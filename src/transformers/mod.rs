//! # Transformer Implementations
//!
//! The submodules contain the transformers of the bike-share feature pipeline, in the order
//! the default pipeline applies them: imputation, outlier handling, column dropping, and the
//! column-group composer (ordinal mapping and scaling).

pub mod categorical_encoding;
pub mod column_groups;
pub mod feature_selection;
pub mod imputation;
pub mod outlier_handling;
pub mod scaling;

use crate::exceptions::{BikeshareError, BikeshareResult};
use datafusion::arrow::array::{Array, Float64Array};
use datafusion::arrow::datatypes::DataType;
use datafusion::logical_expr::{cast, col};
use datafusion::prelude::*;

/// Validates that every column in `target_cols` exists in the DataFrame.
/// Returns an `UnknownColumn` error naming the first missing column.
pub(crate) fn validate_columns(df: &DataFrame, target_cols: &[String]) -> BikeshareResult<()> {
    let schema = df.schema();
    for col_name in target_cols {
        if schema.field_with_name(None, col_name).is_err() {
            return Err(BikeshareError::UnknownColumn(format!(
                "Column '{}' not found in DataFrame",
                col_name
            )));
        }
    }
    Ok(())
}

/// Returns the data type of a column, or `UnknownColumn` if it is absent.
pub(crate) fn column_type(df: &DataFrame, col_name: &str) -> BikeshareResult<DataType> {
    df.schema()
        .field_with_name(None, col_name)
        .map(|field| field.data_type().clone())
        .map_err(|_| {
            BikeshareError::UnknownColumn(format!("Column '{}' not found in DataFrame", col_name))
        })
}

/// Materializes one column as `f64`, skipping nulls and NaNs.
pub(crate) async fn collect_f64_values(df: &DataFrame, col_name: &str) -> BikeshareResult<Vec<f64>> {
    let batches = df
        .clone()
        .select(vec![cast(col(col_name), DataType::Float64).alias(col_name)])?
        .collect()
        .await?;
    let mut values = Vec::new();
    for batch in &batches {
        let array = batch
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| {
                BikeshareError::InvalidData(format!("Expected Float64 array for column {}", col_name))
            })?;
        values.extend(array.iter().flatten().filter(|v| !v.is_nan()));
    }
    Ok(values)
}

/// Returns true for the string types a categorical column may be stored as.
pub(crate) fn is_string_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}
