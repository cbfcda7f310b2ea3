//! ## Custom Errors for the Bike-Share Model
//!
//! This module defines the error type shared by every transformer, the pipeline orchestrator,
//! and the training driver. It uses the `thiserror` crate to derive the `Error` trait.
//!
//! Errors are raised where they are detected and bubble up unchanged: no stage recovers
//! locally, and no error is turned into a silent null.
//!
//! The `BikeshareResult` type alias simplifies error handling by providing a convenient
//! alias for results returned by the library.
//!
//! ### Example
//!
//! ```rust
//! use bikeshare_model::exceptions::{BikeshareError, BikeshareResult};
//!
//! fn lookup(value: &str) -> BikeshareResult<i64> {
//!     Err(BikeshareError::Mapping {
//!         column: "season".into(),
//!         value: value.into(),
//!     })
//! }
//! ```

use thiserror::Error;

/// Errors specific to the bike-share model.
#[derive(Debug, Error)]
pub enum BikeshareError {
    /// Wraps underlying I/O errors.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Wraps errors from DataFusion.
    #[error("DataFusion error: {0}")]
    DataFusionError(#[from] datafusion::error::DataFusionError),

    /// Wraps errors from Arrow.
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Wraps (de)serialization errors of configuration files and pipeline artifacts.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Malformed constructor arguments or configuration (out-of-range quantiles, overlapping groups, ...).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// `transform` or `predict` was called before `fit`.
    #[error("Not fitted: {0}")]
    NotFitted(String),

    /// A row being imputed lacks the value of the column the imputation depends on.
    #[error("Cannot impute column '{column}': {rows} row(s) have no value in '{dependency}'")]
    MissingDependency {
        column: String,
        dependency: String,
        rows: usize,
    },

    /// A referenced column is absent from the frame.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A value has no entry in an ordinal mapping table.
    #[error("No mapping for value '{value}' in column '{column}'")]
    Mapping { column: String, value: String },

    /// The dataset has no rows.
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// The data cannot be used as-is (wrong type, nulls in the feature matrix, shape mismatch).
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// A convenient result type for bike-share model operations.
pub type BikeshareResult<T> = std::result::Result<T, BikeshareError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test io error");
        let err: BikeshareError = io_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("I/O error:"));
        assert!(err_msg.contains("test io error"));
    }

    #[test]
    fn test_datafusion_error() {
        let df_err = datafusion::error::DataFusionError::Plan("test plan error".into());
        let err: BikeshareError = df_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("DataFusion error:"));
        assert!(err_msg.contains("test plan error"));
    }

    #[test]
    fn test_serialization_error() {
        let serde_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: BikeshareError = serde_err.into();
        assert!(format!("{}", err).contains("Serialization error:"));
    }

    #[test]
    fn test_missing_dependency_error() {
        let err = BikeshareError::MissingDependency {
            column: "weekday".into(),
            dependency: "dteday".into(),
            rows: 2,
        };
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("'weekday'"));
        assert!(err_msg.contains("2 row(s)"));
        assert!(err_msg.contains("'dteday'"));
    }

    #[test]
    fn test_mapping_error_names_value_and_column() {
        let err = BikeshareError::Mapping {
            column: "season".into(),
            value: "autumn".into(),
        };
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("'autumn'"));
        assert!(err_msg.contains("'season'"));
    }

    #[test]
    fn test_not_fitted_error() {
        let err = BikeshareError::NotFitted("OutlierHandler".into());
        assert_eq!(format!("{}", err), "Not fitted: OutlierHandler");
    }
}
