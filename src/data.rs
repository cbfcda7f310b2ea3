//! ## Data Management
//!
//! Loading, preparation and partitioning of record frames, and the conversions between frames,
//! Arrow record batches and the `ndarray` matrices consumed by the estimator.
//!
//! Every session created here runs with a single target partition: rows keep their positional
//! identity through every projection, collection and split.

use crate::config::ModelConfig;
use crate::exceptions::{BikeshareError, BikeshareResult};
use crate::transformers::column_type;
use arrow::array::{Array, Float64Array, UInt32Array};
use arrow::compute::{concat_batches, take_record_batch};
use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use datafusion_expr::{cast, col, lit, Expr};
use datafusion::prelude::*;
use datafusion_functions::datetime::{date_part, to_char};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;

/// Creates a session whose plans preserve row order.
pub fn new_context() -> SessionContext {
    SessionContext::new_with_config(SessionConfig::new().with_target_partitions(1))
}

/// Loads data from a given path and detects the format (CSV or Parquet) from the extension.
pub async fn load_dataset(ctx: &SessionContext, path: &str) -> BikeshareResult<DataFrame> {
    let extension = Path::new(path).extension().and_then(|ext| ext.to_str());
    let df = match extension {
        Some("csv") => ctx.read_csv(path, CsvReadOptions::new()).await?,
        Some("parquet") => ctx.read_parquet(path, Default::default()).await?,
        _ => {
            return Err(BikeshareError::InvalidConfig(format!(
                "Unsupported file format for '{}'. Please provide a CSV or Parquet file.",
                path
            )))
        }
    };
    tracing::info!(path = %path, "dataset loaded");
    Ok(df)
}

/// Casts the date column to `Date32` and derives the year and month-name columns from it.
///
/// Existing year and month columns are replaced so that both always agree with the date.
pub fn pre_pipeline_preparation(df: DataFrame, config: &ModelConfig) -> BikeshareResult<DataFrame> {
    column_type(&df, &config.date_var)?;
    let date = cast(col(&config.date_var), DataType::Date32);
    let mut exprs: Vec<Expr> = df
        .schema()
        .fields()
        .iter()
        .filter(|field| field.name() != &config.yr_var && field.name() != &config.mnth_var)
        .map(|field| {
            let name = field.name();
            if name == &config.date_var {
                date.clone().alias(name)
            } else {
                col(name)
            }
        })
        .collect();
    exprs.push(
        cast(
            date_part().call(vec![lit("year"), date.clone()]),
            DataType::Int64,
        )
        .alias(&config.yr_var),
    );
    exprs.push(
        to_char()
            .call(vec![date, lit("%B")])
            .alias(&config.mnth_var),
    );
    df.select(exprs).map_err(BikeshareError::from)
}

/// Names of the columns of a frame, in order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect()
}

/// Executes the frame and concatenates its output into one record batch.
pub async fn collect_batch(df: DataFrame) -> BikeshareResult<RecordBatch> {
    let logical_schema: SchemaRef = df.schema().inner().clone();
    let batches = df.collect().await?;
    let schema = batches
        .first()
        .map(|batch| batch.schema())
        .unwrap_or(logical_schema);
    Ok(concat_batches(&schema, &batches)?)
}

/// Wraps a record batch into a new frame that shares the session of `like`.
pub fn frame_from_batch(like: &DataFrame, batch: RecordBatch) -> BikeshareResult<DataFrame> {
    let (state, _) = like.clone().into_parts();
    SessionContext::new_with_state(state)
        .read_batch(batch)
        .map_err(BikeshareError::from)
}

/// Extracts a column as `f64` values. Nulls (including values that cannot be cast) are an error.
pub fn numeric_column(batch: &RecordBatch, name: &str) -> BikeshareResult<Vec<f64>> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| BikeshareError::UnknownColumn(format!("Column '{}' not found", name)))?;
    let casted = arrow::compute::cast(column, &DataType::Float64)?;
    let array = casted
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| {
            BikeshareError::InvalidData(format!("Expected Float64 array for column {}", name))
        })?;
    if array.null_count() > 0 {
        return Err(BikeshareError::InvalidData(format!(
            "Column '{}' has {} missing or non-numeric value(s)",
            name,
            array.null_count()
        )));
    }
    Ok(array.values().to_vec())
}

/// Materializes a frame as a row-major `f64` matrix together with its column names.
pub async fn frame_to_matrix(df: DataFrame) -> BikeshareResult<(Vec<String>, Array2<f64>)> {
    let batch = collect_batch(df).await?;
    let names: Vec<String> = batch
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect();
    let mut matrix = Array2::zeros((batch.num_rows(), names.len()));
    for (j, name) in names.iter().enumerate() {
        let values = numeric_column(&batch, name)?;
        matrix.column_mut(j).assign(&ndarray::ArrayView1::from(&values));
    }
    Ok((names, matrix))
}

/// Splits a frame into (train, test) partitions with a seeded shuffle.
///
/// The test partition holds `ceil(n * test_size)` rows; the same seed always yields the same
/// partitions for the same input.
pub async fn train_test_split(
    df: DataFrame,
    test_size: f64,
    seed: u64,
) -> BikeshareResult<(DataFrame, DataFrame)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(BikeshareError::InvalidConfig(format!(
            "test_size {} must be strictly between 0 and 1",
            test_size
        )));
    }
    let batch = collect_batch(df.clone()).await?;
    let n_rows = batch.num_rows();
    if n_rows == 0 {
        return Err(BikeshareError::EmptyDataset(
            "Cannot split a dataset with no rows".to_string(),
        ));
    }
    let n_test = (n_rows as f64 * test_size).ceil() as usize;
    if n_test >= n_rows {
        return Err(BikeshareError::EmptyDataset(format!(
            "{} row(s) leave no training rows with test_size {}",
            n_rows, test_size
        )));
    }

    let mut indices: Vec<u32> = (0..n_rows as u32).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let (test_indices, train_indices) = indices.split_at(n_test);

    let train = take_record_batch(&batch, &UInt32Array::from(train_indices.to_vec()))?;
    let test = take_record_batch(&batch, &UInt32Array::from(test_indices.to_vec()))?;
    tracing::info!(train = train.num_rows(), test = test.num_rows(), seed, "dataset split");
    Ok((frame_from_batch(&df, train)?, frame_from_batch(&df, test)?))
}

/// Separates a prepared frame into the feature frame (configured feature columns, in order) and
/// the numeric target vector.
pub async fn features_and_target(
    df: DataFrame,
    config: &ModelConfig,
) -> BikeshareResult<(DataFrame, Array1<f64>)> {
    let features: Vec<&str> = config.features.iter().map(String::as_str).collect();
    let x = df.clone().select_columns(&features)?;
    let target = collect_batch(df.select_columns(&[config.target.as_str()])?).await?;
    let y = Array1::from_vec(numeric_column(&target, &config.target)?);
    Ok((x, y))
}
