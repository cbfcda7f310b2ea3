//! ## Training Driver
//!
//! Loads the dataset, splits it with a seeded shuffle, fits the model on the train partition,
//! scores it on the test partition and persists the fitted model. Nothing is persisted unless the
//! whole fit succeeds.

use crate::config::Config;
use crate::data::{
    features_and_target, load_dataset, new_context, pre_pipeline_preparation, train_test_split,
};
use crate::exceptions::{BikeshareError, BikeshareResult};
use crate::metrics::{mean_squared_error, r2_score};
use crate::model::BikeshareModel;
use crate::persistence::save_pipeline;
use crate::transformers::validate_columns;
use datafusion::prelude::DataFrame;
use std::path::PathBuf;

/// Outcome of one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub r2: f64,
    pub mse: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub artifact_path: PathBuf,
}

/// Trains on the configured training file.
pub async fn run_training(config: &Config) -> BikeshareResult<TrainingReport> {
    config.validate()?;
    let ctx = new_context();
    let data = load_dataset(&ctx, &config.app_config.training_data_file).await?;
    train_and_persist(data, config).await
}

/// Trains on an already loaded raw frame.
///
/// Fails fast when a configured column is absent or the frame has no rows.
pub async fn train_and_persist(data: DataFrame, config: &Config) -> BikeshareResult<TrainingReport> {
    config.validate()?;
    let model_config = &config.model_config;
    validate_columns(&data, &model_config.required_columns())?;
    if data.clone().count().await? == 0 {
        return Err(BikeshareError::EmptyDataset(
            "The training dataset has no rows".to_string(),
        ));
    }

    let prepared = pre_pipeline_preparation(data, model_config)?;
    let (train, test) =
        train_test_split(prepared, model_config.test_size, model_config.random_state).await?;
    let (x_train, y_train) = features_and_target(train, model_config).await?;
    let (x_test, y_test) = features_and_target(test, model_config).await?;

    tracing::info!(rows = y_train.len(), "training the model");
    let mut model = BikeshareModel::from_config(model_config)?;
    model.fit(&x_train, &y_train).await?;

    tracing::info!(rows = y_test.len(), "testing the model");
    let y_pred = model.predict(x_test).await?;
    let r2 = r2_score(&y_test, &y_pred)?;
    let mse = mean_squared_error(&y_test, &y_pred)?;

    let artifact_path = save_pipeline(&model, &config.app_config)?;
    tracing::info!(r2, mse, path = %artifact_path.display(), "training finished");
    Ok(TrainingReport {
        r2,
        mse,
        n_train: y_train.len(),
        n_test: y_test.len(),
        artifact_path,
    })
}
