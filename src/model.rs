//! ## Pipeline Orchestrator
//!
//! [`BikeshareModel`] couples the feature [`Pipeline`] with a [`Regressor`] and exposes one
//! `fit`/`transform`/`predict` surface. [`build_pipeline`] is the explicit builder that turns a
//! [`ModelConfig`] into a fresh, independently owned pipeline:
//!
//! `weekday_imputation` → `weathersit_imputation` → `outlier_transform` → `drop_columns` →
//! `preprocessor` (column groups: ordinal mapping and scaling).
//!
//! A fit either fully succeeds or leaves the model exactly as it was before the call.

use crate::config::ModelConfig;
use crate::data::frame_to_matrix;
use crate::estimator::{RandomForestRegressor, Regressor};
use crate::exceptions::{BikeshareError, BikeshareResult};
use crate::pipeline::{Pipeline, Stage};
use crate::transformers::categorical_encoding::Mapper;
use crate::transformers::column_groups::{ColumnGroup, ColumnGroupComposer};
use crate::transformers::feature_selection::ColumnDropper;
use crate::transformers::imputation::{WeathersitImputer, WeekdayImputer};
use crate::transformers::outlier_handling::OutlierHandler;
use crate::transformers::scaling::StandardScaler;
use datafusion::prelude::DataFrame;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Builds the feature pipeline described by the configuration.
pub fn build_pipeline(config: &ModelConfig) -> BikeshareResult<Pipeline> {
    config.validate()?;
    let mut groups = Vec::with_capacity(config.column_groups.len());
    for group in &config.column_groups {
        let mut steps: Vec<(String, Stage)> = Vec::new();
        if group.map_ordinals {
            for column in &group.columns {
                let mappings = config.ordinal_mappings.get(column).cloned().unwrap_or_default();
                steps.push((
                    format!("map_{}", column),
                    Mapper::new(column.clone(), mappings)?.into(),
                ));
            }
        }
        if group.scale {
            steps.push((
                format!("{}_scaler", group.name),
                StandardScaler::new(group.columns.clone()).into(),
            ));
        }
        groups.push(ColumnGroup::new(
            group.name.clone(),
            group.columns.clone(),
            Pipeline::new(steps, config.verbose),
        ));
    }

    let steps: Vec<(String, Stage)> = vec![
        (
            "weekday_imputation".to_string(),
            WeekdayImputer::new(config.weekday_var.clone(), config.date_var.clone()).into(),
        ),
        (
            "weathersit_imputation".to_string(),
            WeathersitImputer::new(config.weathersit_var.clone()).into(),
        ),
        (
            "outlier_transform".to_string(),
            OutlierHandler::new(
                config.num_features.clone(),
                config.lower_quantile,
                config.upper_quantile,
            )?
            .into(),
        ),
        (
            "drop_columns".to_string(),
            ColumnDropper::new(config.unused_fields.clone()).into(),
        ),
        (
            "preprocessor".to_string(),
            ColumnGroupComposer::new(groups, config.remainder)?.into(),
        ),
    ];
    Ok(Pipeline::new(steps, config.verbose))
}

/// Builds the forest described by the configuration.
pub fn build_estimator(config: &ModelConfig) -> RandomForestRegressor {
    RandomForestRegressor::new(config.n_estimators)
        .with_max_depth(config.max_depth)
        .with_min_samples_split(config.min_samples_split)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_random_state(config.random_state)
}

/// Lifecycle of a [`BikeshareModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitState {
    Unfit,
    Fitting,
    Fitted,
}

/// The feature pipeline followed by a regression estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BikeshareModel<R = RandomForestRegressor> {
    pipeline: Pipeline,
    estimator: R,
    state: FitState,
    /// Columns of the feature matrix seen at fit time, in order.
    feature_names: Vec<String>,
}

impl BikeshareModel<RandomForestRegressor> {
    /// Builds an unfitted model from configuration.
    pub fn from_config(config: &ModelConfig) -> BikeshareResult<Self> {
        Ok(Self::new(build_pipeline(config)?, build_estimator(config)))
    }
}

impl<R: Regressor> BikeshareModel<R> {
    pub fn new(pipeline: Pipeline, estimator: R) -> Self {
        Self {
            pipeline,
            estimator,
            state: FitState::Unfit,
            feature_names: Vec::new(),
        }
    }

    pub fn state(&self) -> FitState {
        self.state
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn estimator(&self) -> &R {
        &self.estimator
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Fits every stage on `x` in order, then the estimator on the final features and `y`.
    ///
    /// Stages and estimator are fitted on copies that replace the current ones only when
    /// everything succeeds; on failure the previous state is kept.
    pub async fn fit(&mut self, x: &DataFrame, y: &Array1<f64>) -> BikeshareResult<&mut Self> {
        let previous = self.state;
        self.state = FitState::Fitting;
        match self.fit_candidate(x, y).await {
            Ok((pipeline, estimator, feature_names)) => {
                self.pipeline = pipeline;
                self.estimator = estimator;
                self.feature_names = feature_names;
                self.state = FitState::Fitted;
                tracing::info!(features = self.feature_names.len(), "model fitted");
                Ok(self)
            }
            Err(e) => {
                self.state = previous;
                tracing::error!(error = %e, "model fit failed");
                Err(e)
            }
        }
    }

    async fn fit_candidate(
        &self,
        x: &DataFrame,
        y: &Array1<f64>,
    ) -> BikeshareResult<(Pipeline, R, Vec<String>)> {
        let mut pipeline = self.pipeline.clone();
        let features = pipeline.fit(x).await?;
        let (feature_names, matrix) = frame_to_matrix(features).await?;
        if matrix.nrows() != y.len() {
            return Err(BikeshareError::InvalidData(format!(
                "Feature frame has {} rows but target has {} values",
                matrix.nrows(),
                y.len()
            )));
        }
        let mut estimator = self.estimator.clone();
        estimator.fit(&matrix, y)?;
        Ok((pipeline, estimator, feature_names))
    }

    fn ensure_fitted(&self) -> BikeshareResult<()> {
        if self.state != FitState::Fitted || !self.estimator.is_fitted() {
            return Err(BikeshareError::NotFitted(format!(
                "BikeshareModel is {:?}",
                self.state
            )));
        }
        Ok(())
    }

    /// Applies the fitted stages (never refitting) and returns the feature frame.
    pub async fn transform(&self, x: DataFrame) -> BikeshareResult<DataFrame> {
        self.ensure_fitted()?;
        self.pipeline.transform(x).await
    }

    /// Transforms `x` and predicts one value per row.
    pub async fn predict(&self, x: DataFrame) -> BikeshareResult<Array1<f64>> {
        let features = self.transform(x).await?;
        let (names, matrix) = frame_to_matrix(features).await?;
        if names != self.feature_names {
            return Err(BikeshareError::InvalidData(format!(
                "Feature columns {:?} differ from those seen at fit time {:?}",
                names, self.feature_names
            )));
        }
        self.estimator.predict(&matrix)
    }
}
