//! ## Bike-Share Feature Pipeline
//!
//! This module provides the core abstractions for fitting and applying chains of column
//! transformers.
//!
//! ### Overview
//!
//! - The [`Transformer`] trait is the shared contract of every transformer: `fit` learns state
//!   from training data only, and `transform` applies that state to any frame without refitting.
//! - The [`Stage`] enum is the tagged set of transformers a pipeline can hold. Dispatch is a
//!   plain `match`, and the enum is what gets serialized into a pipeline artifact.
//! - The [`Pipeline`] struct chains stages; each stage consumes the previous stage's output.
//! - Macros [`crate::impl_transformer`] and [`crate::make_pipeline`] simplify implementing the trait
//!   and building pipelines.

use crate::exceptions::{BikeshareError, BikeshareResult};
use crate::transformers::categorical_encoding::Mapper;
use crate::transformers::column_groups::ColumnGroupComposer;
use crate::transformers::feature_selection::ColumnDropper;
use crate::transformers::imputation::{WeathersitImputer, WeekdayImputer};
use crate::transformers::outlier_handling::OutlierHandler;
use crate::transformers::scaling::StandardScaler;
use async_trait::async_trait;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Trait for components used in the feature pipeline.
///
/// Every transformer must provide a `fit` method (which may collect data to compute its state)
/// and a `transform` method. `transform` returns a new DataFrame and never mutates its input;
/// it may run validation queries, which is why it is asynchronous.
#[async_trait]
pub trait Transformer {
    /// Fit the transformer given a DataFrame.
    ///
    /// # Arguments
    ///
    /// * `df` - The training DataFrame.
    ///
    /// # Returns
    ///
    /// * `BikeshareResult<()>` - Returns Ok if successful, or an error otherwise.
    async fn fit(&mut self, df: &DataFrame) -> BikeshareResult<()>;

    /// Transform the input DataFrame using only the state captured by `fit`.
    ///
    /// # Arguments
    ///
    /// * `df` - The input DataFrame.
    ///
    /// # Returns
    ///
    /// * `BikeshareResult<DataFrame>` - The transformed DataFrame or an error if transformation fails.
    async fn transform(&self, df: DataFrame) -> BikeshareResult<DataFrame>;

    /// Returns true if the transformer is stateful (i.e. requires a call to fit before transform can be called).
    fn is_stateful(&self) -> bool;
}

/// Macro to implement the [`Transformer`] trait for the bike-share transformers.
///
/// The type must already have inherent methods:
/// - `async fn fit(&mut self, &DataFrame) -> BikeshareResult<()>`
/// - `async fn transform(&self, DataFrame) -> BikeshareResult<DataFrame>`
/// - **`fn inherent_is_stateful(&self) -> bool`**
///
/// # Example
///
/// ```rust,no_run
/// use bikeshare_model::exceptions::BikeshareResult;
/// use datafusion::prelude::DataFrame;
/// use bikeshare_model::impl_transformer;
///
/// pub struct Passthrough;
///
/// impl Passthrough {
///     pub async fn fit(&mut self, _df: &DataFrame) -> BikeshareResult<()> {
///         Ok(())
///     }
///
///     pub async fn transform(&self, df: DataFrame) -> BikeshareResult<DataFrame> {
///         Ok(df)
///     }
///
///     pub fn inherent_is_stateful(&self) -> bool {
///         false
///     }
/// }
///
/// impl_transformer!(Passthrough);
/// ```
#[macro_export]
macro_rules! impl_transformer {
    ($ty:ty) => {
        #[async_trait::async_trait]
        impl $crate::pipeline::Transformer for $ty {
            async fn fit(
                &mut self,
                df: &datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::BikeshareResult<()> {
                <$ty>::fit(self, df).await
            }
            async fn transform(
                &self,
                df: datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::BikeshareResult<datafusion::prelude::DataFrame> {
                <$ty>::transform(self, df).await
            }
            fn is_stateful(&self) -> bool {
                <$ty>::inherent_is_stateful(self)
            }
        }
    };
}

/// One step of a pipeline.
///
/// Each variant owns its configuration and, once fitted, its learned state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stage {
    WeekdayImputer(WeekdayImputer),
    WeathersitImputer(WeathersitImputer),
    OutlierHandler(OutlierHandler),
    ColumnDropper(ColumnDropper),
    Mapper(Mapper),
    StandardScaler(StandardScaler),
    ColumnGroups(ColumnGroupComposer),
}

macro_rules! stage_from {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for Stage {
                fn from(transformer: $variant) -> Self {
                    Stage::$variant(transformer)
                }
            }
        )+
    };
}

stage_from!(
    WeekdayImputer,
    WeathersitImputer,
    OutlierHandler,
    ColumnDropper,
    Mapper,
    StandardScaler,
);

impl From<ColumnGroupComposer> for Stage {
    fn from(composer: ColumnGroupComposer) -> Self {
        Stage::ColumnGroups(composer)
    }
}

impl Stage {
    /// Short name of the transformer held by this stage.
    pub fn kind(&self) -> &'static str {
        match self {
            Stage::WeekdayImputer(_) => "WeekdayImputer",
            Stage::WeathersitImputer(_) => "WeathersitImputer",
            Stage::OutlierHandler(_) => "OutlierHandler",
            Stage::ColumnDropper(_) => "ColumnDropper",
            Stage::Mapper(_) => "Mapper",
            Stage::StandardScaler(_) => "StandardScaler",
            Stage::ColumnGroups(_) => "ColumnGroupComposer",
        }
    }
}

#[async_trait]
impl Transformer for Stage {
    async fn fit(&mut self, df: &DataFrame) -> BikeshareResult<()> {
        match self {
            Stage::WeekdayImputer(t) => Transformer::fit(t, df).await,
            Stage::WeathersitImputer(t) => Transformer::fit(t, df).await,
            Stage::OutlierHandler(t) => Transformer::fit(t, df).await,
            Stage::ColumnDropper(t) => Transformer::fit(t, df).await,
            Stage::Mapper(t) => Transformer::fit(t, df).await,
            Stage::StandardScaler(t) => Transformer::fit(t, df).await,
            Stage::ColumnGroups(t) => Transformer::fit(t, df).await,
        }
    }

    async fn transform(&self, df: DataFrame) -> BikeshareResult<DataFrame> {
        match self {
            Stage::WeekdayImputer(t) => Transformer::transform(t, df).await,
            Stage::WeathersitImputer(t) => Transformer::transform(t, df).await,
            Stage::OutlierHandler(t) => Transformer::transform(t, df).await,
            Stage::ColumnDropper(t) => Transformer::transform(t, df).await,
            Stage::Mapper(t) => Transformer::transform(t, df).await,
            Stage::StandardScaler(t) => Transformer::transform(t, df).await,
            Stage::ColumnGroups(t) => Transformer::transform(t, df).await,
        }
    }

    fn is_stateful(&self) -> bool {
        match self {
            Stage::WeekdayImputer(t) => t.is_stateful(),
            Stage::WeathersitImputer(t) => t.is_stateful(),
            Stage::OutlierHandler(t) => t.is_stateful(),
            Stage::ColumnDropper(t) => t.is_stateful(),
            Stage::Mapper(t) => t.is_stateful(),
            Stage::StandardScaler(t) => t.is_stateful(),
            Stage::ColumnGroups(t) => t.is_stateful(),
        }
    }
}

/// A pipeline that chains a sequence of stages.
///
/// Each stage's output is passed as input to the next stage. A failing stage aborts the whole
/// call; its error is returned unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    steps: Vec<(String, Stage)>,
    verbose: bool,
}

impl Pipeline {
    /// Creates a new pipeline.
    ///
    /// # Arguments
    ///
    /// * `steps` - A vector of (name, stage) pairs.
    /// * `verbose` - If true, step timings are logged at INFO level instead of DEBUG.
    pub fn new(steps: Vec<(String, Stage)>, verbose: bool) -> Self {
        Self { steps, verbose }
    }

    /// The (name, stage) pairs of this pipeline, in execution order.
    pub fn steps(&self) -> &[(String, Stage)] {
        &self.steps
    }

    /// Looks up a stage by its step name.
    pub fn step(&self, name: &str) -> Option<&Stage> {
        self.steps
            .iter()
            .find(|(step_name, _)| step_name == name)
            .map(|(_, stage)| stage)
    }

    fn ensure_not_empty(&self) -> BikeshareResult<()> {
        if self.steps.is_empty() {
            return Err(BikeshareError::InvalidConfig(
                "Pipeline must have at least one transformer.".to_string(),
            ));
        }
        Ok(())
    }

    /// Fits each stage (sequentially) on the output of the previous one and returns the
    /// transformed DataFrame.
    pub async fn fit(&mut self, df: &DataFrame) -> BikeshareResult<DataFrame> {
        self.ensure_not_empty()?;
        let verbose = self.verbose;
        let mut current_df = df.clone();
        for (name, step) in self.steps.iter_mut() {
            let start = Instant::now();
            if let Err(e) = step.fit(&current_df).await {
                tracing::error!(step = %name, error = %e, "fitting failed");
                return Err(e);
            }
            current_df = match step.transform(current_df).await {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(step = %name, error = %e, "transform failed while fitting");
                    return Err(e);
                }
            };
            log_step(verbose, "fitted", name, start.elapsed());
        }
        Ok(current_df)
    }

    /// Applies the `transform` method of each stage (without fitting).
    pub async fn transform(&self, df: DataFrame) -> BikeshareResult<DataFrame> {
        self.ensure_not_empty()?;
        let mut current_df = df;
        for (name, step) in self.steps.iter() {
            let start = Instant::now();
            current_df = match step.transform(current_df).await {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(step = %name, error = %e, "transform failed");
                    return Err(e);
                }
            };
            log_step(self.verbose, "applied", name, start.elapsed());
        }
        Ok(current_df)
    }

    /// Convenience method to call `fit` and then return the final transformed DataFrame.
    pub async fn fit_transform(&mut self, df: &DataFrame) -> BikeshareResult<DataFrame> {
        self.fit(df).await
    }
}

fn log_step(verbose: bool, action: &str, name: &str, elapsed: Duration) {
    if verbose {
        tracing::info!(step = %name, ?elapsed, "{} step", action);
    } else {
        tracing::debug!(step = %name, ?elapsed, "{} step", action);
    }
}

/// Macro to simplify pipeline creation by converting each transformer into a [`Stage`].
///
/// # Example
///
/// ```rust,no_run
/// use bikeshare_model::make_pipeline;
/// use bikeshare_model::transformers::imputation::WeathersitImputer;
///
/// let pipeline = make_pipeline!(false,
///     ("weathersit_imputation", WeathersitImputer::new("weathersit")),
/// );
/// ```
#[macro_export]
macro_rules! make_pipeline {
    ($verbose:expr, $(($name:expr, $transformer:expr)),+ $(,)?) => {
        {
            let steps: Vec<(String, $crate::pipeline::Stage)> = vec![
                $(
                    ($name.to_string(), $crate::pipeline::Stage::from($transformer)),
                )+
            ];
            $crate::pipeline::Pipeline::new(steps, $verbose)
        }
    };
}
