//! # Bike-Share Model
//!
//! A bike-share demand regressor built on Apache DataFusion. Raw rental records flow through a
//! feature pipeline whose transformers learn their state from training data only and then apply
//! it unchanged to any later frame:
//!
//! raw frame → imputers → outlier handler → column dropper → column groups (ordinal mapping and
//! scaling) → random forest.
//!
//! The fitted pipeline and estimator are persisted together as one versioned JSON artifact.
//!
//! ### Example
//!
//! ```rust,no_run
//! use bikeshare_model::config::Config;
//! use bikeshare_model::train_pipeline::run_training;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = run_training(&Config::default()).await?;
//!     println!("R2 score: {}", report.r2);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data;
pub mod estimator;
pub mod exceptions;
mod logging;
pub mod metrics;
pub mod model;
pub mod persistence;
pub mod pipeline;
pub mod train_pipeline;
pub mod transformers;
