//! ## Pipeline Persistence
//!
//! A fitted [`BikeshareModel`] is stored as a versioned JSON [`PipelineArtifact`] named
//! `<pipeline_save_file><version>.json` inside `trained_model_dir`. Saving a new artifact removes
//! every older one from that directory.

use crate::config::AppConfig;
use crate::exceptions::{BikeshareError, BikeshareResult};
use crate::model::{BikeshareModel, FitState};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The unit persisted and reloaded for inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub name: String,
    pub version: String,
    pub model: BikeshareModel,
}

/// File name of the artifact for the configured prefix and version.
pub fn artifact_file_name(app_config: &AppConfig) -> String {
    format!("{}{}.json", app_config.pipeline_save_file, app_config.version)
}

/// Persists a fitted model and returns the path of the written artifact.
pub fn save_pipeline(model: &BikeshareModel, app_config: &AppConfig) -> BikeshareResult<PathBuf> {
    if model.state() != FitState::Fitted {
        return Err(BikeshareError::NotFitted(
            "Only a fitted model can be persisted".to_string(),
        ));
    }
    let dir = Path::new(&app_config.trained_model_dir);
    fs::create_dir_all(dir)?;
    let file_name = artifact_file_name(app_config);
    let path = dir.join(&file_name);

    let artifact = PipelineArtifact {
        name: app_config.pipeline_name.clone(),
        version: app_config.version.clone(),
        model: model.clone(),
    };
    fs::write(&path, serde_json::to_vec(&artifact)?)?;
    remove_old_pipelines(dir, &[file_name.as_str()])?;
    tracing::info!(path = %path.display(), "pipeline saved");
    Ok(path)
}

/// Loads an artifact written by [`save_pipeline`].
pub fn load_pipeline(path: impl AsRef<Path>) -> BikeshareResult<PipelineArtifact> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let artifact: PipelineArtifact = serde_json::from_slice(&bytes)?;
    tracing::info!(
        path = %path.display(),
        name = %artifact.name,
        version = %artifact.version,
        "pipeline loaded"
    );
    Ok(artifact)
}

/// Removes every JSON artifact in `dir` whose file name is not in `keep`.
pub fn remove_old_pipelines(dir: &Path, keep: &[&str]) -> BikeshareResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_artifact = path.is_file() && path.extension().is_some_and(|ext| ext == "json");
        let kept = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| keep.contains(&name));
        if is_artifact && !kept {
            fs::remove_file(&path)?;
            tracing::debug!(path = %path.display(), "old pipeline removed");
        }
    }
    Ok(())
}
