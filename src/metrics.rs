//! Regression metrics used to score a trained pipeline.

use crate::exceptions::{BikeshareError, BikeshareResult};
use ndarray::Array1;

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> BikeshareResult<()> {
    if y_true.is_empty() {
        return Err(BikeshareError::InvalidData(
            "Cannot score an empty prediction".to_string(),
        ));
    }
    if y_true.len() != y_pred.len() {
        return Err(BikeshareError::InvalidData(format!(
            "y_true has {} values but y_pred has {}",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

/// Mean of the squared residuals.
pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> BikeshareResult<f64> {
    check_lengths(y_true, y_pred)?;
    let residuals = y_true - y_pred;
    Ok(residuals.mapv(|r| r * r).sum() / y_true.len() as f64)
}

/// Coefficient of determination, `1 - SS_res / SS_tot`.
///
/// When `y_true` is constant, the score is 1.0 for a perfect prediction and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> BikeshareResult<f64> {
    check_lengths(y_true, y_pred)?;
    let mean = y_true.sum() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|v| (v - mean) * (v - mean)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}
