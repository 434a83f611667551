//! Contract checks on resolved values.
//!
//! Violations are programming errors: they are reported, never clamped.

use crate::error::InvariantViolation;

pub fn check_propensity(value: f64) -> Result<f64, InvariantViolation> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(InvariantViolation::PropensityOutOfRange { value })
    }
}

pub fn check_outcome(value: f64) -> Result<f64, InvariantViolation> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InvariantViolation::NonFiniteOutcome { value })
    }
}

/// Check covariates against their column names.
pub fn check_covariates(names: &[String], values: &[f64]) -> Result<(), InvariantViolation> {
    for (name, value) in names.iter().zip(values) {
        if !value.is_finite() {
            return Err(InvariantViolation::NonFiniteCovariate {
                column: name.clone(),
                value: *value,
            });
        }
    }
    Ok(())
}
