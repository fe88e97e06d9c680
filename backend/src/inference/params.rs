//! Generation parameters

use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// Default maximum number of new tokens
pub const DEFAULT_MAX_LENGTH: u32 = 512;
/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default nucleus-sampling probability
pub const DEFAULT_TOP_P: f32 = 0.9;
/// Repetition penalty applied to every generation
pub const REPETITION_PENALTY: f32 = 1.1;

/// Validated sampling settings for one generation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum new tokens, 1..=2048
    pub max_length: u32,
    /// Sampling temperature, 0.1..=2.0
    pub temperature: f32,
    /// Nucleus sampling probability, 0.0..=1.0
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

impl GenerationParams {
    /// Fill in defaults for missing values and check ranges
    pub fn from_request(
        max_length: Option<u32>,
        temperature: Option<f32>,
        top_p: Option<f32>,
    ) -> Result<Self, AppError> {
        let params = Self {
            max_length: max_length.unwrap_or(DEFAULT_MAX_LENGTH),
            temperature: temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p: top_p.unwrap_or(DEFAULT_TOP_P),
        };
        params.validate()?;
        Ok(params)
    }

    /// Check every value is in range
    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=2048).contains(&self.max_length) {
            return Err(AppError::Validation(
                "max_length must be between 1 and 2048".to_string(),
            ));
        }
        if !(0.1..=2.0).contains(&self.temperature) {
            return Err(AppError::Validation(
                "temperature must be between 0.1 and 2.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(AppError::Validation(
                "top_p must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }
}
