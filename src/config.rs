//! Sweep configuration for the bundled binary.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use crate::params::{linspace, ParamMap};
use crate::sweep::SweepOptions;
use crate::FaultError;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    #[serde_as(as = "DefaultOnNull")]
    pub base_seed: u64,
    #[serde_as(as = "DefaultOnNull")]
    pub parallel: bool,
    #[serde_as(as = "DefaultOnNull")]
    pub rows: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub cols: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub num_std: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub std_min: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub std_max: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub num_prob: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub prob_min: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub prob_max: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            base_seed: SweepOptions::default().base_seed,
            parallel: true,
            rows: 64,
            cols: 16,
            num_std: 8,
            std_min: 0.0,
            std_max: 4.0,
            num_prob: 4,
            prob_min: 0.0,
            prob_max: 0.3,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), FaultError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(FaultError::InvalidConfig(
                "rows and cols must be greater than zero".to_string(),
            ));
        }

        if self.num_std == 0 || self.num_prob == 0 {
            return Err(FaultError::InvalidConfig(
                "num_std and num_prob must be greater than zero".to_string(),
            ));
        }

        if !self.std_min.is_finite()
            || !self.std_max.is_finite()
            || !self.prob_min.is_finite()
            || !self.prob_max.is_finite()
        {
            return Err(FaultError::InvalidConfig(
                "grid bounds must be finite".to_string(),
            ));
        }

        if self.std_max < self.std_min || self.prob_max < self.prob_min {
            return Err(FaultError::InvalidConfig(
                "grid maxima must be greater than or equal to their minima".to_string(),
            ));
        }

        if self.prob_min < 0.0 || self.prob_max > 1.0 {
            return Err(FaultError::InvalidConfig(
                "missing-value probabilities must stay within [0, 1]".to_string(),
            ));
        }

        Ok(())
    }

    /// Noise std and missing probability cross product, std slowest.
    pub fn error_grid(&self) -> Vec<ParamMap> {
        let mut grid = Vec::with_capacity(self.num_std * self.num_prob);
        for &std in &linspace(self.std_min, self.std_max, self.num_std) {
            for &prob in &linspace(self.prob_min, self.prob_max, self.num_prob) {
                grid.push(
                    ParamMap::new()
                        .with("mean", 0.0)
                        .with("std", std)
                        .with("prob", prob),
                );
            }
        }
        grid
    }

    pub fn options(&self) -> SweepOptions {
        SweepOptions {
            base_seed: self.base_seed,
            parallel: self.parallel,
        }
    }
}
