//! Time-series corruption: sensor drift and sensor failure gaps.

use ndarray::ArrayViewMutD;

use crate::params::ParamMap;
use crate::random::{self, SeededRng};
use crate::tree::DimContext;
use crate::{Element, FaultError};

use super::Filter;

/// Linear drift along the leading axis: slice i gains `(i + 1) *
/// magnitude`. Consumes no randomness.
pub struct SensorDrift {
    magnitude_key: String,
    magnitude: f64,
}

impl SensorDrift {
    pub fn new(magnitude_key: impl Into<String>) -> Self {
        Self {
            magnitude_key: magnitude_key.into(),
            magnitude: 0.0,
        }
    }
}

impl<T: Element> Filter<T> for SensorDrift {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.magnitude = params.f64(&self.magnitude_key)?;
        Ok(())
    }

    fn apply(
        &mut self,
        mut data: ArrayViewMutD<'_, T>,
        _rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        if data.ndim() == 0 {
            return Err(FaultError::ShapeMismatch {
                context: "sensor drift",
                expected: "at least one axis".to_string(),
                got: format!("{:?}", data.shape()),
            });
        }

        for (position, mut lane) in data.outer_iter_mut().enumerate() {
            let drift = (position as f64 + 1.0) * self.magnitude;
            for value in lane.iter_mut() {
                *value = T::from_f64(value.to_f64() + drift);
            }
        }
        Ok(())
    }
}

/// Sensor failure modeled as a two-state Markov chain walked once per
/// element in traversal order; while broken, elements are overwritten
/// with the missing value.
///
/// The chain state persists across apply calls on one instance, so a
/// gap can span consecutive series slices. `resolve` and `reset` both
/// return the sensor to the working state; the sweep driver builds a
/// fresh pipeline per iteration, so concurrent sweeps never share this
/// state.
pub struct Gap {
    prob_break_key: String,
    prob_recover_key: String,
    missing_value_key: String,
    prob_break: f64,
    prob_recover: f64,
    missing_value: f64,
    working: bool,
}

impl Gap {
    pub fn new(
        prob_break_key: impl Into<String>,
        prob_recover_key: impl Into<String>,
        missing_value_key: impl Into<String>,
    ) -> Self {
        Self {
            prob_break_key: prob_break_key.into(),
            prob_recover_key: prob_recover_key.into(),
            missing_value_key: missing_value_key.into(),
            prob_break: 0.0,
            prob_recover: 0.0,
            missing_value: 0.0,
            working: true,
        }
    }

    fn step(&mut self, rng: &mut SeededRng) {
        if self.working {
            if random::uniform(rng) < self.prob_break {
                self.working = false;
            }
        } else if random::uniform(rng) < self.prob_recover {
            self.working = true;
        }
    }
}

impl<T: Element> Filter<T> for Gap {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.prob_break = params.f64(&self.prob_break_key)?;
        self.prob_recover = params.f64(&self.prob_recover_key)?;
        self.missing_value = params.f64(&self.missing_value_key)?;
        self.working = true;
        Ok(())
    }

    fn apply(
        &mut self,
        mut data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        let missing = T::from_f64(self.missing_value);
        for value in data.iter_mut() {
            self.step(rng);
            if !self.working {
                *value = missing;
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.working = true;
    }
}

#[cfg(test)]
mod tests {
    use super::{Gap, SensorDrift};
    use crate::filters::Filter;
    use crate::params::ParamMap;
    use crate::random::seeded;
    use crate::tree::DimContext;
    use ndarray::{ArrayD, IxDyn};

    fn ones(len: usize) -> ArrayD<f64> {
        ArrayD::from_elem(IxDyn(&[len]), 1.0)
    }

    #[test]
    fn drift_grows_linearly_with_the_index() {
        let mut filter = SensorDrift::new("magnitude");
        Filter::<f64>::resolve(&mut filter, &ParamMap::new().with("magnitude", 2.0)).unwrap();
        let mut data = ones(100);
        filter
            .apply(data.view_mut(), &mut seeded(1), &DimContext::new())
            .unwrap();
        for (index, value) in data.iter().enumerate() {
            assert_eq!(*value, 1.0 + 2.0 * (index as f64 + 1.0));
        }
    }

    #[test]
    fn unbreakable_sensor_never_drops_values() {
        let mut filter = Gap::new("break", "recover", "missing");
        let params = ParamMap::new()
            .with("break", 0.0)
            .with("recover", 1.0)
            .with("missing", f64::NAN);
        Filter::<f64>::resolve(&mut filter, &params).unwrap();
        let mut data = ones(200);
        filter
            .apply(data.view_mut(), &mut seeded(3), &DimContext::new())
            .unwrap();
        assert!(data.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn immediately_broken_sensor_drops_everything() {
        let mut filter = Gap::new("break", "recover", "missing");
        let params = ParamMap::new()
            .with("break", 1.0)
            .with("recover", 0.0)
            .with("missing", f64::NAN);
        Filter::<f64>::resolve(&mut filter, &params).unwrap();
        let mut data = ones(50);
        filter
            .apply(data.view_mut(), &mut seeded(3), &DimContext::new())
            .unwrap();
        assert!(data.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn gap_state_persists_across_apply_calls_until_reset() {
        let mut filter = Gap::new("break", "recover", "missing");
        let params = ParamMap::new()
            .with("break", 1.0)
            .with("recover", 0.0)
            .with("missing", f64::NAN);
        Filter::<f64>::resolve(&mut filter, &params).unwrap();

        let mut rng = seeded(3);
        let mut first = ones(4);
        filter
            .apply(first.view_mut(), &mut rng, &DimContext::new())
            .unwrap();
        assert!(!filter.working);

        // A second slice continues inside the same gap.
        let mut second = ones(4);
        filter
            .apply(second.view_mut(), &mut rng, &DimContext::new())
            .unwrap();
        assert!(second.iter().all(|v| v.is_nan()));

        Filter::<f64>::reset(&mut filter);
        assert!(filter.working);
    }
}
