//! Elementwise noise and value filters.

use ndarray::ArrayViewMutD;

use crate::params::{ElementFn, ParamMap};
use crate::random::{self, SeededRng};
use crate::tree::{DimContext, TIME_DIM};
use crate::{Element, FaultError};

use super::Filter;

/// Sets each element to the missing sentinel with the given probability.
pub struct Missing {
    probability_key: String,
    probability: f64,
}

impl Missing {
    pub fn new(probability_key: impl Into<String>) -> Self {
        Self {
            probability_key: probability_key.into(),
            probability: 0.0,
        }
    }
}

impl<T: Element> Filter<T> for Missing {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.probability = params.f64(&self.probability_key)?;
        Ok(())
    }

    fn apply(
        &mut self,
        mut data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        for value in data.iter_mut() {
            if random::uniform(rng) <= self.probability {
                *value = T::MISSING;
            }
        }
        Ok(())
    }
}

/// Clamps every element into [min, max].
pub struct Clip {
    min_key: String,
    max_key: String,
    min: f64,
    max: f64,
}

impl Clip {
    pub fn new(min_key: impl Into<String>, max_key: impl Into<String>) -> Self {
        Self {
            min_key: min_key.into(),
            max_key: max_key.into(),
            min: 0.0,
            max: 0.0,
        }
    }
}

impl<T: Element> Filter<T> for Clip {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.min = params.f64(&self.min_key)?;
        self.max = params.f64(&self.max_key)?;
        Ok(())
    }

    fn apply(
        &mut self,
        mut data: ArrayViewMutD<'_, T>,
        _rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        for value in data.iter_mut() {
            let v = value.to_f64();
            if v < self.min {
                *value = T::from_f64(self.min);
            } else if v > self.max {
                *value = T::from_f64(self.max);
            }
        }
        Ok(())
    }
}

/// Fills the tensor with one value.
pub struct Constant {
    value_key: String,
    value: f64,
}

impl Constant {
    pub fn new(value_key: impl Into<String>) -> Self {
        Self {
            value_key: value_key.into(),
            value: 0.0,
        }
    }
}

impl<T: Element> Filter<T> for Constant {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.value = params.f64(&self.value_key)?;
        Ok(())
    }

    fn apply(
        &mut self,
        mut data: ArrayViewMutD<'_, T>,
        _rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        let fill = T::from_f64(self.value);
        for value in data.iter_mut() {
            *value = fill;
        }
        Ok(())
    }
}

/// Leaves the data untouched.
pub struct Identity;

impl<T: Element> Filter<T> for Identity {
    fn resolve(&mut self, _params: &ParamMap) -> Result<(), FaultError> {
        Ok(())
    }

    fn apply(
        &mut self,
        _data: ArrayViewMutD<'_, T>,
        _rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        Ok(())
    }
}

/// Adds one Gaussian draw per element, cast to the element type before
/// addition (integer storage truncates the noise).
pub struct GaussianNoise {
    mean_key: String,
    std_key: String,
    mean: f64,
    std: f64,
}

impl GaussianNoise {
    pub fn new(mean_key: impl Into<String>, std_key: impl Into<String>) -> Self {
        Self {
            mean_key: mean_key.into(),
            std_key: std_key.into(),
            mean: 0.0,
            std: 0.0,
        }
    }
}

impl<T: Element> Filter<T> for GaussianNoise {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.mean = params.f64(&self.mean_key)?;
        self.std = params.f64(&self.std_key)?;
        Ok(())
    }

    fn apply(
        &mut self,
        mut data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        for value in data.iter_mut() {
            let noise = T::from_f64(random::normal(rng, self.mean, self.std));
            *value = T::from_f64(value.to_f64() + noise.to_f64());
        }
        Ok(())
    }
}

/// Gaussian noise whose mean and standard deviation grow linearly with
/// the `time` index supplied by an enclosing series container.
pub struct GaussianNoiseTimeDependent {
    mean_key: String,
    std_key: String,
    mean_increase_key: String,
    std_increase_key: String,
    mean: f64,
    std: f64,
    mean_increase: f64,
    std_increase: f64,
}

impl GaussianNoiseTimeDependent {
    pub fn new(
        mean_key: impl Into<String>,
        std_key: impl Into<String>,
        mean_increase_key: impl Into<String>,
        std_increase_key: impl Into<String>,
    ) -> Self {
        Self {
            mean_key: mean_key.into(),
            std_key: std_key.into(),
            mean_increase_key: mean_increase_key.into(),
            std_increase_key: std_increase_key.into(),
            mean: 0.0,
            std: 0.0,
            mean_increase: 0.0,
            std_increase: 0.0,
        }
    }
}

impl<T: Element> Filter<T> for GaussianNoiseTimeDependent {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.mean = params.f64(&self.mean_key)?;
        self.std = params.f64(&self.std_key)?;
        self.mean_increase = params.f64(&self.mean_increase_key)?;
        self.std_increase = params.f64(&self.std_increase_key)?;
        Ok(())
    }

    fn apply(
        &mut self,
        mut data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        ctx: &DimContext,
    ) -> Result<(), FaultError> {
        let time = ctx.get(TIME_DIM)? as f64;
        let mean = self.mean + self.mean_increase * time;
        let std = self.std + self.std_increase * time;

        for value in data.iter_mut() {
            let noise = T::from_f64(random::normal(rng, mean, std));
            *value = T::from_f64(value.to_f64() + noise.to_f64());
        }
        Ok(())
    }
}

/// Applies a user-supplied corruption callback to every element.
pub struct StrangeBehaviour {
    callback_key: String,
    callback: Option<ElementFn>,
}

impl StrangeBehaviour {
    pub fn new(callback_key: impl Into<String>) -> Self {
        Self {
            callback_key: callback_key.into(),
            callback: None,
        }
    }
}

impl<T: Element> Filter<T> for StrangeBehaviour {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.callback = Some(params.element_fn(&self.callback_key)?);
        Ok(())
    }

    fn apply(
        &mut self,
        mut data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        let callback = self
            .callback
            .as_ref()
            .ok_or_else(|| FaultError::MissingParameter {
                key: self.callback_key.clone(),
            })?;

        for value in data.iter_mut() {
            *value = T::from_f64(callback(value.to_f64(), rng));
        }
        Ok(())
    }
}
