//! Pixel-grid degradation filters.

use ndarray::{ArrayViewMutD, Ix2, Ix3};

use crate::params::ParamMap;
use crate::random::SeededRng;
use crate::tree::DimContext;
use crate::{Element, FaultError};

use super::Filter;

/// Repeated 3x3 neighborhood mean over an image; edge pixels average
/// their in-bounds neighbors only.
pub struct Blur {
    repeats_key: String,
    repeats: usize,
}

impl Blur {
    pub fn new(repeats_key: impl Into<String>) -> Self {
        Self {
            repeats_key: repeats_key.into(),
            repeats: 0,
        }
    }
}

impl<T: Element> Filter<T> for Blur {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.repeats = params.usize(&self.repeats_key)?;
        Ok(())
    }

    fn apply(
        &mut self,
        data: ArrayViewMutD<'_, T>,
        _rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        let shape = data.shape().to_vec();
        let mut view = data
            .into_dimensionality::<Ix3>()
            .map_err(|_| FaultError::ShapeMismatch {
                context: "blur",
                expected: "3-D tensor (height, width, channels)".to_string(),
                got: format!("{shape:?}"),
            })?;
        let (height, width, channels) = view.dim();

        for _ in 0..self.repeats {
            let original = view.to_owned();
            for y0 in 0..height {
                for x0 in 0..width {
                    for j in 0..channels {
                        let mut sum = 0.0;
                        let mut count = 0.0;
                        for y in y0.saturating_sub(1)..(y0 + 2).min(height) {
                            for x in x0.saturating_sub(1)..(x0 + 2).min(width) {
                                sum += original[[y, x, j]].to_f64();
                                count += 1.0;
                            }
                        }
                        view[[y0, x0, j]] = T::from_f64((sum / count).floor());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Nearest-neighbor downsampling in place: every pixel takes the value
/// of the top-left pixel of its k-by-k block.
pub struct Resolution {
    k_key: String,
    k: usize,
}

impl Resolution {
    pub fn new(k_key: impl Into<String>) -> Self {
        Self {
            k_key: k_key.into(),
            k: 1,
        }
    }
}

impl<T: Element> Filter<T> for Resolution {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.k = params.usize(&self.k_key)?;
        if self.k == 0 {
            return Err(FaultError::InvalidConfig(
                "resolution factor k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn apply(
        &mut self,
        data: ArrayViewMutD<'_, T>,
        _rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        if self.k == 1 {
            return Ok(());
        }

        let shape = data.shape().to_vec();
        let shape_error = |shape: &[usize]| FaultError::ShapeMismatch {
            context: "resolution",
            expected: "2-D or 3-D tensor".to_string(),
            got: format!("{shape:?}"),
        };

        match shape.len() {
            2 => {
                let mut view = data
                    .into_dimensionality::<Ix2>()
                    .map_err(|_| shape_error(&shape))?;
                let source = view.to_owned();
                let (height, width) = view.dim();
                for y in 0..height {
                    for x in 0..width {
                        view[[y, x]] = source[[y / self.k * self.k, x / self.k * self.k]];
                    }
                }
                Ok(())
            }
            3 => {
                let mut view = data
                    .into_dimensionality::<Ix3>()
                    .map_err(|_| shape_error(&shape))?;
                let source = view.to_owned();
                let (height, width, channels) = view.dim();
                for y in 0..height {
                    for x in 0..width {
                        for j in 0..channels {
                            view[[y, x, j]] =
                                source[[y / self.k * self.k, x / self.k * self.k, j]];
                        }
                    }
                }
                Ok(())
            }
            _ => Err(shape_error(&shape)),
        }
    }
}
