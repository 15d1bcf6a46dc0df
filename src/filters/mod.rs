//! Corruption filters.
//!
//! A filter is a named transformation with a set of parameter keys it
//! resolves from the runtime parameter mapping and an in-place apply
//! over a tensor view. Apply must be a pure function of the data, the
//! random source state, and the resolved parameters, so that two
//! identically seeded runs produce identical output. The one exception
//! is [Gap], whose sensor state deliberately persists across apply
//! calls until `reset`.

use ndarray::ArrayViewMutD;

use crate::params::ParamMap;
use crate::random::SeededRng;
use crate::tree::DimContext;
use crate::{Element, FaultError};

mod area;
mod combinator;
mod image;
mod noise;
mod series;

pub(crate) use area::corruption_seeds;
pub use area::{LensFlare, MissingArea, Rain, Snow, StainArea};
pub use combinator::{
    difference, ApplyWithProbability, BinaryFilter, BinaryOp, ModifyAsDataType,
};
pub use image::{Blur, Resolution};
pub use noise::{
    Clip, Constant, GaussianNoise, GaussianNoiseTimeDependent, Identity, Missing, StrangeBehaviour,
};
pub use series::{Gap, SensorDrift};

/// An error source attachable to a container node.
pub trait Filter<T: Element>: Send {
    /// Resolves every parameter key this filter needs into concrete
    /// values held on the instance. Run once per sweep point.
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError>;

    /// Mutates `data` in place. Filters never reallocate the tensor;
    /// shape is preserved.
    fn apply(
        &mut self,
        data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        ctx: &DimContext,
    ) -> Result<(), FaultError>;

    /// Returns the filter to its initial state. No-op for the stateless
    /// majority.
    fn reset(&mut self) {}
}
