//! Filters combining or wrapping other filters.
//!
//! Combinators run each branch on a private copy of the input, because
//! both branches mutate in place and would otherwise stomp on each
//! other; branch A always runs before branch B on the shared random
//! source.

use ndarray::{ArrayD, ArrayViewMutD};

use crate::params::ParamMap;
use crate::random::{self, SeededRng};
use crate::tree::DimContext;
use crate::{Element, FaultError};

use super::noise::Identity;
use super::Filter;

/// Elementwise operation applied to the two branch results.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    IntegerDivision,
    Modulo,
    And,
    Or,
    Xor,
    Min,
    Max,
}

impl BinaryOp {
    fn combine<T: Element>(self, a: T, b: T) -> T {
        let (x, y) = (a.to_f64(), b.to_f64());
        match self {
            BinaryOp::Addition => T::from_f64(x + y),
            BinaryOp::Subtraction => T::from_f64(x - y),
            BinaryOp::Multiplication => T::from_f64(x * y),
            BinaryOp::Division => T::from_f64(x / y),
            BinaryOp::IntegerDivision => T::from_f64((x / y).floor()),
            BinaryOp::Modulo => T::from_f64(x - y * (x / y).floor()),
            BinaryOp::And => T::from_f64(((x as i64) & (y as i64)) as f64),
            BinaryOp::Or => T::from_f64(((x as i64) | (y as i64)) as f64),
            BinaryOp::Xor => T::from_f64(((x as i64) ^ (y as i64)) as f64),
            BinaryOp::Min => {
                if b < a {
                    b
                } else {
                    a
                }
            }
            BinaryOp::Max => {
                if b > a {
                    b
                } else {
                    a
                }
            }
        }
    }
}

/// Applies two filters to independent copies of the input, then
/// combines the results elementwise.
pub struct BinaryFilter<T: Element> {
    op: BinaryOp,
    a: Box<dyn Filter<T>>,
    b: Box<dyn Filter<T>>,
}

impl<T: Element> BinaryFilter<T> {
    pub fn new(
        op: BinaryOp,
        a: impl Filter<T> + 'static,
        b: impl Filter<T> + 'static,
    ) -> Self {
        Self {
            op,
            a: Box::new(a),
            b: Box::new(b),
        }
    }
}

impl<T: Element> Filter<T> for BinaryFilter<T> {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.a.resolve(params)?;
        self.b.resolve(params)
    }

    fn apply(
        &mut self,
        mut data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        ctx: &DimContext,
    ) -> Result<(), FaultError> {
        let mut branch_a: ArrayD<T> = data.to_owned();
        let mut branch_b: ArrayD<T> = data.to_owned();
        self.a.apply(branch_a.view_mut(), rng, ctx)?;
        self.b.apply(branch_b.view_mut(), rng, ctx)?;

        for ((out, a), b) in data.iter_mut().zip(branch_a.iter()).zip(branch_b.iter()) {
            *out = self.op.combine(*a, *b);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.a.reset();
        self.b.reset();
    }
}

/// The difference a filter makes: `Subtraction(filter, Identity)`.
pub fn difference<T: Element>(filter: impl Filter<T> + 'static) -> BinaryFilter<T> {
    BinaryFilter::new(BinaryOp::Subtraction, filter, Identity)
}

/// Delegates to the inner filter with the given probability. When the
/// draw misses, the inner filter consumes no randomness, so filters
/// after this one only stay aligned across runs with the same outcome.
pub struct ApplyWithProbability<T: Element> {
    inner: Box<dyn Filter<T>>,
    probability_key: String,
    probability: f64,
}

impl<T: Element> ApplyWithProbability<T> {
    pub fn new(inner: impl Filter<T> + 'static, probability_key: impl Into<String>) -> Self {
        Self {
            inner: Box::new(inner),
            probability_key: probability_key.into(),
            probability: 0.0,
        }
    }
}

impl<T: Element> Filter<T> for ApplyWithProbability<T> {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.probability = params.f64(&self.probability_key)?;
        self.inner.resolve(params)
    }

    fn apply(
        &mut self,
        data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        ctx: &DimContext,
    ) -> Result<(), FaultError> {
        if random::uniform(rng) < self.probability {
            self.inner.apply(data, rng, ctx)?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

/// Runs the inner filter in a different element type: casts a copy to
/// `U`, applies, casts back elementwise into the original storage.
pub struct ModifyAsDataType<U: Element> {
    inner: Box<dyn Filter<U>>,
}

impl<U: Element> ModifyAsDataType<U> {
    pub fn new(inner: impl Filter<U> + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }
}

impl<T: Element, U: Element> Filter<T> for ModifyAsDataType<U> {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.inner.resolve(params)
    }

    fn apply(
        &mut self,
        mut data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        ctx: &DimContext,
    ) -> Result<(), FaultError> {
        let mut widened: ArrayD<U> = data.map(|value| U::from_f64(value.to_f64()));
        self.inner.apply(widened.view_mut(), rng, ctx)?;

        for (out, value) in data.iter_mut().zip(widened.iter()) {
            *out = T::from_f64(value.to_f64());
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}
