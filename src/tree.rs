//! Container tree.
//!
//! A pipeline is a tree of nodes, each owning an ordered filter chain.
//! Processing resolves every filter against the sweep point's parameter
//! mapping once, resets stateful filters, then traverses the data,
//! handing each filter the live random source and named-dimension
//! context.

use std::collections::BTreeMap;

use ndarray::{ArrayD, ArrayViewMutD, Axis};

use crate::filters::Filter;
use crate::params::ParamMap;
use crate::random::SeededRng;
use crate::{Element, FaultError};

/// Name of the axis a [Series] exposes by default.
pub const TIME_DIM: &str = "time";

/// Named-dimension context passed alongside data, for filters that need
/// positional awareness beyond the raw tensor (e.g. a time index).
#[derive(Clone, Debug, Default)]
pub struct DimContext {
    dims: BTreeMap<String, usize>,
}

impl DimContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Result<usize, FaultError> {
        self.dims
            .get(name)
            .copied()
            .ok_or_else(|| FaultError::MissingContext {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dims.contains_key(name)
    }

    pub fn with_dim(&self, name: impl Into<String>, value: usize) -> Self {
        let mut dims = self.dims.clone();
        dims.insert(name.into(), value);
        Self { dims }
    }
}

/// A point in the container tree.
pub trait Node<T: Element>: Send {
    /// Resolves every attached filter against the parameter mapping.
    /// Run once per sweep point, before traversal.
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError>;

    /// Returns stateful filters to their initial state.
    fn reset(&mut self);

    /// Runs the corruption chain over `data` in place.
    fn process(
        &mut self,
        data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        ctx: &DimContext,
    ) -> Result<(), FaultError>;
}

/// Leaf node: a tensor slot with an ordered filter chain.
pub struct Array<T: Element> {
    shape: Option<Vec<usize>>,
    filters: Vec<Box<dyn Filter<T>>>,
}

impl<T: Element> Array<T> {
    pub fn new() -> Self {
        Self {
            shape: None,
            filters: Vec::new(),
        }
    }

    /// Declares the shape filters will be applied to; checked at
    /// process time, not construction.
    pub fn with_shape(shape: impl Into<Vec<usize>>) -> Self {
        Self {
            shape: Some(shape.into()),
            filters: Vec::new(),
        }
    }

    pub fn add_filter(&mut self, filter: impl Filter<T> + 'static) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Builder form of [Array::add_filter].
    pub fn with_filter(mut self, filter: impl Filter<T> + 'static) -> Self {
        self.add_filter(filter);
        self
    }
}

impl<T: Element> Default for Array<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Node<T> for Array<T> {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        for filter in &mut self.filters {
            filter.resolve(params)?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }

    fn process(
        &mut self,
        mut data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        ctx: &DimContext,
    ) -> Result<(), FaultError> {
        if let Some(shape) = &self.shape {
            if shape.as_slice() != data.shape() {
                return Err(FaultError::ShapeMismatch {
                    context: "array node",
                    expected: format!("{shape:?}"),
                    got: format!("{:?}", data.shape()),
                });
            }
        }

        for filter in &mut self.filters {
            filter.apply(data.view_mut(), rng, ctx)?;
        }
        Ok(())
    }
}

/// Composite over one child and a named leading axis: each position
/// along the axis is exposed to filters through the dimension context.
pub struct Series<T: Element> {
    dim: String,
    child: Box<dyn Node<T>>,
}

impl<T: Element> Series<T> {
    pub fn new(child: impl Node<T> + 'static) -> Self {
        Self::over(TIME_DIM, child)
    }

    pub fn over(dim: impl Into<String>, child: impl Node<T> + 'static) -> Self {
        Self {
            dim: dim.into(),
            child: Box::new(child),
        }
    }
}

impl<T: Element> Node<T> for Series<T> {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.child.resolve(params)
    }

    fn reset(&mut self) {
        self.child.reset();
    }

    fn process(
        &mut self,
        mut data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        ctx: &DimContext,
    ) -> Result<(), FaultError> {
        if data.ndim() == 0 {
            return Err(FaultError::ShapeMismatch {
                context: "series node",
                expected: "at least one axis".to_string(),
                got: format!("{:?}", data.shape()),
            });
        }

        for position in 0..data.len_of(Axis(0)) {
            let slice = data.index_axis_mut(Axis(0), position);
            let step_ctx = ctx.with_dim(self.dim.clone(), position);
            self.child.process(slice, rng, &step_ctx)?;
        }
        Ok(())
    }
}

/// Composite whose children correspond one-to-one with the members of a
/// tuple of tensors; member i is dispatched to child i, in declaration
/// order.
pub struct TupleSeries<T: Element> {
    children: Vec<Box<dyn Node<T>>>,
}

impl<T: Element> TupleSeries<T> {
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
        }
    }

    pub fn add_child(&mut self, child: impl Node<T> + 'static) -> &mut Self {
        self.children.push(Box::new(child));
        self
    }

    /// Builder form of [TupleSeries::add_child].
    pub fn with_child(mut self, child: impl Node<T> + 'static) -> Self {
        self.add_child(child);
        self
    }

    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        for child in &mut self.children {
            child.resolve(params)?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        for child in &mut self.children {
            child.reset();
        }
    }

    fn process(
        &mut self,
        members: &mut [ArrayD<T>],
        rng: &mut SeededRng,
        ctx: &DimContext,
    ) -> Result<(), FaultError> {
        if members.len() != self.children.len() {
            return Err(FaultError::DataLayout(format!(
                "tuple has {} members but the pipeline declares {} children",
                members.len(),
                self.children.len()
            )));
        }

        for (child, member) in self.children.iter_mut().zip(members.iter_mut()) {
            child.process(member.view_mut(), rng, ctx)?;
        }
        Ok(())
    }
}

impl<T: Element> Default for TupleSeries<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The data object a pipeline traversal mutates: a single tensor or a
/// tuple of tensors.
#[derive(Clone, Debug, PartialEq)]
pub enum DataObject<T: Element> {
    Tensor(ArrayD<T>),
    Tuple(Vec<ArrayD<T>>),
}

impl<T: Element> DataObject<T> {
    /// All member tensors, in tuple order.
    pub fn members(&self) -> Vec<&ArrayD<T>> {
        match self {
            DataObject::Tensor(tensor) => vec![tensor],
            DataObject::Tuple(members) => members.iter().collect(),
        }
    }
}

/// Root of a corruption pipeline.
pub enum RootNode<T: Element> {
    Single(Box<dyn Node<T>>),
    Tuple(TupleSeries<T>),
}

impl<T: Element> RootNode<T> {
    pub fn single(node: impl Node<T> + 'static) -> Self {
        RootNode::Single(Box::new(node))
    }

    pub fn tuple(series: TupleSeries<T>) -> Self {
        RootNode::Tuple(series)
    }

    /// One full pipeline run: resolve once against the sweep point's
    /// parameters, reset stateful filters once, traverse once.
    pub fn process(
        &mut self,
        data: &mut DataObject<T>,
        params: &ParamMap,
        rng: &mut SeededRng,
    ) -> Result<(), FaultError> {
        let ctx = DimContext::new();
        match (self, data) {
            (RootNode::Single(node), DataObject::Tensor(tensor)) => {
                node.resolve(params)?;
                node.reset();
                node.process(tensor.view_mut(), rng, &ctx)
            }
            (RootNode::Tuple(series), DataObject::Tuple(members)) => {
                series.resolve(params)?;
                series.reset();
                series.process(members, rng, &ctx)
            }
            (RootNode::Single(_), DataObject::Tuple(_)) => Err(FaultError::DataLayout(
                "tuple data given to a single-tensor pipeline".to_string(),
            )),
            (RootNode::Tuple(_), DataObject::Tensor(_)) => Err(FaultError::DataLayout(
                "single-tensor data given to a tuple pipeline".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Array, DataObject, DimContext, RootNode, Series, TupleSeries};
    use crate::filters::{Constant, GaussianNoise, GaussianNoiseTimeDependent, Missing};
    use crate::params::ParamMap;
    use crate::random::seeded;
    use crate::FaultError;
    use ndarray::{ArrayD, IxDyn};

    fn ramp(len: usize) -> ArrayD<f64> {
        ArrayD::from_shape_vec(IxDyn(&[len]), (0..len).map(|v| v as f64).collect()).unwrap()
    }

    #[test]
    fn zero_variance_noise_is_the_identity() {
        let node = Array::new().with_filter(GaussianNoise::new("mean", "std"));
        let mut root = RootNode::single(node);
        let mut data = DataObject::Tensor(ramp(5));
        let params = ParamMap::new().with("mean", 0.0).with("std", 0.0);
        root.process(&mut data, &params, &mut seeded(42)).unwrap();
        assert_eq!(data, DataObject::Tensor(ramp(5)));
    }

    #[test]
    fn declared_shape_is_enforced_at_process_time() {
        let node = Array::<f64>::with_shape(vec![3]).with_filter(Missing::new("prob"));
        let mut root = RootNode::single(node);
        let mut data = DataObject::Tensor(ramp(5));
        let params = ParamMap::new().with("prob", 0.5);
        match root.process(&mut data, &params, &mut seeded(1)) {
            Err(FaultError::ShapeMismatch { context, .. }) => assert_eq!(context, "array node"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn filters_run_in_declaration_order() {
        let node = Array::new()
            .with_filter(Constant::new("fill"))
            .with_filter(GaussianNoise::new("mean", "std"));
        let mut root = RootNode::single(node);
        let mut data = DataObject::Tensor(ramp(4));
        let params = ParamMap::new()
            .with("fill", 7.0)
            .with("mean", 0.0)
            .with("std", 0.0);
        root.process(&mut data, &params, &mut seeded(1)).unwrap();
        let expected = ArrayD::from_elem(IxDyn(&[4]), 7.0);
        assert_eq!(data, DataObject::Tensor(expected));
    }

    #[test]
    fn series_supplies_the_time_index() {
        // mean grows by exactly one per step, std stays zero, so slice t
        // is shifted by t and nothing else.
        let leaf = Array::new().with_filter(GaussianNoiseTimeDependent::new(
            "mean", "std", "mean_inc", "std_inc",
        ));
        let mut root = RootNode::single(Series::new(leaf));
        let mut data =
            DataObject::Tensor(ArrayD::from_shape_vec(IxDyn(&[3, 2]), vec![0.0; 6]).unwrap());
        let params = ParamMap::new()
            .with("mean", 0.0)
            .with("std", 0.0)
            .with("mean_inc", 1.0)
            .with("std_inc", 0.0);
        root.process(&mut data, &params, &mut seeded(7)).unwrap();

        let expected =
            ArrayD::from_shape_vec(IxDyn(&[3, 2]), vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0]).unwrap();
        assert_eq!(data, DataObject::Tensor(expected));
    }

    #[test]
    fn time_outside_a_series_is_a_context_error() {
        let node = Array::new().with_filter(GaussianNoiseTimeDependent::new(
            "mean", "std", "mean_inc", "std_inc",
        ));
        let mut root = RootNode::single(node);
        let mut data = DataObject::Tensor(ramp(4));
        let params = ParamMap::new()
            .with("mean", 0.0)
            .with("std", 0.0)
            .with("mean_inc", 1.0)
            .with("std_inc", 0.0);
        match root.process(&mut data, &params, &mut seeded(7)) {
            Err(FaultError::MissingContext { name }) => assert_eq!(name, "time"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn tuple_members_are_dispatched_independently() {
        let x_node = Array::<f64>::new();
        let y_node = Array::new().with_filter(Missing::new("prob"));
        let mut root = RootNode::tuple(TupleSeries::new().with_child(x_node).with_child(y_node));

        let mut data = DataObject::Tuple(vec![ramp(20), ramp(20)]);
        let params = ParamMap::new().with("prob", 1.0);
        root.process(&mut data, &params, &mut seeded(11)).unwrap();

        match data {
            DataObject::Tuple(members) => {
                assert!(members[0].iter().all(|v| !v.is_nan()));
                assert!(members[1].iter().all(|v| v.is_nan()));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn tuple_arity_mismatch_is_a_layout_error() {
        let mut root = RootNode::tuple(TupleSeries::new().with_child(Array::<f64>::new()));
        let mut data = DataObject::Tuple(vec![ramp(3), ramp(3)]);
        let result = root.process(&mut data, &ParamMap::new(), &mut seeded(1));
        assert!(matches!(result, Err(FaultError::DataLayout(_))));
    }

    #[test]
    fn root_arity_mismatch_is_a_layout_error() {
        let mut root = RootNode::single(Array::<f64>::new());
        let mut data = DataObject::Tuple(vec![ramp(3)]);
        let result = root.process(&mut data, &ParamMap::new(), &mut seeded(1));
        assert!(matches!(result, Err(FaultError::DataLayout(_))));
    }

    #[test]
    fn context_lookup_reports_the_missing_name() {
        let ctx = DimContext::new().with_dim("time", 3);
        assert_eq!(ctx.get("time").unwrap(), 3);
        assert!(matches!(
            ctx.get("channel"),
            Err(FaultError::MissingContext { .. })
        ));
    }
}
