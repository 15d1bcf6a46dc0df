//! Tuple Corruption Example
//!
//! Corrupts only the target member of an (x, y) dataset tuple, then
//! counts the damage.

use faultgen::filters::{GaussianNoise, Missing};
use faultgen::random::seeded;
use faultgen::{Array, DataObject, FaultError, ParamMap, RootNode, TupleSeries};
use ndarray::{ArrayD, IxDyn};

fn main() -> Result<(), FaultError> {
    // Data is a tuple (x, y) where x has shape (100, 10) and y (100,).
    let x = ArrayD::from_shape_vec(
        IxDyn(&[100, 10]),
        (0..1000).map(|v| (v % 13) as f64).collect(),
    )
    .map_err(|error| FaultError::InvalidConfig(error.to_string()))?;
    let y = ArrayD::from_shape_vec(IxDyn(&[100]), (0..100).map(|v| v as f64).collect())
        .map_err(|error| FaultError::InvalidConfig(error.to_string()))?;
    let mut data = DataObject::Tuple(vec![x, y]);

    // Mild noise on x, missing values on y only.
    let x_node = Array::new().with_filter(GaussianNoise::new("mean", "std"));
    let y_node = Array::new().with_filter(Missing::new("prob"));
    let mut root = RootNode::tuple(TupleSeries::new().with_child(x_node).with_child(y_node));

    let params = ParamMap::new()
        .with("mean", 0.0)
        .with("std", 0.1)
        .with("prob", 0.2);
    root.process(&mut data, &params, &mut seeded(42))?;

    let members = data.members();
    let x_nans = members[0].iter().filter(|v| v.is_nan()).count();
    let y_nans = members[1].iter().filter(|v| v.is_nan()).count();
    println!("NaNs in x (should be 0): {x_nans}");
    println!("NaNs in y (should be close to 20): {y_nans}");
    Ok(())
}
