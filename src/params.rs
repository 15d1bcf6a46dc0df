//! Indirect parameterization.
//!
//! Filters are constructed with *keys* into a shared parameter mapping
//! rather than literal values, so one pipeline definition serves an
//! entire sweep grid. The mapping is resolved once per sweep point.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::radius::RadiusGenerator;
use crate::random::SeededRng;
use crate::FaultError;

/// Replacement distribution for one character: (replacement, weight) pairs.
pub type CharDistribution = Vec<(char, f64)>;

/// User-supplied element corruption callback.
pub type ElementFn = Arc<dyn Fn(f64, &mut SeededRng) -> f64 + Send + Sync>;

/// A value a filter parameter key can resolve to.
#[derive(Clone)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    Floats(Vec<f64>),
    CharTable(BTreeMap<char, CharDistribution>),
    Radius(Arc<dyn RadiusGenerator>),
    ElementFn(ElementFn),
}

impl ParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Float(_) => "float",
            ParamValue::Int(_) => "int",
            ParamValue::Bool(_) => "bool",
            ParamValue::Str(_) => "str",
            ParamValue::Floats(_) => "floats",
            ParamValue::CharTable(_) => "char table",
            ParamValue::Radius(_) => "radius generator",
            ParamValue::ElementFn(_) => "element function",
        }
    }

    /// Rendering used in result records; policy and callback values
    /// have no literal form.
    pub fn display(&self) -> String {
        match self {
            ParamValue::Float(v) => format!("{v}"),
            ParamValue::Int(v) => format!("{v}"),
            ParamValue::Bool(v) => format!("{v}"),
            ParamValue::Str(v) => v.clone(),
            ParamValue::Floats(v) => format!("{v:?}"),
            ParamValue::CharTable(_) => "<char-table>".to_string(),
            ParamValue::Radius(_) => "<radius>".to_string(),
            ParamValue::ElementFn(_) => "<fn>".to_string(),
        }
    }
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name(), self.display())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        ParamValue::Int(value as i64)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(value: Vec<f64>) -> Self {
        ParamValue::Floats(value)
    }
}

impl From<Arc<dyn RadiusGenerator>> for ParamValue {
    fn from(value: Arc<dyn RadiusGenerator>) -> Self {
        ParamValue::Radius(value)
    }
}

/// Flat key-to-value mapping resolved once per sweep point; shared by
/// all filters in one container-tree traversal.
#[derive(Clone, Debug, Default)]
pub struct ParamMap {
    values: BTreeMap<String, ParamValue>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Builder form of [ParamMap::set].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn get(&self, key: &str) -> Result<&ParamValue, FaultError> {
        self.values.get(key).ok_or_else(|| FaultError::MissingParameter {
            key: key.to_string(),
        })
    }

    pub fn f64(&self, key: &str) -> Result<f64, FaultError> {
        match self.get(key)? {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(wrong_type(key, "float", other)),
        }
    }

    pub fn i64(&self, key: &str) -> Result<i64, FaultError> {
        match self.get(key)? {
            ParamValue::Int(v) => Ok(*v),
            other => Err(wrong_type(key, "int", other)),
        }
    }

    pub fn usize(&self, key: &str) -> Result<usize, FaultError> {
        let value = self.i64(key)?;
        usize::try_from(value).map_err(|_| FaultError::WrongParameterType {
            key: key.to_string(),
            expected: "non-negative int",
        })
    }

    pub fn bool(&self, key: &str) -> Result<bool, FaultError> {
        match self.get(key)? {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(wrong_type(key, "bool", other)),
        }
    }

    pub fn str(&self, key: &str) -> Result<&str, FaultError> {
        match self.get(key)? {
            ParamValue::Str(v) => Ok(v.as_str()),
            other => Err(wrong_type(key, "str", other)),
        }
    }

    pub fn floats(&self, key: &str) -> Result<&[f64], FaultError> {
        match self.get(key)? {
            ParamValue::Floats(v) => Ok(v.as_slice()),
            other => Err(wrong_type(key, "floats", other)),
        }
    }

    pub fn char_table(&self, key: &str) -> Result<&BTreeMap<char, CharDistribution>, FaultError> {
        match self.get(key)? {
            ParamValue::CharTable(v) => Ok(v),
            other => Err(wrong_type(key, "char table", other)),
        }
    }

    pub fn radius(&self, key: &str) -> Result<Arc<dyn RadiusGenerator>, FaultError> {
        match self.get(key)? {
            ParamValue::Radius(v) => Ok(Arc::clone(v)),
            other => Err(wrong_type(key, "radius generator", other)),
        }
    }

    pub fn element_fn(&self, key: &str) -> Result<ElementFn, FaultError> {
        match self.get(key)? {
            ParamValue::ElementFn(v) => Ok(Arc::clone(v)),
            other => Err(wrong_type(key, "element function", other)),
        }
    }

    /// Renders every entry to a string, for result records.
    pub fn display_map(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(key, value)| (key.clone(), value.display()))
            .collect()
    }
}

fn wrong_type(key: &str, expected: &'static str, _found: &ParamValue) -> FaultError {
    FaultError::WrongParameterType {
        key: key.to_string(),
        expected,
    }
}

/// Evenly spaced values over [min, max], endpoints included.
pub fn linspace(min: f64, max: f64, num: usize) -> Vec<f64> {
    if num == 0 {
        return Vec::new();
    }
    if num == 1 {
        return vec![min];
    }

    let span = max - min;
    let denom = (num - 1) as f64;

    (0..num).map(|idx| min + span * idx as f64 / denom).collect()
}

/// Cartesian product of parameter axes, first axis slowest. Each
/// resulting mapping is one sweep point.
pub fn cartesian(axes: &[(&str, Vec<ParamValue>)]) -> Vec<ParamMap> {
    if axes.iter().any(|(_, values)| values.is_empty()) {
        return Vec::new();
    }

    let total: usize = axes.iter().map(|(_, values)| values.len()).product();
    let mut maps = Vec::with_capacity(total);
    let mut odometer = vec![0_usize; axes.len()];

    for _ in 0..total {
        let mut map = ParamMap::new();
        for (axis, &position) in axes.iter().zip(odometer.iter()) {
            map.set(axis.0, axis.1[position].clone());
        }
        maps.push(map);

        for digit in (0..odometer.len()).rev() {
            odometer[digit] += 1;
            if odometer[digit] < axes[digit].1.len() {
                break;
            }
            odometer[digit] = 0;
        }
    }

    maps
}
