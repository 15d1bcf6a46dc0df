//! faultgen - deterministic data corruption for ML robustness studies
//!
//! Composes a tree of data containers holding chains of corruption
//! filters (missing values, sensor drift, image artifacts), driven by a
//! seeded random source and an error-parameter sweep that cross-products
//! corruption parameters against downstream consumer models.

pub mod config;
pub mod element;
pub mod filters;
pub mod output;
pub mod params;
pub mod radius;
pub mod random;
pub mod sweep;
pub mod text;
pub mod tree;

use thiserror::Error;

// Re-export main types
pub use config::SweepConfig;
pub use element::Element;
pub use filters::Filter;
pub use params::{ParamMap, ParamValue};
pub use radius::{build_radius, RadiusGenerator, RadiusKind};
pub use random::SeededRng;
pub use sweep::{
    run_sweep, summarize, CancelToken, CorruptionStats, Model, ModelSpec, RunContext, RunRecord,
    RunStatus, SweepOptions, SweepSummary,
};
pub use text::{TextArray, TextFilter};
pub use tree::{Array, DataObject, DimContext, Node, RootNode, Series, TupleSeries};

#[derive(Debug, Error)]
pub enum FaultError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("missing parameter key: {key}")]
    MissingParameter { key: String },
    #[error("parameter {key} has the wrong type: expected {expected}")]
    WrongParameterType { key: String, expected: &'static str },
    #[error("missing named dimension: {name}")]
    MissingContext { name: String },
    #[error("{context} shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        got: String,
    },
    #[error("data layout mismatch: {0}")]
    DataLayout(String),
}
