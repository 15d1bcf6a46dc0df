//! Error-parameter sweep driver.
//!
//! Cross-products an error-parameter grid against downstream consumer
//! models. Every combination gets a deterministically derived seed and
//! a freshly built pipeline, so iterations share no filter state and
//! the whole grid can run on a worker pool without changing the
//! results.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::params::ParamMap;
use crate::random;
use crate::tree::{DataObject, RootNode};
use crate::{Element, FaultError};

/// Context handed to a consumer model alongside the corrupted data.
pub struct RunContext<'a, T: Element> {
    pub run_id: usize,
    pub seed: u64,
    /// The uncorrupted baseline data.
    pub clean: &'a DataObject<T>,
    /// The error parameters this iteration was corrupted with.
    pub error_params: &'a ParamMap,
}

/// A downstream consumer of corrupted data.
pub trait Model<T: Element>: Send + Sync {
    fn name(&self) -> &str;

    fn run(
        &self,
        ctx: &RunContext<'_, T>,
        corrupted: &DataObject<T>,
        params: &ParamMap,
    ) -> Result<BTreeMap<String, f64>, FaultError>;
}

/// A model plus its own parameter grid.
pub struct ModelSpec<T: Element> {
    pub model: Box<dyn Model<T>>,
    pub params_grid: Vec<ParamMap>,
}

impl<T: Element> ModelSpec<T> {
    /// An empty grid means one run with no model parameters.
    pub fn new(model: impl Model<T> + 'static, params_grid: Vec<ParamMap>) -> Self {
        let params_grid = if params_grid.is_empty() {
            vec![ParamMap::new()]
        } else {
            params_grid
        };
        Self {
            model: Box::new(model),
            params_grid,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SweepOptions {
    /// Per-run seeds are derived from this; repeated sweeps over the
    /// same grid reproduce bit-identical corrupted data.
    pub base_seed: u64,
    /// Evaluate combinations on the rayon pool. Output order and
    /// content are identical either way.
    pub parallel: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            base_seed: 0xFA17_0260_0001_u64,
            parallel: true,
        }
    }
}

/// Cooperative cancellation checked between sweep iterations.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum RunStatus {
    Ok,
    Failed(String),
    Cancelled,
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Ok => "ok",
            RunStatus::Failed(_) => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            RunStatus::Failed(reason) => Some(reason.as_str()),
            _ => None,
        }
    }
}

/// One row of the results table: the originating parameter triple plus
/// the metrics the model returned. Append-only, never mutated after
/// collection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunRecord {
    pub run_id: usize,
    pub seed: u64,
    pub model: String,
    pub error_params: BTreeMap<String, String>,
    pub model_params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub status: RunStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct SweepSummary {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub records_per_model: BTreeMap<String, usize>,
}

pub fn summarize(records: &[RunRecord]) -> SweepSummary {
    let mut summary = SweepSummary {
        total: records.len(),
        ok: 0,
        failed: 0,
        cancelled: 0,
        records_per_model: BTreeMap::new(),
    };

    for record in records {
        match record.status {
            RunStatus::Ok => summary.ok += 1,
            RunStatus::Failed(_) => summary.failed += 1,
            RunStatus::Cancelled => summary.cancelled += 1,
        }
        *summary
            .records_per_model
            .entry(record.model.clone())
            .or_insert(0) += 1;
    }
    summary
}

/// Runs the full cross product of error parameters, models and model
/// parameters. Per-iteration failures are captured in the record (with
/// the offending parameters preserved) and the rest of the grid keeps
/// going; cancellation marks the remaining combinations instead of
/// dropping them.
pub fn run_sweep<T, F>(
    options: &SweepOptions,
    base_data: &DataObject<T>,
    build_pipeline: F,
    error_grid: &[ParamMap],
    models: &[ModelSpec<T>],
    token: &CancelToken,
) -> Vec<RunRecord>
where
    T: Element,
    F: Fn() -> RootNode<T> + Sync,
{
    let mut combos = Vec::new();
    let mut run_id = 0_usize;
    for error_params in error_grid {
        for spec in models {
            for model_params in &spec.params_grid {
                combos.push((run_id, error_params, spec, model_params));
                run_id += 1;
            }
        }
    }
    info!(
        combinations = combos.len(),
        parallel = options.parallel,
        "starting sweep"
    );

    let evaluate = |combo: &(usize, &ParamMap, &ModelSpec<T>, &ParamMap)| -> RunRecord {
        let (run_id, error_params, spec, model_params) = *combo;
        let seed = random::derive_seed(options.base_seed, run_id as u64);
        let mut record = RunRecord {
            run_id,
            seed,
            model: spec.model.name().to_string(),
            error_params: error_params.display_map(),
            model_params: model_params.display_map(),
            metrics: BTreeMap::new(),
            status: RunStatus::Ok,
        };

        if token.is_cancelled() {
            record.status = RunStatus::Cancelled;
            return record;
        }

        let result = evaluate_one(
            run_id,
            seed,
            base_data,
            &build_pipeline,
            error_params,
            spec.model.as_ref(),
            model_params,
        );
        match result {
            Ok(metrics) => record.metrics = metrics,
            Err(error) => {
                debug!(run_id, %error, "sweep iteration failed");
                record.status = RunStatus::Failed(error.to_string());
            }
        }
        record
    };

    let records: Vec<RunRecord> = if options.parallel {
        combos.par_iter().map(evaluate).collect()
    } else {
        combos.iter().map(evaluate).collect()
    };
    info!(records = records.len(), "sweep finished");
    records
}

fn evaluate_one<T, F>(
    run_id: usize,
    seed: u64,
    base_data: &DataObject<T>,
    build_pipeline: &F,
    error_params: &ParamMap,
    model: &dyn Model<T>,
    model_params: &ParamMap,
) -> Result<BTreeMap<String, f64>, FaultError>
where
    T: Element,
    F: Fn() -> RootNode<T>,
{
    let mut rng = random::seeded(seed);
    let mut pipeline = build_pipeline();
    let mut corrupted = base_data.clone();
    pipeline.process(&mut corrupted, error_params, &mut rng)?;

    let ctx = RunContext {
        run_id,
        seed,
        clean: base_data,
        error_params,
    };
    model.run(&ctx, &corrupted, model_params)
}

/// Built-in consumer reporting how far the corrupted data moved from
/// the clean baseline; real models live behind the [Model] boundary.
pub struct CorruptionStats;

impl<T: Element> Model<T> for CorruptionStats {
    fn name(&self) -> &str {
        "corruption_stats"
    }

    fn run(
        &self,
        ctx: &RunContext<'_, T>,
        corrupted: &DataObject<T>,
        _params: &ParamMap,
    ) -> Result<BTreeMap<String, f64>, FaultError> {
        let clean_members = ctx.clean.members();
        let corrupt_members = corrupted.members();
        if clean_members.len() != corrupt_members.len() {
            return Err(FaultError::DataLayout(
                "clean and corrupted data have different arity".to_string(),
            ));
        }

        let mut total = 0.0_f64;
        let mut missing = 0.0_f64;
        let mut changed = 0.0_f64;
        let mut squared = 0.0_f64;
        let mut compared = 0.0_f64;

        for (clean, corrupt) in clean_members.iter().zip(corrupt_members.iter()) {
            if clean.shape() != corrupt.shape() {
                return Err(FaultError::DataLayout(
                    "clean and corrupted members have different shapes".to_string(),
                ));
            }

            for (a, b) in clean.iter().zip(corrupt.iter()) {
                total += 1.0;
                if b.is_missing() {
                    missing += 1.0;
                }
                if a.is_missing() != b.is_missing() {
                    changed += 1.0;
                } else if !b.is_missing() {
                    let diff = b.to_f64() - a.to_f64();
                    if diff != 0.0 {
                        changed += 1.0;
                    }
                    squared += diff * diff;
                    compared += 1.0;
                }
            }
        }

        let mut metrics = BTreeMap::new();
        metrics.insert(
            "rmse".to_string(),
            if compared > 0.0 {
                (squared / compared).sqrt()
            } else {
                0.0
            },
        );
        metrics.insert(
            "missing_fraction".to_string(),
            if total > 0.0 { missing / total } else { 0.0 },
        );
        metrics.insert(
            "changed_fraction".to_string(),
            if total > 0.0 { changed / total } else { 0.0 },
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        run_sweep, summarize, CancelToken, CorruptionStats, Model, ModelSpec, RunContext,
        RunStatus, SweepOptions,
    };
    use crate::filters::{GaussianNoise, Missing};
    use crate::params::ParamMap;
    use crate::tree::{Array, DataObject, RootNode};
    use crate::FaultError;
    use ndarray::{ArrayD, IxDyn};
    use std::collections::BTreeMap;

    struct EchoModel;

    impl Model<f64> for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        fn run(
            &self,
            _ctx: &RunContext<'_, f64>,
            _corrupted: &DataObject<f64>,
            params: &ParamMap,
        ) -> Result<BTreeMap<String, f64>, FaultError> {
            let mut metrics = BTreeMap::new();
            metrics.insert("x".to_string(), params.f64("x")?);
            Ok(metrics)
        }
    }

    fn base_tensor() -> DataObject<f64> {
        DataObject::Tensor(
            ArrayD::from_shape_vec(IxDyn(&[5]), vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap(),
        )
    }

    fn noise_pipeline() -> RootNode<f64> {
        RootNode::single(Array::new().with_filter(GaussianNoise::new("mean", "std")))
    }

    fn error_grid(stds: &[f64]) -> Vec<ParamMap> {
        stds.iter()
            .map(|&std| ParamMap::new().with("mean", 0.0).with("std", std))
            .collect()
    }

    #[test]
    fn sweep_emits_one_record_per_combination() {
        let models = vec![
            ModelSpec::new(
                EchoModel,
                vec![
                    ParamMap::new().with("x", 1.0),
                    ParamMap::new().with("x", 2.0),
                ],
            ),
            ModelSpec::new(CorruptionStats, vec![]),
        ];
        let records = run_sweep(
            &SweepOptions::default(),
            &base_tensor(),
            noise_pipeline,
            &error_grid(&[0.0, 1.0]),
            &models,
            &CancelToken::new(),
        );

        // 2 error points x (2 echo params + 1 stats) = 6 records.
        assert_eq!(records.len(), 6);
        for (expected_id, record) in records.iter().enumerate() {
            assert_eq!(record.run_id, expected_id);
            assert_eq!(record.status, RunStatus::Ok);
        }
        assert_eq!(records[0].model, "echo");
        assert_eq!(records[0].model_params["x"], "1");
        assert_eq!(records[1].model_params["x"], "2");
        assert_eq!(records[2].model, "corruption_stats");
        assert_eq!(records[0].error_params["std"], "0");
        assert_eq!(records[3].error_params["std"], "1");
    }

    #[test]
    fn parallel_and_serial_sweeps_agree() {
        let grid = error_grid(&[0.0, 0.5, 1.0]);
        let serial = run_sweep(
            &SweepOptions {
                parallel: false,
                ..SweepOptions::default()
            },
            &base_tensor(),
            noise_pipeline,
            &grid,
            &[ModelSpec::new(CorruptionStats, vec![])],
            &CancelToken::new(),
        );
        let parallel = run_sweep(
            &SweepOptions::default(),
            &base_tensor(),
            noise_pipeline,
            &grid,
            &[ModelSpec::new(CorruptionStats, vec![])],
            &CancelToken::new(),
        );
        assert_eq!(serial, parallel);
    }

    #[test]
    fn repeated_sweeps_reproduce() {
        let grid = error_grid(&[1.0, 2.0]);
        let first = run_sweep(
            &SweepOptions::default(),
            &base_tensor(),
            noise_pipeline,
            &grid,
            &[ModelSpec::new(CorruptionStats, vec![])],
            &CancelToken::new(),
        );
        let second = run_sweep(
            &SweepOptions::default(),
            &base_tensor(),
            noise_pipeline,
            &grid,
            &[ModelSpec::new(CorruptionStats, vec![])],
            &CancelToken::new(),
        );
        assert_eq!(first, second);
    }

    #[test]
    fn zero_variance_noise_leaves_the_data_untouched() {
        let records = run_sweep(
            &SweepOptions::default(),
            &base_tensor(),
            noise_pipeline,
            &error_grid(&[0.0]),
            &[ModelSpec::new(CorruptionStats, vec![])],
            &CancelToken::new(),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metrics["rmse"], 0.0);
        assert_eq!(records[0].metrics["changed_fraction"], 0.0);
    }

    #[test]
    fn certain_missing_shows_up_in_the_stats() {
        let records = run_sweep(
            &SweepOptions::default(),
            &base_tensor(),
            || RootNode::single(Array::new().with_filter(Missing::new("prob"))),
            &[ParamMap::new().with("prob", 1.0)],
            &[ModelSpec::new(CorruptionStats, vec![])],
            &CancelToken::new(),
        );
        assert_eq!(records[0].metrics["missing_fraction"], 1.0);
    }

    #[test]
    fn per_iteration_failures_keep_the_grid_running() {
        // The second error point lacks the std key entirely.
        let grid = vec![
            ParamMap::new().with("mean", 0.0).with("std", 1.0),
            ParamMap::new().with("mean", 0.0),
        ];
        let records = run_sweep(
            &SweepOptions::default(),
            &base_tensor(),
            noise_pipeline,
            &grid,
            &[ModelSpec::new(CorruptionStats, vec![])],
            &CancelToken::new(),
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, RunStatus::Ok);
        match &records[1].status {
            RunStatus::Failed(reason) => assert!(reason.contains("std")),
            other => panic!("unexpected: {other:?}"),
        }
        // The offending parameter point is preserved on the record.
        assert_eq!(records[1].error_params["mean"], "0");

        let summary = summarize(&records);
        assert_eq!(summary.ok, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn cancellation_marks_the_remaining_combinations() {
        let token = CancelToken::new();
        token.cancel();
        let records = run_sweep(
            &SweepOptions::default(),
            &base_tensor(),
            noise_pipeline,
            &error_grid(&[0.0, 1.0]),
            &[ModelSpec::new(CorruptionStats, vec![])],
            &token,
        );
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|record| record.status == RunStatus::Cancelled));
        assert_eq!(summarize(&records).cancelled, 2);
    }
}
