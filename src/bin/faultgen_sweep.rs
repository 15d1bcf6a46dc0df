use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, IxDyn};

use faultgen::output::{
    create_timestamped_output_dir, write_records_csv, write_records_json, write_summary_json,
};
use faultgen::filters::{GaussianNoise, Missing};
use faultgen::{
    run_sweep, summarize, Array, CancelToken, CorruptionStats, DataObject, FaultError, ModelSpec,
    RootNode, SweepConfig,
};

fn main() {
    tracing_subscriber::fmt::init();
    if let Err(error) = try_main() {
        eprintln!("faultgen sweep failed: {error}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), FaultError> {
    let config_path = parse_config_path(std::env::args().skip(1))?;
    let config = load_config(config_path.as_deref())?;
    config.validate()?;

    let data = ramp_dataset(config.rows, config.cols)?;
    let error_grid = config.error_grid();
    let models = vec![ModelSpec::new(CorruptionStats, vec![])];

    let records = run_sweep(
        &config.options(),
        &data,
        pipeline,
        &error_grid,
        &models,
        &CancelToken::new(),
    );
    let summary = summarize(&records);

    let output_dir = create_timestamped_output_dir(Path::new("output-faultgen"))?;
    write_records_csv(&output_dir.join("results.csv"), &records)?;
    write_records_json(&output_dir.join("results.json"), &records)?;
    write_summary_json(&output_dir.join("summary.json"), &summary)?;

    println!("Output directory: {}", output_dir.display());
    Ok(())
}

/// Gaussian noise clipped through a missing-value pass, keyed to the
/// config's error grid.
fn pipeline() -> RootNode<f64> {
    RootNode::single(
        Array::new()
            .with_filter(GaussianNoise::new("mean", "std"))
            .with_filter(Missing::new("prob")),
    )
}

/// Digits-like base dataset: a deterministic ramp of values 0..=16.
fn ramp_dataset(rows: usize, cols: usize) -> Result<DataObject<f64>, FaultError> {
    let values = (0..rows * cols).map(|index| (index % 17) as f64).collect();
    let tensor = ArrayD::from_shape_vec(IxDyn(&[rows, cols]), values)
        .map_err(|error| FaultError::InvalidConfig(error.to_string()))?;
    Ok(DataObject::Tensor(tensor))
}

fn parse_config_path<I>(args: I) -> Result<Option<PathBuf>, FaultError>
where
    I: IntoIterator<Item = String>,
{
    let mut iter = args.into_iter();
    let mut config_path = None;

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().ok_or_else(|| {
                    FaultError::InvalidConfig("missing value for --config".to_string())
                })?;
                config_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                return Err(FaultError::InvalidConfig(format!(
                    "unknown argument: {other}"
                )));
            }
        }
    }

    Ok(config_path)
}

fn load_config(path: Option<&Path>) -> Result<SweepConfig, FaultError> {
    if let Some(path) = path {
        return load_config_file(path);
    }

    let cwd_config = PathBuf::from("config.json");
    if cwd_config.exists() {
        return load_config_file(&cwd_config);
    }

    Ok(SweepConfig::default())
}

fn load_config_file(path: &Path) -> Result<SweepConfig, FaultError> {
    let raw = fs::read_to_string(path)?;
    let config: SweepConfig = serde_json::from_str(&raw)?;
    Ok(config)
}

fn print_help() {
    println!("Usage: cargo run --bin faultgen_sweep -- [--config path/to/config.json]");
    println!("If config.json exists in the current directory, it is loaded automatically.");
    println!("Otherwise the built-in noise-and-missing sweep configuration is used.");
}
