//! HTS pipeline runner
//!
//! Usage: `hts_pipeline <prep|train|infer|run> [config.json]`
//!
//! Without a config file the built-in defaults are used.

use hts_forecast::config::PipelineConfig;
use hts_forecast::logging;
use hts_forecast::pipeline;
use std::env;
use std::error::Error;
use std::process::ExitCode;
use tracing::{error, info};

const USAGE: &str = "usage: hts_pipeline <prep|train|infer|run> [config.json]";

fn execute(stage: &str, config: &PipelineConfig) -> hts_forecast::Result<()> {
    match stage {
        "prep" => {
            let frame = pipeline::prepare(config)?;
            info!(series = frame.len(), path = %config.prep_path.display(), "prep done");
        }
        "train" => {
            let artifacts = pipeline::train(config)?;
            info!(
                series = artifacts.hierarchy.n_series(),
                dir = %config.model_dir.display(),
                "train done"
            );
        }
        "infer" => {
            let path = pipeline::infer(config)?;
            info!(path = %path.display(), "infer done");
        }
        "run" => {
            pipeline::run(config)?;
        }
        other => {
            return Err(hts_forecast::HtsError::InvalidParameter(format!(
                "unknown stage '{}'; {}",
                other, USAGE
            )))
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    logging::init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(stage) = args.first() else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    let config = match args.get(1) {
        Some(path) => PipelineConfig::from_json_file(path),
        None => Ok(PipelineConfig::default()),
    };

    let result = config.and_then(|config| execute(stage, &config));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "pipeline failed");
            let mut source = err.source();
            while let Some(cause) = source {
                error!(cause = %cause, "caused by");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
