use super::CliError;
use super::helpers::{
    read_json_file, read_request_batch, render_claim_tuple, write_json_report,
};
use seispred_core::dispatch::ConcurrentDispatcher;
use seispred_core::distributed::{PredictionTask, execute};
use seispred_core::domain::{PredictErrorCategory, PredictionResult};
use seispred_core::predictors::table::TablePredictor;
use seispred_core::predictors::{Predictor, TableCorrections};
use seispred_core::settings::PredictionSettings;
use seispred_core::uncertainty::{TableUncertainty, UncertaintyChain};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(clap::Args)]
pub(super) struct PredictArgs {
    /// Request batch path (JSON array of request records)
    #[arg(long)]
    batch: PathBuf,

    /// Travel-time model path
    #[arg(long)]
    model: PathBuf,

    /// Engine settings path; defaults apply when omitted
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Path-correction table path
    #[arg(long)]
    corrections: Option<PathBuf>,

    /// Uncertainty table path
    #[arg(long)]
    uncertainty: Option<PathBuf>,

    /// JSON report output path
    #[arg(long, default_value = "predictions.json")]
    report: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct TaskArgs {
    /// Serialized task envelope path
    #[arg(long)]
    task: PathBuf,

    /// Response envelope output path
    #[arg(long, default_value = "task-result.json")]
    output: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct SupportArgs {
    /// Travel-time model path
    #[arg(long)]
    model: PathBuf,

    /// Path-correction table path
    #[arg(long)]
    corrections: Option<PathBuf>,

    /// Uncertainty table path
    #[arg(long)]
    uncertainty: Option<PathBuf>,
}

#[derive(Serialize)]
struct PredictReport {
    model_name: String,
    predictor_name: String,
    request_count: usize,
    valid_count: usize,
    error_count: usize,
    results: Vec<PredictionResult>,
}

fn build_predictor(
    model: &PathBuf,
    corrections: Option<&PathBuf>,
    uncertainty: Option<&PathBuf>,
    uncertainty_name: &str,
) -> Result<TablePredictor, CliError> {
    let mut predictor = TablePredictor::load(model)?;
    if let Some(path) = corrections {
        predictor = predictor
            .with_corrections(Arc::new(TableCorrections::from_json_file("corrections", path)?));
    }
    if let Some(path) = uncertainty {
        let name = if uncertainty_name.is_empty() {
            "uncertainty"
        } else {
            uncertainty_name
        };
        let table = TableUncertainty::from_json_file(name, path)?;
        predictor = predictor.with_uncertainty(UncertaintyChain::new(vec![Arc::new(table)]));
    }
    Ok(predictor)
}

pub(super) fn run_predict(args: PredictArgs) -> Result<i32, CliError> {
    let settings = match &args.settings {
        Some(path) => PredictionSettings::from_json_file(path)?,
        None => PredictionSettings::default(),
    };
    let predictor = build_predictor(
        &args.model,
        args.corrections.as_ref(),
        args.uncertainty.as_ref(),
        &settings.uncertainty_type,
    )?;
    let mut requests = read_request_batch(&args.batch)?;

    info!(
        requests = requests.len(),
        model = predictor.model_name(),
        max_processors = settings.max_processors,
        chunk_size = settings.chunk_size,
        "evaluating request batch"
    );

    let dispatcher = ConcurrentDispatcher::new(settings.dispatch_config());
    let results = dispatcher.predict_batch(&predictor, &mut requests)?;

    let valid_count = results.iter().filter(|result| result.is_valid()).count();
    let report = PredictReport {
        model_name: predictor.model_name().to_string(),
        predictor_name: predictor.predictor_name().to_string(),
        request_count: results.len(),
        valid_count,
        error_count: results.len() - valid_count,
        results,
    };
    write_json_report(&args.report, &report)?;

    println!(
        "{} predictions ({} valid, {} failed) written to {}",
        report.request_count,
        report.valid_count,
        report.error_count,
        args.report.display()
    );
    Ok(0)
}

pub(super) fn run_task(args: TaskArgs) -> Result<i32, CliError> {
    let task: PredictionTask = read_json_file(&args.task, "IO.TASK_READ", "INPUT.TASK_PARSE")?;
    let sub_batch = task.requests.len();

    let envelope = execute(task);
    write_json_report(&args.output, &envelope)?;

    if let Some(exception) = &envelope.exception {
        // A worker that cannot load its models is unrecoverable; surface the
        // captured exception and exit nonzero after the envelope is written.
        eprintln!("task failed on {}: {}", envelope.host_name, exception);
        return Ok(PredictErrorCategory::IoSystem.exit_code());
    }

    println!(
        "{} of {} requests evaluated in {} ms, envelope written to {}",
        envelope.results.len(),
        sub_batch,
        envelope.calc_time_millis,
        args.output.display()
    );
    Ok(0)
}

pub(super) fn run_support(args: SupportArgs) -> Result<i32, CliError> {
    let predictor = build_predictor(
        &args.model,
        args.corrections.as_ref(),
        args.uncertainty.as_ref(),
        "uncertainty",
    )?;

    println!(
        "model '{}' via predictor '{}'",
        predictor.model_name(),
        predictor.predictor_name()
    );
    let attributes: Vec<String> = predictor
        .supported_attributes()
        .iter()
        .map(|attribute| attribute.to_string())
        .collect();
    println!("supported attributes: {}", attributes.join(", "));

    let claims = predictor.claimed_observations();
    println!("claimed observations ({}):", claims.size());
    for tuple in claims.entries() {
        println!("  {}", render_claim_tuple(tuple));
    }
    Ok(0)
}
