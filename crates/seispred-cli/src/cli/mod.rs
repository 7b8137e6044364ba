mod commands;
mod helpers;

use clap::Parser;
use seispred_core::domain::PredictError;

pub fn run_from_env() -> i32 {
    init_tracing();
    let args: Vec<String> = std::env::args().collect();
    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let engine_error = error.as_predict_error();
            eprintln!("{}", engine_error.diagnostic_line());
            engine_error.exit_code()
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Predict(args) => commands::run_predict(args),
        CliCommand::Task(args) => commands::run_task(args),
        CliCommand::Support(args) => commands::run_support(args),
    }
}

#[derive(Parser)]
#[command(name = "seispred", about = "Seismic observable prediction engine")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Evaluate a batch of prediction requests against a travel-time model
    Predict(commands::PredictArgs),
    /// Execute a serialized distributed task envelope (worker entry point)
    Task(commands::TaskArgs),
    /// Print the claimed-observation map of the configured providers
    Support(commands::SupportArgs),
}

#[derive(Debug)]
pub enum CliError {
    Usage(String),
    Engine(PredictError),
}

impl CliError {
    pub fn as_predict_error(&self) -> PredictError {
        match self {
            Self::Usage(message) => {
                PredictError::input_validation("CLI.USAGE", message.clone())
            }
            Self::Engine(error) => error.clone(),
        }
    }
}

impl From<PredictError> for CliError {
    fn from(error: PredictError) -> Self {
        Self::Engine(error)
    }
}
