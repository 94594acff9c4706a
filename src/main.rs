use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use prompt_tournament::EvalError;
use prompt_tournament::config::Settings;
use prompt_tournament::output::{self, OutputFormat};
use prompt_tournament::runner::Runner;

/// Prompt tournament CLI - rank candidate prompts by judged output quality
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output - log every generation and judge call
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate the prompts of a request file (TOML, or JSON with a .json extension)
    Run {
        request_file: PathBuf,

        /// Path to the TOML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format: plain or json
        #[arg(short, long, default_value = "plain")]
        output: OutputFormat,

        /// Also write the full response as JSON to this path
        #[arg(short, long)]
        store: Option<PathBuf>,
    },
    /// List the supported models
    Models {
        /// Output format: plain or json
        #[arg(short, long, default_value = "plain")]
        output: OutputFormat,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Run {
            request_file,
            config,
            output: format,
            store,
        } => {
            let settings = Settings::load(config.as_deref())?;
            let runner = Runner::new(&settings, store);

            match runner.run_file(&request_file).await {
                Ok(response) => {
                    output::print_response(&response, format);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => match e.downcast_ref::<EvalError>() {
                    Some(EvalError::Validation(errors)) => {
                        eprintln!("Invalid request:");
                        for error in errors {
                            eprintln!("  {}", error);
                        }
                        Ok(ExitCode::FAILURE)
                    }
                    Some(EvalError::Configuration(message)) => {
                        eprintln!("Configuration error: {}", message);
                        Ok(ExitCode::FAILURE)
                    }
                    _ => Err(e),
                },
            }
        }
        Command::Models { output: format } => {
            output::print_models(format);
            Ok(ExitCode::SUCCESS)
        }
    }
}
