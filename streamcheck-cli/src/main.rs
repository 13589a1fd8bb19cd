use std::process::ExitCode;

use clap::Parser;
use mimalloc::MiMalloc;
use streamcheck::cli::Args;
use streamcheck::config::resolve_config;
use streamcheck::logging::init_logging;
use streamcheck::{AppError, processor};
use tracing::error;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match init_logging(args.verbose, args.quiet, args.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Application error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let config = resolve_config(&args)?;
    processor::run(&args.input, &args.output, config).await?;
    Ok(())
}
