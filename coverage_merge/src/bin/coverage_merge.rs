use std::process::ExitCode;

use clap::Parser;
use coverage_merge::app::{self, AppConfig, Args};
use tracing::error;

fn main() -> ExitCode {
    let args = Args::parse();
    app::init_tracing();

    match AppConfig::try_from(args).and_then(app::run) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            let code = app::exit_code(&err);
            error!(exit_code = code, "Coverage merge failed: {err:#}");
            ExitCode::from(code)
        }
    }
}
