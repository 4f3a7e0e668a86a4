mod cli;

use std::process::ExitCode;

use clap::Parser;
use pipeline::{PipelineCliArgs, PipelineConfig, telemetry};

fn main() -> ExitCode {
    let args = PipelineCliArgs::parse();
    let config = match PipelineConfig::try_from(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err:?}");
            return ExitCode::from(2);
        }
    };

    let _telemetry = telemetry::init(&config.telemetry);
    let stop = cli::install_interrupt_handler();

    let mut pipeline = cli::build_pipeline(&config, stop);
    match pipeline.run(&config.input) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", anyhow::Error::new(err));
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
