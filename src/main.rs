use brrtrouter_core::cli::{run_cli, Cli};
use brrtrouter_core::otel::init_logging_with_config;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging_with_config(&cli.log_config())?;

    let code = run_cli(&cli)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
