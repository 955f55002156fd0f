use std::process::ExitCode;

use corrcc::cli::CommandLineInterface;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let command_line_interface = CommandLineInterface::load();
    if let Err(e) = command_line_interface.run() {
        error!("{:?}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}
