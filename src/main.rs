use clap::Parser;
use signaltrader::cli::{run, Cli};
use tracing_subscriber::{prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if let Err(err) = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init()
    {
        eprintln!("warning: failed to initialize tracing: {err}");
    }
}

fn main() -> std::process::ExitCode {
    init_tracing();
    run(Cli::parse())
}
