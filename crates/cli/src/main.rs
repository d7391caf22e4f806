//! `ncopy` -- run NCO operators through the dynamic facade.
//!
//! # Environment variables
//!
//! Operator configuration is read as documented on
//! `NcoConfig::from_env`; a `.env` file in the working directory is loaded
//! first. Log verbosity follows `RUST_LOG`; without it the default is
//! `ncopy_core=info,ncopy_cli=info`, or `debug` for both when `--debug` or
//! `NCO_DEBUG` enables operator debugging.

use clap::Parser;
use ncopy_cli::commands::{self, Cli};
use ncopy_core::NcoError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| commands::default_log_directive(&cli).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = commands::execute(cli).await {
        tracing::error!(error = %err, "ncopy failed");
        let code = err
            .downcast_ref::<NcoError>()
            .and_then(NcoError::exit_code)
            .filter(|code| *code != 0)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
