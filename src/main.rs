use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    docsdk::logging::init().context("init logging")?;

    let cli = docsdk::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let config = docsdk::config::AppConfig::resolve(&cli.global).context("resolve config")?;
    let app = docsdk::commands::App::new(&config).context("init app")?;
    app.run(cli.command).await
}
