use clap::Parser;
use kresolve::Cli;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    kresolve_utils::tracing::init(cli.verbose)?;

    // Ctrl-C ends a watch session cleanly.
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, shutting down");
            signal.cancel();
        }
    });

    cli.command.execute(shutdown).await?;
    Ok(())
}
