use crate::stack;
use kresolve_config::Config;
use kresolve_core::{Error, Result};
use kresolve_resolve::FileSource;
use kresolve_utils::write_atomic;
use std::path::Path;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run the pipeline described by `config` into `out`.
pub async fn run_into<W>(config: &Config, out: &mut W, shutdown: CancellationToken) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let pipeline = stack::pipeline(config)?;
    let source = FileSource::enumerate(&config.filenames, config.watch.debounce)?;
    pipeline.run(source, out, shutdown).await
}

pub async fn execute(
    config: &Config,
    output: Option<&Path>,
    shutdown: CancellationToken,
) -> Result<()> {
    match output {
        None => {
            let mut stdout = tokio::io::stdout();
            run_into(config, &mut stdout, shutdown).await
        }
        // Watch mode streams into the file as records become ready.
        Some(path) if config.filenames.watch => {
            let mut file = tokio::fs::File::create(path)
                .await
                .map_err(|e| Error::file_system(path, "create", e))?;
            run_into(config, &mut file, shutdown).await
        }
        // A one-shot run only replaces the file once everything resolved.
        Some(path) => {
            let mut buffer = Vec::new();
            run_into(config, &mut buffer, shutdown).await?;
            write_atomic(path, &buffer)?;
            info!(path = %path.display(), bytes = buffer.len(), "wrote resolved manifests");
            Ok(())
        }
    }
}
