use crate::commands::{apply, resolve, Commands};
use kresolve_core::Result;
use tokio_util::sync::CancellationToken;

impl Commands {
    pub async fn execute(self, shutdown: CancellationToken) -> Result<()> {
        match self {
            Commands::Resolve { args, output } => {
                let config = args.loader().load()?;
                resolve::execute(&config, output.as_deref(), shutdown).await
            }
            Commands::Apply {
                args,
                kubectl,
                kubectl_args,
            } => {
                let config = args.loader().load()?;
                apply::execute(&config, &kubectl, &kubectl_args, shutdown).await
            }
        }
    }
}
