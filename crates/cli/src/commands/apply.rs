use super::resolve::run_into;
use kresolve_config::Config;
use kresolve_core::{Error, Result};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

fn apply_args(extra: &[String]) -> Vec<String> {
    let mut args = vec!["apply".to_string(), "-f".to_string(), "-".to_string()];
    args.extend(extra.iter().cloned());
    args
}

fn status_error(kubectl: &Path, args: Vec<String>, status: ExitStatus) -> Error {
    Error::command_execution(
        kubectl.display().to_string(),
        args,
        format!("kubectl exited with {status}"),
        status.code(),
    )
}

/// Stream the resolved manifests into `kubectl apply -f -`.
///
/// A kubectl failure is reported in preference to the pipeline error it
/// usually causes (a closed stdin).
pub async fn execute(
    config: &Config,
    kubectl: &Path,
    kubectl_args: &[String],
    shutdown: CancellationToken,
) -> Result<()> {
    let args = apply_args(kubectl_args);
    debug!(kubectl = %kubectl.display(), ?args, "starting kubectl");

    let mut child = Command::new(kubectl)
        .args(&args)
        .stdin(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            Error::command_execution(
                kubectl.display().to_string(),
                args.clone(),
                format!("failed to start: {e}"),
                None,
            )
        })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::internal("kubectl stdin was not captured"))?;
    let resolved = run_into(config, &mut stdin, shutdown).await;
    drop(stdin);

    if let Err(error) = resolved {
        // kubectl may already have failed and closed its end of the pipe.
        let exited = child
            .try_wait()
            .map_err(|e| Error::file_system(kubectl, "wait", e))?;
        if let Some(status) = exited.filter(|status| !status.success()) {
            warn!(%error, "resolution stopped after kubectl failed");
            return Err(status_error(kubectl, args, status));
        }
        // Don't let kubectl apply a truncated stream.
        if exited.is_none() {
            child
                .kill()
                .await
                .map_err(|e| Error::file_system(kubectl, "kill", e))?;
        }
        return Err(error);
    }

    let status = child
        .wait()
        .await
        .map_err(|e| Error::file_system(kubectl, "wait", e))?;
    if status.success() {
        Ok(())
    } else {
        Err(status_error(kubectl, args, status))
    }
}
