//! Coalesces bursts of raw notifications into one batch

use crate::notifier::NotifierEvent;
use kresolve_core::{Error, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Wait for the next batch of changed paths.
///
/// Blocks until one event arrives, then keeps collecting until `window`
/// passes without another. Returns `None` once the channel is closed and
/// drained, and an error as soon as the notifier reports one.
pub async fn next_batch(
    events: &mut mpsc::UnboundedReceiver<NotifierEvent>,
    window: Duration,
) -> Option<Result<HashSet<PathBuf>>> {
    let mut batch = HashSet::new();

    match events.recv().await? {
        NotifierEvent::Changed(paths) => batch.extend(paths),
        NotifierEvent::Failed(message) => return Some(Err(Error::notifier(message))),
    }

    loop {
        match tokio::time::timeout(window, events.recv()).await {
            Ok(Some(NotifierEvent::Changed(paths))) => batch.extend(paths),
            Ok(Some(NotifierEvent::Failed(message))) => {
                return Some(Err(Error::notifier(message)))
            }
            // Quiet for a full window, or the sender went away mid-burst.
            Err(_) | Ok(None) => return Some(Ok(batch)),
        }
    }
}
