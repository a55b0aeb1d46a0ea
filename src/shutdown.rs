//! Stopping a field run from the outside.
//!
//! The field driver only watches a [`CancellationToken`]. Whatever should end
//! the run (a signal in the binary, a timer in tests) resolves a future and
//! [`cancel_on`] turns that into a cancelled token. The driver then finishes
//! its current turn and still produces a report.

use std::future::Future;

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
}

impl std::fmt::Display for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopSignal::Interrupt => write!(f, "SIGINT"),
            StopSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Wait for SIGINT or SIGTERM. `None` if the handlers could not be installed.
pub async fn wait_for_stop() -> Option<StopSignal> {
    let (mut term, mut int) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "Failed to install signal handlers, field runs until its job limit");
            return None;
        }
    };

    tokio::select! {
        _ = term.recv() => Some(StopSignal::Terminate),
        _ = int.recv() => Some(StopSignal::Interrupt),
    }
}

/// Cancel `field` once `stop` yields a signal. A `None` leaves the run alone.
pub fn cancel_on<F>(stop: F, field: CancellationToken) -> JoinHandle<()>
where
    F: Future<Output = Option<StopSignal>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Some(sig) = stop.await {
            tracing::info!(signal = %sig, "Stopping field after the current turn");
            field.cancel();
        }
    })
}

/// Token for a field run that is cancelled on SIGINT or SIGTERM.
pub fn install_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    cancel_on(wait_for_stop(), token.clone());
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_cancels_field() {
        let token = CancellationToken::new();
        cancel_on(async { Some(StopSignal::Terminate) }, token.clone())
            .await
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn missing_handlers_leave_field_running() {
        let token = CancellationToken::new();
        cancel_on(async { None }, token.clone()).await.unwrap();
        assert!(!token.is_cancelled());
    }
}
